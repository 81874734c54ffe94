//! Context Builder - Assembles a budgeted synthesis context
//!
//! Provides:
//! - Per-note excerpt caps
//! - Hard total character budget with strict prefix semantics
//! - Noise filtering of near-empty notes

use crate::config::ContextConfig;
use crate::document::{truncate_chars, Document, TRUNCATION_MARKER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A note included in the assembled context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextSource {
    pub title: String,
    pub relative_path: String,
    /// Excerpt was cut at the per-note cap
    pub truncated: bool,
}

/// Assembled context handed to synthesis
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssembledContext {
    /// Concatenated blocks
    pub text: String,

    /// Included notes, in order
    pub sources: Vec<ContextSource>,

    /// Notes skipped as noise
    pub skipped: usize,

    /// Notes dropped because the budget was reached
    pub dropped: usize,

    /// Length of `text` in characters
    pub char_count: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// True when the budget cut off later notes
    pub fn budget_exhausted(&self) -> bool {
        self.dropped > 0
    }
}

/// Context builder configuration
#[derive(Debug, Clone)]
pub struct ContextBuilderConfig {
    /// Characters of body per note
    pub per_doc_chars: usize,

    /// Total character budget
    pub budget_chars: usize,

    /// Minimum non-whitespace body characters
    pub min_body_chars: usize,
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for ContextBuilderConfig {
    fn from(config: &ContextConfig) -> Self {
        Self {
            per_doc_chars: config.per_doc_chars,
            budget_chars: config.total_budget_chars,
            min_body_chars: config.min_body_chars,
        }
    }
}

/// Builds labeled, budgeted context from ordered notes
pub struct ContextBuilder {
    config: ContextBuilderConfig,
}

impl ContextBuilder {
    /// Create a new context builder
    pub fn new(config: ContextBuilderConfig) -> Self {
        Self { config }
    }

    /// Assemble context in the given order.
    ///
    /// Stops at the first block that would exceed the budget; later, smaller
    /// notes are not packed in.
    pub fn build(&self, documents: &[Arc<Document>]) -> AssembledContext {
        let mut context = AssembledContext::default();

        for (idx, doc) in documents.iter().enumerate() {
            if doc.body_weight() < self.config.min_body_chars {
                context.skipped += 1;
                continue;
            }

            let (block, truncated) = self.format_block(doc);
            let block_chars = block.chars().count();

            if context.char_count + block_chars > self.config.budget_chars {
                context.dropped = documents[idx..]
                    .iter()
                    .filter(|d| d.body_weight() >= self.config.min_body_chars)
                    .count();
                break;
            }

            context.text.push_str(&block);
            context.char_count += block_chars;
            context.sources.push(ContextSource {
                title: doc.title.clone(),
                relative_path: doc.relative_path.clone(),
                truncated,
            });
        }

        tracing::debug!(
            included = context.sources.len(),
            skipped = context.skipped,
            dropped = context.dropped,
            chars = context.char_count,
            "Context assembled"
        );

        context
    }

    /// Format one labeled block
    fn format_block(&self, doc: &Document) -> (String, bool) {
        let body = doc.body().trim();
        let (excerpt, truncated) = truncate_chars(body, self.config.per_doc_chars);
        let marker = if truncated { TRUNCATION_MARKER } else { "" };

        (
            format!(
                "### {}\n_Source: {}_\n\n{}{}\n\n",
                doc.title, doc.relative_path, excerpt, marker
            ),
            truncated,
        )
    }
}
