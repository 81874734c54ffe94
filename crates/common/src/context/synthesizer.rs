//! Synthesizer - Generates answers from assembled note context
//!
//! Provides:
//! - Context-grounded prompt construction
//! - Citation extraction against the included notes

use super::completer::Completer;
use super::context_builder::{AssembledContext, ContextSource};
use crate::errors::{AppError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Synthesized answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    /// Generated answer text
    pub answer: String,

    /// Notes cited in the answer, by 1-based index into the context sources
    pub citations: Vec<Citation>,
}

/// Citation in a synthesized answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Citation index (1-based)
    pub index: usize,

    /// Cited note
    pub source: ContextSource,
}

/// Synthesis style
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SynthesisStyle {
    /// Brief, to-the-point
    Concise,
    /// Comprehensive explanation
    #[default]
    Detailed,
}

/// Synthesis options
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Include citations inline
    pub include_citations: bool,

    /// Answer style
    pub style: SynthesisStyle,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            include_citations: true,
            style: SynthesisStyle::default(),
        }
    }
}

/// Synthesizer for generating answers
pub struct Synthesizer {
    completer: Arc<dyn Completer>,
    options: SynthesisOptions,
}

impl Synthesizer {
    /// Create a new synthesizer
    pub fn new(completer: Arc<dyn Completer>, options: SynthesisOptions) -> Self {
        Self { completer, options }
    }

    /// Synthesize an answer from context
    pub async fn synthesize(
        &self,
        question: &str,
        context: &AssembledContext,
    ) -> Result<SynthesizedAnswer> {
        if context.is_empty() {
            return Err(AppError::Validation {
                message: "cannot synthesize from an empty context".to_string(),
                field: None,
            });
        }

        let instructions = self.build_instructions();
        let prompt = self.build_prompt(question, context);
        let answer = self.completer.complete(&prompt, &instructions).await?;
        let citations = extract_citations(&answer, &context.sources);

        Ok(SynthesizedAnswer { answer, citations })
    }

    fn build_instructions(&self) -> String {
        let style_instruction = match self.options.style {
            SynthesisStyle::Concise => "Provide a brief, focused answer.",
            SynthesisStyle::Detailed => "Provide a comprehensive answer with explanations.",
        };

        let citation_instruction = if self.options.include_citations {
            "Cite notes inline as [1], [2], etc. using the numbers in the source list."
        } else {
            "Do not include citations."
        };

        format!(
            "You answer questions from a personal knowledge base. Use ONLY the provided notes. \
            If they do not contain enough information, say so.\n{}\n{}",
            style_instruction, citation_instruction
        )
    }

    fn build_prompt(&self, question: &str, context: &AssembledContext) -> String {
        let mut prompt = format!("Question: {}\n\nSources:\n", question);
        for (i, source) in context.sources.iter().enumerate() {
            prompt.push_str(&format!("[{}] {} ({})\n", i + 1, source.title, source.relative_path));
        }
        prompt.push_str("\nNotes:\n\n");
        prompt.push_str(&context.text);
        prompt
    }
}

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"))
}

/// Extract `[n]` citations that point at an included note
fn extract_citations(answer: &str, sources: &[ContextSource]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();

    for cap in citation_pattern().captures_iter(answer) {
        let Some(idx) = cap.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            continue;
        };
        if idx == 0 || idx > sources.len() || citations.iter().any(|c| c.index == idx) {
            continue;
        }
        citations.push(Citation {
            index: idx,
            source: sources[idx - 1].clone(),
        });
    }

    citations.sort_by_key(|c| c.index);
    citations
}
