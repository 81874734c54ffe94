//! Retrieval pipeline
//!
//! Provides five retrieval modes:
//! - Naive (keyword seeds only)
//! - Local / Global / Hybrid (seeds expanded over wikilinks, assembled into a context)
//! - Precision (passages scored and filtered by the completer)

mod engine;
mod keyword;
mod search_tool;

pub use engine::Retriever;
pub use keyword::{split_terms, KeywordSeeder, SeedSet, SeederConfig};
pub use search_tool::{RipgrepTool, SearchScope, SearchTool};

use crate::precision::RerankMode;
use noteforge_common::context::AssembledContext;
use noteforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Retrieval mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Keyword seeds, no expansion
    Naive,
    /// One hop of link expansion
    Local,
    /// Two hops of link expansion
    Global,
    /// Seeds plus configured expansion depth
    #[default]
    Hybrid,
    /// Scored passages
    Precision,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Local => "local",
            Self::Global => "global",
            Self::Hybrid => "hybrid",
            Self::Precision => "precision",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" => Ok(Self::Naive),
            "local" => Ok(Self::Local),
            "global" => Ok(Self::Global),
            "hybrid" => Ok(Self::Hybrid),
            "precision" => Ok(Self::Precision),
            other => Err(AppError::Validation {
                message: format!("unknown retrieval mode '{}'", other),
                field: Some("mode".to_string()),
            }),
        }
    }
}

/// Which seeding tier produced the seeds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeedTier {
    Phrase,
    Terms,
    LinearScan,
    None,
}

impl SeedTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phrase => "phrase",
            Self::Terms => "terms",
            Self::LinearScan => "linear_scan",
            Self::None => "none",
        }
    }
}

/// Query parameters; unset fields fall back to configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    /// Query text
    pub query: String,

    /// Retrieval mode
    pub mode: RetrievalMode,

    /// Seeds kept (naive) or passages returned (precision)
    pub top_k: Option<usize>,

    /// Expansion depth override
    pub depth: Option<usize>,

    /// Minimum passage score
    pub threshold: Option<f32>,

    /// Characters per document in the context
    pub per_doc_chars: Option<usize>,

    /// Characters per passage
    pub per_passage_chars: Option<usize>,

    /// Total context budget in characters
    pub budget_chars: Option<usize>,

    /// Wall-clock limit for the whole query
    #[serde(skip)]
    pub deadline: Option<Duration>,

    /// Score passages; `Some(false)` returns the first K unscored
    pub rerank: Option<bool>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, mode: RetrievalMode) -> Self {
        Self {
            query: query.into(),
            mode,
            top_k: None,
            depth: None,
            threshold: None,
            per_doc_chars: None,
            per_passage_chars: None,
            budget_chars: None,
            deadline: None,
            rerank: None,
        }
    }
}

/// Per-query statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub query_id: Uuid,
    pub corpus_size: usize,
    pub seed_count: usize,
    pub seed_tier: SeedTier,
    /// Documents added by link expansion
    pub expanded_count: usize,
    pub passages_extracted: usize,
    /// Passages that received a valid score
    pub passages_scored: usize,
    pub elapsed_ms: u64,
}

impl RetrievalStats {
    fn new(query_id: Uuid) -> Self {
        Self {
            query_id,
            corpus_size: 0,
            seed_count: 0,
            seed_tier: SeedTier::None,
            expanded_count: 0,
            passages_extracted: 0,
            passages_scored: 0,
            elapsed_ms: 0,
        }
    }
}

/// How a document entered the candidate set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HitOrigin {
    Seed,
    /// Discovered in the given expansion round
    Linked { round: usize },
}

/// A document in a context result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentHit {
    pub title: String,
    pub relative_path: String,
    pub origin: HitOrigin,
}

/// A passage in a precision result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrecisionHit {
    /// `relative/path.md § Section`
    pub citation: String,
    pub excerpt: String,
    /// Absent when scoring was skipped
    pub score: Option<f32>,
}

/// Retrieval payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalResult {
    /// The seeder found nothing
    NoResults,
    /// Candidate documents and their assembled context
    Context {
        documents: Vec<DocumentHit>,
        context: AssembledContext,
    },
    /// Ranked passages
    Passages {
        hits: Vec<PrecisionHit>,
        rerank_mode: RerankMode,
    },
}

/// Retrieval response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub mode: RetrievalMode,
    pub stats: RetrievalStats,
    pub result: RetrievalResult,
}

impl RetrievalOutcome {
    pub fn is_empty(&self) -> bool {
        match &self.result {
            RetrievalResult::NoResults => true,
            RetrievalResult::Context { documents, .. } => documents.is_empty(),
            RetrievalResult::Passages { hits, .. } => hits.is_empty(),
        }
    }

    /// Outcome label for metrics
    pub fn label(&self) -> &'static str {
        match &self.result {
            RetrievalResult::NoResults => "no_results",
            RetrievalResult::Context { .. } => "context",
            RetrievalResult::Passages { .. } => "passages",
        }
    }
}

/// Run `fut` unless `cancel` fires first
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        out = fut => Ok(out),
    }
}
