//! Precision retrieval
//!
//! Passage extraction and completer-scored reranking.

mod passages;
mod reranker;

pub use passages::{extract_passages, Passage, PassageConfig};
pub use reranker::{
    dedup_by_prefix, parse_scores, sort_by_score, RerankConfig, RerankMode, RerankOutput,
    Reranker, ScoredPassage,
};
