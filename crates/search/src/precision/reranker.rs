//! Relevance reranking
//!
//! Passages are sent to the completer in fixed-size batches, each asked to
//! rate its passages 0-10. Scores are parsed line by line; anything
//! unparseable is ignored and the passage it belonged to is dropped.

use super::passages::Passage;
use crate::retrieval::cancellable;
use futures::stream::{self, StreamExt};
use noteforge_common::config::PrecisionConfig;
use noteforge_common::context::Completer;
use noteforge_common::document::truncate_chars;
use noteforge_common::errors::{AppError, Result};
use noteforge_common::metrics;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Reranker configuration
#[derive(Debug, Clone)]
pub struct RerankConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub batch_timeout: Duration,
    pub top_k: usize,
    pub threshold: f32,
    pub dedup_prefix_chars: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self::from(&PrecisionConfig::default())
    }
}

impl From<&PrecisionConfig> for RerankConfig {
    fn from(config: &PrecisionConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
            batch_timeout: Duration::from_secs(config.batch_timeout_secs),
            top_k: config.top_k,
            threshold: config.threshold,
            dedup_prefix_chars: config.dedup_prefix_chars,
        }
    }
}

/// Whether passages were scored
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RerankMode {
    Scored,
    /// Passages returned unscored in original order
    NoRerank,
}

/// A passage with its relevance score
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Passage,
    /// Position in the list submitted for scoring
    pub ordinal: usize,
    pub score: Option<f32>,
}

impl ScoredPassage {
    /// Leading characters used to detect near-duplicates
    pub fn dedup_key(&self, prefix_chars: usize) -> &str {
        truncate_chars(&self.passage.text, prefix_chars).0
    }
}

/// Reranking result
#[derive(Debug, Clone)]
pub struct RerankOutput {
    pub passages: Vec<ScoredPassage>,
    pub mode: RerankMode,
    /// Passages that received a valid score
    pub considered: usize,
    pub failed_batches: usize,
}

enum BatchOutcome {
    Scored(Vec<Option<f32>>),
    Failed { unavailable: bool },
}

/// Scores, filters and ranks passages through a completer
pub struct Reranker {
    completer: Arc<dyn Completer>,
    config: RerankConfig,
}

impl Reranker {
    pub fn new(completer: Arc<dyn Completer>, config: RerankConfig) -> Self {
        Self { completer, config }
    }

    /// Rank `passages` for `query`.
    ///
    /// Falls back to [`Reranker::no_rerank`] when the completer is
    /// unavailable. Batch failures only drop that batch's passages.
    pub async fn rerank(
        &self,
        query: &str,
        passages: Vec<Passage>,
        cancel: &CancellationToken,
    ) -> Result<RerankOutput> {
        if passages.is_empty() {
            return Ok(RerankOutput {
                passages: Vec::new(),
                mode: RerankMode::Scored,
                considered: 0,
                failed_batches: 0,
            });
        }

        if !self.completer.is_available() {
            tracing::warn!(model = self.completer.model_name(), "Completer unavailable, skipping rerank");
            return Ok(self.no_rerank(passages));
        }

        let instructions = scoring_instructions(query);
        let batch_count = passages.len().div_ceil(self.config.batch_size);

        let batches = stream::iter(passages.chunks(self.config.batch_size).enumerate())
            .map(|(batch, slice)| {
                let instructions = instructions.as_str();
                async move {
                    let start = batch * self.config.batch_size;
                    (start, self.score_batch(batch, slice, instructions).await)
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>();

        let results = cancellable(cancel, batches).await?;

        let mut scores: Vec<Option<f32>> = vec![None; passages.len()];
        let mut failed_batches = 0;
        let mut unavailable_batches = 0;

        for (start, outcome) in results {
            match outcome {
                BatchOutcome::Scored(batch_scores) => {
                    for (offset, score) in batch_scores.into_iter().enumerate() {
                        scores[start + offset] = score;
                    }
                }
                BatchOutcome::Failed { unavailable } => {
                    failed_batches += 1;
                    if unavailable {
                        unavailable_batches += 1;
                    }
                }
            }
        }

        if unavailable_batches == batch_count {
            tracing::warn!(batches = batch_count, "Every scoring batch was unavailable, skipping rerank");
            return Ok(self.no_rerank(passages));
        }

        let considered = scores.iter().filter(|s| s.is_some()).count();

        let mut ranked: Vec<ScoredPassage> = passages
            .into_iter()
            .zip(scores)
            .enumerate()
            .filter_map(|(ordinal, (passage, score))| {
                let score = score.filter(|&s| s >= self.config.threshold)?;
                Some(ScoredPassage {
                    passage,
                    ordinal,
                    score: Some(score),
                })
            })
            .collect();

        sort_by_score(&mut ranked);
        let mut ranked = dedup_by_prefix(ranked, self.config.dedup_prefix_chars);
        ranked.truncate(self.config.top_k);

        tracing::debug!(
            considered,
            kept = ranked.len(),
            failed_batches,
            threshold = self.config.threshold,
            "Rerank complete"
        );

        Ok(RerankOutput {
            passages: ranked,
            mode: RerankMode::Scored,
            considered,
            failed_batches,
        })
    }

    /// First `top_k` passages in original order, unscored
    pub fn no_rerank(&self, passages: Vec<Passage>) -> RerankOutput {
        let passages = passages
            .into_iter()
            .take(self.config.top_k)
            .enumerate()
            .map(|(ordinal, passage)| ScoredPassage {
                passage,
                ordinal,
                score: None,
            })
            .collect();

        RerankOutput {
            passages,
            mode: RerankMode::NoRerank,
            considered: 0,
            failed_batches: 0,
        }
    }

    async fn score_batch(&self, batch: usize, slice: &[Passage], instructions: &str) -> BatchOutcome {
        let context = render_batch(slice);

        match tokio::time::timeout(
            self.config.batch_timeout,
            self.completer.complete(&context, instructions),
        )
        .await
        {
            Ok(Ok(reply)) => {
                metrics::record_rerank_batch("ok");
                BatchOutcome::Scored(parse_scores(&reply, slice.len()))
            }
            Ok(Err(e)) => {
                metrics::record_rerank_batch("error");
                tracing::warn!(batch, error = %e, "Scoring batch failed");
                BatchOutcome::Failed {
                    unavailable: e.is_unavailable(),
                }
            }
            Err(_) => {
                metrics::record_rerank_batch("timeout");
                let e = AppError::CompletionTimeout {
                    timeout_ms: self.config.batch_timeout.as_millis() as u64,
                };
                tracing::warn!(batch, error = %e, "Scoring batch timed out");
                BatchOutcome::Failed { unavailable: false }
            }
        }
    }
}

fn scoring_instructions(query: &str) -> String {
    format!(
        "You rate how relevant passages from a personal knowledge base are to a question.\n\
         Question: {}\n\n\
         Rate every passage from 0 (irrelevant) to 10 (directly answers the question).\n\
         Reply with one line per passage in the form `index: score` and nothing else.",
        query
    )
}

/// Numbered batch listing, indices starting at 1
fn render_batch(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] ({})\n{}\n", i + 1, p.citation(), p.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn score_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•]\s*)?\[?(\d+)\]?\s*[:=]\s*(-?\d+(?:\.\d+)?)")
            .expect("score line pattern is valid")
    })
}

/// Parse `index: score` lines for a batch of `count` passages.
///
/// Indices are 1-based. Out-of-range indices, repeats after the first,
/// non-finite scores and unmatched lines are ignored.
pub fn parse_scores(reply: &str, count: usize) -> Vec<Option<f32>> {
    let mut scores = vec![None; count];

    for line in reply.lines() {
        let Some(caps) = score_line().captures(line) else {
            continue;
        };
        let Ok(index) = caps[1].parse::<usize>() else {
            continue;
        };
        let Ok(score) = caps[2].parse::<f32>() else {
            continue;
        };
        if index == 0 || index > count || !score.is_finite() {
            continue;
        }
        let slot = &mut scores[index - 1];
        if slot.is_none() {
            *slot = Some(score);
        }
    }

    scores
}

/// Stable sort, highest score first
pub fn sort_by_score(passages: &mut [ScoredPassage]) {
    passages.sort_by(|a, b| {
        let a = a.score.unwrap_or(f32::NEG_INFINITY);
        let b = b.score.unwrap_or(f32::NEG_INFINITY);
        b.total_cmp(&a)
    });
}

/// Keep the first passage for each text prefix
pub fn dedup_by_prefix(passages: Vec<ScoredPassage>, prefix_chars: usize) -> Vec<ScoredPassage> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|p| seen.insert(p.dedup_key(prefix_chars).to_string()))
        .collect()
}
