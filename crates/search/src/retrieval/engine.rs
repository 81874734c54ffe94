//! Retrieval orchestrator
//!
//! Runs one query end to end: load the corpus, seed, then expand and
//! assemble a context or extract and rerank passages depending on the mode.
//! Nothing is cached between queries.

use super::keyword::{KeywordSeeder, SeederConfig};
use super::search_tool::{RipgrepTool, SearchScope, SearchTool};
use super::{
    cancellable, DocumentHit, HitOrigin, PrecisionHit, RetrievalMode, RetrievalOutcome,
    RetrievalRequest, RetrievalResult, RetrievalStats,
};
use crate::graph::GraphExpander;
use crate::precision::{extract_passages, PassageConfig, RerankConfig, Reranker};
use noteforge_common::config::AppConfig;
use noteforge_common::context::{
    create_completer, AssembledContext, Completer, ContextBuilder, ContextBuilderConfig,
    SynthesisOptions, SynthesizedAnswer, Synthesizer,
};
use noteforge_common::corpus::{Corpus, CorpusScanner};
use noteforge_common::document::Document;
use noteforge_common::errors::{AppError, Result};
use noteforge_common::metrics;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

/// Query pipeline over a note vault
pub struct Retriever {
    config: Arc<AppConfig>,
    seeder: KeywordSeeder,
    expander: GraphExpander,
    completer: Arc<dyn Completer>,
}

impl Retriever {
    pub fn new(
        config: Arc<AppConfig>,
        tool: Arc<dyn SearchTool>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        let seeder = KeywordSeeder::new(tool, SeederConfig::from(&config.search));
        let expander = GraphExpander::new(config.expansion.max_per_round);
        Self {
            config,
            seeder,
            expander,
            completer,
        }
    }

    /// Build with ripgrep and the HTTP completer
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        let tool: Arc<dyn SearchTool> = Arc::new(RipgrepTool::from_config(&config.search));
        let completer = create_completer(&config.completion)?;
        Ok(Self::new(config, tool, completer))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn completer(&self) -> &Arc<dyn Completer> {
        &self.completer
    }

    /// Answer `query` from an assembled context with the configured completer.
    ///
    /// Returns `AppError::Cancelled` as soon as `cancel` fires.
    pub async fn synthesize(
        &self,
        query: &str,
        context: &AssembledContext,
        options: SynthesisOptions,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAnswer> {
        let synthesizer = Synthesizer::new(Arc::clone(&self.completer), options);
        cancellable(cancel, synthesizer.synthesize(query, context)).await?
    }

    /// Answer a query.
    ///
    /// Returns `AppError::Cancelled` if `cancel` fires or the request deadline
    /// passes before the result is complete. Partial results are discarded.
    #[instrument(skip(self, request, cancel), fields(mode = %request.mode, query_id = tracing::field::Empty))]
    pub async fn retrieve(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> Result<RetrievalOutcome> {
        let started = Instant::now();
        let query_id = Uuid::new_v4();
        tracing::Span::current().record("query_id", tracing::field::display(query_id));

        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::EmptyQuery);
        }

        let token = cancel.child_token();
        let deadline = request.deadline.map(|limit| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::debug!(deadline_ms = limit.as_millis() as u64, "Query deadline reached");
                token.cancel();
            })
        });

        let result = self.run(query, request, query_id, &token).await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        let result = match result {
            Ok(_) if token.is_cancelled() => Err(AppError::Cancelled),
            other => other,
        };

        let elapsed = started.elapsed();
        let result = result.map(|mut outcome| {
            outcome.stats.elapsed_ms = elapsed.as_millis() as u64;
            outcome
        });

        match &result {
            Ok(outcome) => {
                let count = match &outcome.result {
                    RetrievalResult::NoResults => 0,
                    RetrievalResult::Context { documents, .. } => documents.len(),
                    RetrievalResult::Passages { hits, .. } => hits.len(),
                };
                metrics::record_query(elapsed.as_secs_f64(), request.mode.as_str(), outcome.label(), count);
                tracing::info!(
                    outcome = outcome.label(),
                    results = count,
                    seed_count = outcome.stats.seed_count,
                    expanded = outcome.stats.expanded_count,
                    elapsed_ms = outcome.stats.elapsed_ms,
                    "Query complete"
                );
            }
            Err(e) => {
                let label = if matches!(e, AppError::Cancelled) { "cancelled" } else { "error" };
                metrics::record_query(elapsed.as_secs_f64(), request.mode.as_str(), label, 0);
                tracing::warn!(error = %e, elapsed_ms = elapsed.as_millis() as u64, "Query failed");
            }
        }

        result
    }

    async fn run(
        &self,
        query: &str,
        request: &RetrievalRequest,
        query_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<RetrievalOutcome> {
        let mut stats = RetrievalStats::new(query_id);

        let (scope, corpus) = self.load_corpus(cancel).await?;
        stats.corpus_size = corpus.len();

        let limit = match request.mode {
            RetrievalMode::Naive => request.top_k.unwrap_or(self.config.search.seed_limit),
            _ => self.config.search.seed_limit,
        };

        let seeds = self.seeder.seed(query, limit, &corpus, &scope, cancel).await?;
        stats.seed_count = seeds.documents.len();
        stats.seed_tier = seeds.tier;

        if seeds.is_empty() {
            return Ok(RetrievalOutcome {
                mode: request.mode,
                stats,
                result: RetrievalResult::NoResults,
            });
        }

        let result = match request.mode {
            RetrievalMode::Naive => {
                let hits = seeds
                    .documents
                    .iter()
                    .map(|doc| document_hit(doc, HitOrigin::Seed))
                    .collect();
                self.context_result(request, hits, &seeds.documents)
            }
            RetrievalMode::Local | RetrievalMode::Global | RetrievalMode::Hybrid => {
                let depth = request.depth.unwrap_or(match request.mode {
                    RetrievalMode::Local => self.config.expansion.local_depth,
                    RetrievalMode::Global => self.config.expansion.global_depth,
                    _ => self.config.expansion.depth,
                });

                let expansion = self.expander.expand(&seeds.documents, &corpus, depth);
                stats.expanded_count = expansion.discovered().len();

                let hits = expansion
                    .documents
                    .iter()
                    .enumerate()
                    .map(|(idx, doc)| {
                        let origin = match expansion.round_of(idx) {
                            0 => HitOrigin::Seed,
                            round => HitOrigin::Linked { round },
                        };
                        document_hit(doc, origin)
                    })
                    .collect();
                self.context_result(request, hits, &expansion.documents)
            }
            RetrievalMode::Precision => {
                let documents = if self.config.precision.expand {
                    let expansion = self.expander.expand(&seeds.documents, &corpus, 1);
                    stats.expanded_count = expansion.discovered().len();
                    expansion.documents
                } else {
                    seeds.documents
                };

                let passage_config = PassageConfig {
                    max_chars: request
                        .per_passage_chars
                        .unwrap_or(self.config.precision.per_passage_chars),
                    min_chars: self.config.precision.min_passage_chars,
                };
                let passages: Vec<_> = documents
                    .iter()
                    .flat_map(|doc| extract_passages(doc, &passage_config))
                    .collect();
                stats.passages_extracted = passages.len();
                tracing::debug!(documents = documents.len(), passages = passages.len(), "Passages extracted");

                let mut rerank_config = RerankConfig::from(&self.config.precision);
                if let Some(top_k) = request.top_k {
                    rerank_config.top_k = top_k;
                }
                if let Some(threshold) = request.threshold {
                    rerank_config.threshold = threshold;
                }
                let reranker = Reranker::new(Arc::clone(&self.completer), rerank_config);

                let output = if request.rerank.unwrap_or(self.config.precision.rerank) {
                    reranker.rerank(query, passages, cancel).await?
                } else {
                    reranker.no_rerank(passages)
                };
                stats.passages_scored = output.considered;

                RetrievalResult::Passages {
                    hits: output
                        .passages
                        .into_iter()
                        .map(|scored| PrecisionHit {
                            citation: scored.passage.citation(),
                            excerpt: scored.passage.text,
                            score: scored.score,
                        })
                        .collect(),
                    rerank_mode: output.mode,
                }
            }
        };

        Ok(RetrievalOutcome {
            mode: request.mode,
            stats,
            result,
        })
    }

    fn context_result(
        &self,
        request: &RetrievalRequest,
        hits: Vec<DocumentHit>,
        documents: &[Arc<Document>],
    ) -> RetrievalResult {
        let mut builder_config = ContextBuilderConfig::from(&self.config.context);
        if let Some(per_doc) = request.per_doc_chars {
            builder_config.per_doc_chars = per_doc;
        }
        if let Some(budget) = request.budget_chars {
            builder_config.budget_chars = budget;
        }

        let context = ContextBuilder::new(builder_config).build(documents);
        RetrievalResult::Context {
            documents: hits,
            context,
        }
    }

    /// Scan the vault and derive the search scope from the same scanner
    async fn load_corpus(&self, cancel: &CancellationToken) -> Result<(SearchScope, Arc<Corpus>)> {
        let config = self.config.corpus.clone();
        let load = tokio::task::spawn_blocking(move || {
            let scanner = CorpusScanner::new(&config)?;
            Ok::<_, AppError>((SearchScope::from_scanner(&scanner), scanner.scan()))
        });

        let (scope, corpus) = cancellable(cancel, load).await?.map_err(|e| AppError::Internal {
            message: format!("corpus scan task failed: {}", e),
        })??;

        tracing::debug!(documents = corpus.len(), root = %corpus.root().display(), "Corpus loaded");
        Ok((scope, Arc::new(corpus)))
    }
}

fn document_hit(doc: &Arc<Document>, origin: HitOrigin) -> DocumentHit {
    DocumentHit {
        title: doc.title.clone(),
        relative_path: doc.relative_path.clone(),
        origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precision::RerankMode;
    use async_trait::async_trait;
    use noteforge_common::context::FnCompleter;
    use std::fs;
    use std::time::Duration;

    /// Tool that never finds anything, forcing the linear scan
    struct EmptyTool;

    #[async_trait]
    impl SearchTool for EmptyTool {
        async fn search(&self, _pattern: &str, _scope: &SearchScope) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "empty"
        }
    }

    struct SlowTool;

    #[async_trait]
    impl SearchTool for SlowTool {
        async fn search(&self, _pattern: &str, _scope: &SearchScope) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn vault(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<AppConfig>) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let mut config = AppConfig::default();
        config.corpus.root = dir.path().to_path_buf();
        (dir, Arc::new(config))
    }

    fn retriever(config: Arc<AppConfig>, tool: impl SearchTool + 'static) -> Retriever {
        Retriever::new(config, Arc::new(tool), Arc::new(FnCompleter::unavailable()))
    }

    #[tokio::test]
    async fn test_no_results_skips_downstream() {
        let (_dir, config) = vault(&[("A.md", "nothing relevant here")]);
        let outcome = retriever(config, EmptyTool)
            .retrieve(
                &RetrievalRequest::new("quantum", RetrievalMode::Hybrid),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome.result, RetrievalResult::NoResults));
        assert!(outcome.is_empty());
        assert_eq!(outcome.stats.corpus_size, 1);
    }

    #[tokio::test]
    async fn test_naive_truncates_to_top_k() {
        let (_dir, config) = vault(&[
            ("A.md", "rust notes one, long enough to keep"),
            ("B.md", "rust notes two, long enough to keep"),
            ("C.md", "rust notes three, long enough to keep"),
        ]);
        let mut request = RetrievalRequest::new("rust", RetrievalMode::Naive);
        request.top_k = Some(2);

        let outcome = retriever(config, EmptyTool)
            .retrieve(&request, &CancellationToken::new())
            .await
            .unwrap();

        match outcome.result {
            RetrievalResult::Context { documents, context } => {
                assert_eq!(documents.len(), 2);
                assert!(documents.iter().all(|d| d.origin == HitOrigin::Seed));
                assert_eq!(context.sources.len(), 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hybrid_marks_linked_documents() {
        let (_dir, config) = vault(&[
            ("Ownership.md", "Ownership rules, see [[Borrowing]] for more."),
            ("Borrowing.md", "References borrow values without taking them."),
        ]);
        let outcome = retriever(config, EmptyTool)
            .retrieve(
                &RetrievalRequest::new("ownership rules", RetrievalMode::Local),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.stats.expanded_count, 1);
        match outcome.result {
            RetrievalResult::Context { documents, context } => {
                assert_eq!(documents[1].title, "Borrowing");
                assert_eq!(documents[1].origin, HitOrigin::Linked { round: 1 });
                assert!(context.text.contains("_Source: Borrowing.md_"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_precision_without_completer_returns_unscored() {
        let (_dir, config) = vault(&[(
            "Rust.md",
            "Rust ownership keeps memory safe.\n\n## Borrowing\nRust borrowing lends access safely.\n",
        )]);
        let outcome = retriever(config, EmptyTool)
            .retrieve(
                &RetrievalRequest::new("rust", RetrievalMode::Precision),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.stats.passages_extracted, 2);
        match outcome.result {
            RetrievalResult::Passages { hits, rerank_mode } => {
                assert_eq!(rerank_mode, RerankMode::NoRerank);
                assert_eq!(hits[1].citation, "Rust.md § Borrowing");
                assert!(hits.iter().all(|h| h.score.is_none()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_cancels_query() {
        let (_dir, config) = vault(&[("A.md", "alpha")]);
        let mut request = RetrievalRequest::new("alpha", RetrievalMode::Hybrid);
        request.deadline = Some(Duration::from_millis(50));

        let result = retriever(config, SlowTool)
            .retrieve(&request, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    /// Records the scope it was given and answers one term
    struct RecordingTool {
        extensions: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchTool for RecordingTool {
        async fn search(&self, pattern: &str, scope: &SearchScope) -> Result<Vec<String>> {
            self.extensions.lock().unwrap().push(scope.extension.clone());
            Ok(if pattern == "lifetimes" {
                vec!["Lifetimes.md".to_string()]
            } else {
                Vec::new()
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_dotted_extension_reaches_tool_normalized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Lifetimes.md"), "Lifetimes annotate references.").unwrap();
        let mut config = AppConfig::default();
        config.corpus.root = dir.path().to_path_buf();
        config.corpus.extension = ".md".to_string();

        let tool = Arc::new(RecordingTool {
            extensions: std::sync::Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(
            Arc::new(config),
            tool.clone(),
            Arc::new(FnCompleter::unavailable()),
        );

        let outcome = retriever
            .retrieve(
                &RetrievalRequest::new("explain lifetimes", RetrievalMode::Naive),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.stats.seed_tier, crate::retrieval::SeedTier::Terms);
        let extensions = tool.extensions.lock().unwrap();
        assert!(!extensions.is_empty());
        assert!(extensions.iter().all(|e| e == "md"));
    }

    fn assembled(text: &str) -> AssembledContext {
        AssembledContext {
            text: text.to_string(),
            sources: vec![noteforge_common::context::ContextSource {
                title: "A".into(),
                relative_path: "A.md".into(),
                truncated: false,
            }],
            skipped: 0,
            dropped: 0,
            char_count: text.chars().count(),
        }
    }

    #[tokio::test]
    async fn test_synthesize_answers_with_citations() {
        let (_dir, config) = vault(&[("A.md", "alpha")]);
        let completer = FnCompleter::new(|_, _| Ok("Alpha is the first letter [1].".to_string()));
        let retriever = Retriever::new(config, Arc::new(EmptyTool), Arc::new(completer));

        let answer = retriever
            .synthesize(
                "what is alpha?",
                &assembled("### A\nalpha\n"),
                SynthesisOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].source.relative_path, "A.md");
    }

    #[tokio::test]
    async fn test_synthesize_stops_on_cancel() {
        let (_dir, config) = vault(&[("A.md", "alpha")]);
        let completer = FnCompleter::new(|_, _| Ok("never used".to_string()));
        let retriever = Retriever::new(config, Arc::new(EmptyTool), Arc::new(completer));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = retriever
            .synthesize(
                "what is alpha?",
                &assembled("### A\nalpha\n"),
                SynthesisOptions::default(),
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (_dir, config) = vault(&[("A.md", "alpha")]);
        let result = retriever(config, EmptyTool)
            .retrieve(
                &RetrievalRequest::new("   ", RetrievalMode::Naive),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(AppError::EmptyQuery)));
    }
}
