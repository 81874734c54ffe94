//! Keyword seeding
//!
//! Three tiers, each only consulted when the previous one under-fills:
//! 1. Whole-query phrase search through the external tool
//! 2. Per-term search for the first few query terms
//! 3. Linear scan of note contents when both tool phases found nothing

use super::search_tool::{SearchScope, SearchTool};
use super::{cancellable, SeedTier};
use noteforge_common::config::SearchConfig;
use noteforge_common::corpus::Corpus;
use noteforge_common::document::{DocPath, Document};
use noteforge_common::errors::{AppError, Result};
use noteforge_common::metrics;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Seeder configuration
#[derive(Debug, Clone)]
pub struct SeederConfig {
    /// Terms searched individually in phase 2
    pub max_terms: usize,

    /// Shorter terms are ignored
    pub min_term_len: usize,
}

impl Default for SeederConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SeederConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_terms: config.max_terms,
            min_term_len: config.min_term_len,
        }
    }
}

/// Seed documents and the tier that produced them
#[derive(Debug, Clone)]
pub struct SeedSet {
    pub documents: Vec<Arc<Document>>,
    pub tier: SeedTier,
}

impl SeedSet {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Ordered, path-deduplicated accumulator
struct SeedCollector {
    documents: Vec<Arc<Document>>,
    seen: HashSet<DocPath>,
    limit: usize,
}

impl SeedCollector {
    fn new(limit: usize) -> Self {
        Self {
            documents: Vec::new(),
            seen: HashSet::new(),
            limit,
        }
    }

    fn is_full(&self) -> bool {
        self.documents.len() >= self.limit
    }

    fn push(&mut self, doc: &Arc<Document>) {
        if !self.is_full() && self.seen.insert(doc.path.clone()) {
            self.documents.push(Arc::clone(doc));
        }
    }
}

/// Produces the initial candidate set for a query
pub struct KeywordSeeder {
    tool: Arc<dyn SearchTool>,
    config: SeederConfig,
}

impl KeywordSeeder {
    pub fn new(tool: Arc<dyn SearchTool>, config: SeederConfig) -> Self {
        Self { tool, config }
    }

    /// Seed up to `limit` documents matching `query`
    pub async fn seed(
        &self,
        query: &str,
        limit: usize,
        corpus: &Arc<Corpus>,
        scope: &SearchScope,
        cancel: &CancellationToken,
    ) -> Result<SeedSet> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::EmptyQuery);
        }

        let mut collector = SeedCollector::new(limit);
        if limit == 0 {
            return Ok(SeedSet {
                documents: Vec::new(),
                tier: SeedTier::None,
            });
        }

        // Phase 1: exact phrase
        let phrase = self.run_tool(query, scope, cancel).await?;
        let tool_usable = phrase.is_some();
        for path in phrase.unwrap_or_default() {
            if let Some(doc) = corpus.lookup_reported_path(&path) {
                collector.push(doc);
            }
        }
        let phrase_hits = collector.documents.len();

        // Phase 2: individual terms, only while the tool is usable
        if tool_usable && !collector.is_full() {
            for term in split_terms(query, self.config.min_term_len, self.config.max_terms) {
                if collector.is_full() {
                    break;
                }
                let Some(paths) = self.run_tool(&term, scope, cancel).await? else {
                    break;
                };
                for path in paths {
                    if let Some(doc) = corpus.lookup_reported_path(&path) {
                        collector.push(doc);
                    }
                }
            }
        }

        let tier = if collector.documents.len() > phrase_hits {
            SeedTier::Terms
        } else if phrase_hits > 0 {
            SeedTier::Phrase
        } else {
            // Fallback: linear scan
            let documents = linear_scan(corpus, query, limit, cancel).await?;
            collector.documents = documents;
            if collector.documents.is_empty() {
                SeedTier::None
            } else {
                SeedTier::LinearScan
            }
        };

        metrics::record_seed_tier(tier.as_str());
        tracing::debug!(
            tier = tier.as_str(),
            seeds = collector.documents.len(),
            phrase_hits,
            "Seed set built"
        );

        Ok(SeedSet {
            documents: collector.documents,
            tier,
        })
    }

    /// Run the tool.
    ///
    /// Soft failures become an empty result. `None` means the tool is missing
    /// or timed out and should not be called again for this query.
    async fn run_tool(
        &self,
        pattern: &str,
        scope: &SearchScope,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<String>>> {
        match cancellable(cancel, self.tool.search(pattern, scope)).await? {
            Ok(paths) => Ok(Some(paths)),
            Err(e) => {
                let (reason, usable) = match &e {
                    AppError::SearchToolTimeout { .. } => ("timeout", false),
                    AppError::SearchToolUnavailable { .. } => ("unavailable", false),
                    _ => ("error", true),
                };
                metrics::record_tool_failure(reason);
                tracing::warn!(tool = self.tool.name(), pattern, error = %e, "Search tool failed");
                Ok(usable.then(Vec::new))
            }
        }
    }
}

/// Split a query into distinct search terms.
///
/// Splits on anything that is not alphanumeric, keeps terms of at least
/// `min_len` characters, drops case-insensitive repeats and keeps the first
/// `max_terms`.
pub fn split_terms(query: &str, min_len: usize, max_terms: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= min_len)
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(max_terms)
        .map(str::to_string)
        .collect()
}

/// Case-insensitive substring scan over every note
async fn linear_scan(
    corpus: &Arc<Corpus>,
    query: &str,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Arc<Document>>> {
    let corpus = Arc::clone(corpus);
    let needle = query.to_lowercase();

    let scan = tokio::task::spawn_blocking(move || {
        corpus
            .documents()
            .iter()
            .filter(|doc| doc.raw_content.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect::<Vec<_>>()
    });

    cancellable(cancel, scan)
        .await?
        .map_err(|e| AppError::Internal {
            message: format!("linear scan task failed: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;

    /// Tool double answering from a fixed table
    struct TableTool {
        answers: HashMap<String, Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchTool for TableTool {
        async fn search(&self, pattern: &str, _scope: &SearchScope) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(pattern.to_string());
            Ok(self.answers.get(pattern).cloned().unwrap_or_default())
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    #[derive(Default)]
    struct BrokenTool {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl SearchTool for BrokenTool {
        async fn search(&self, _pattern: &str, _scope: &SearchScope) -> Result<Vec<String>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(AppError::SearchToolTimeout { timeout_ms: 20_000 })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn vault(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<Corpus>, SearchScope) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let config = noteforge_common::config::CorpusConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let corpus = Arc::new(Corpus::load(&config).unwrap());
        let scope = SearchScope {
            root: corpus.root().to_path_buf(),
            extension: "md".into(),
            excluded_dirs: vec![],
        };
        (dir, corpus, scope)
    }

    #[test]
    fn test_split_terms() {
        assert_eq!(
            split_terms("what is a borrow-checker? Borrow!", 2, 5),
            vec!["what", "is", "borrow", "checker"]
        );
        assert_eq!(split_terms("a b c", 2, 5), Vec::<String>::new());
        assert_eq!(split_terms("one two three four five six", 2, 5).len(), 5);
    }

    #[tokio::test]
    async fn test_phrase_hits_fill_limit() {
        let (_dir, corpus, scope) = vault(&[("A.md", "rust ownership"), ("B.md", "rust")]);
        let tool = TableTool {
            answers: HashMap::from([("rust ownership".to_string(), vec!["A.md".to_string()])]),
            calls: Mutex::new(vec![]),
        };
        let seeder = KeywordSeeder::new(Arc::new(tool), SeederConfig::default());

        let seeds = seeder
            .seed("rust ownership", 1, &corpus, &scope, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(seeds.tier, SeedTier::Phrase);
        assert_eq!(seeds.documents.len(), 1);
        assert_eq!(seeds.documents[0].title, "A");
    }

    #[tokio::test]
    async fn test_terms_merge_in_order_without_duplicates() {
        let (_dir, corpus, scope) = vault(&[("A.md", "alpha"), ("B.md", "beta"), ("C.md", "alpha beta")]);
        let tool = Arc::new(TableTool {
            answers: HashMap::from([
                ("alpha".to_string(), vec!["C.md".to_string(), "A.md".to_string()]),
                ("beta".to_string(), vec!["C.md".to_string(), "B.md".to_string()]),
            ]),
            calls: Mutex::new(vec![]),
        });
        let seeder = KeywordSeeder::new(tool.clone(), SeederConfig::default());

        let seeds = seeder
            .seed("alpha beta", 10, &corpus, &scope, &CancellationToken::new())
            .await
            .unwrap();
        let titles: Vec<_> = seeds.documents.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
        assert_eq!(seeds.tier, SeedTier::Terms);
        assert_eq!(*tool.calls.lock().unwrap(), vec!["alpha beta", "alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_paths_outside_vault_are_ignored() {
        let (_dir, corpus, scope) = vault(&[("A.md", "alpha")]);
        let tool = TableTool {
            answers: HashMap::from([(
                "alpha".to_string(),
                vec!["/etc/passwd".to_string(), "../escape.md".to_string(), "A.md".to_string()],
            )]),
            calls: Mutex::new(vec![]),
        };
        let seeder = KeywordSeeder::new(Arc::new(tool), SeederConfig::default());

        let seeds = seeder
            .seed("alpha", 10, &corpus, &scope, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(seeds.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_broken_tool_falls_back_to_linear_scan() {
        let (_dir, corpus, scope) = vault(&[
            ("A.md", "Notes on the BORROW Checker"),
            ("B.md", "unrelated"),
        ]);
        let seeder = KeywordSeeder::new(Arc::new(BrokenTool::default()), SeederConfig::default());

        let seeds = seeder
            .seed("borrow checker", 10, &corpus, &scope, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(seeds.tier, SeedTier::LinearScan);
        assert_eq!(seeds.documents.len(), 1);
        assert_eq!(seeds.documents[0].title, "A");
    }

    #[tokio::test]
    async fn test_unusable_tool_skips_term_phase() {
        let (_dir, corpus, scope) = vault(&[("A.md", "one two three four five")]);
        let tool = Arc::new(BrokenTool::default());
        let seeder = KeywordSeeder::new(tool.clone(), SeederConfig::default());

        let seeds = seeder
            .seed("one two three four five", 10, &corpus, &scope, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(seeds.tier, SeedTier::LinearScan);
        assert_eq!(tool.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_matches_anywhere() {
        let (_dir, corpus, scope) = vault(&[("A.md", "alpha")]);
        let seeder = KeywordSeeder::new(Arc::new(BrokenTool::default()), SeederConfig::default());

        let seeds = seeder
            .seed("zeta", 10, &corpus, &scope, &CancellationToken::new())
            .await
            .unwrap();
        assert!(seeds.is_empty());
        assert_eq!(seeds.tier, SeedTier::None);
    }

    #[tokio::test]
    async fn test_cancelled_seed() {
        let (_dir, corpus, scope) = vault(&[("A.md", "alpha")]);
        let seeder = KeywordSeeder::new(Arc::new(BrokenTool::default()), SeederConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = seeder.seed("alpha", 10, &corpus, &scope, &cancel).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
