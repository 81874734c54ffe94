//! Vault scanning
//!
//! Walks the vault root, skipping excluded directory names at any depth, and
//! loads every note with the configured extension. The corpus is rebuilt for
//! each query and never written back.

use crate::config::CorpusConfig;
use crate::document::{DocPath, Document};
use crate::errors::{AppError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// Lazily enumerates notes under a vault root
#[derive(Debug, Clone)]
pub struct CorpusScanner {
    root: PathBuf,
    extension: String,
    excluded_dirs: Vec<String>,
}

impl CorpusScanner {
    /// Create a scanner; the root is canonicalized once here
    pub fn new(config: &CorpusConfig) -> Result<Self> {
        let root = config
            .root
            .canonicalize()
            .map_err(|_| AppError::CorpusNotFound {
                path: config.root.display().to_string(),
            })?;

        if !root.is_dir() {
            return Err(AppError::CorpusNotFound {
                path: root.display().to_string(),
            });
        }

        Ok(Self {
            root,
            extension: config.extension.trim_start_matches('.').to_string(),
            excluded_dirs: config.excluded_dirs.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn excluded_dirs(&self) -> &[String] {
        &self.excluded_dirs
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.excluded_dirs.iter().any(|ex| ex == name))
                .unwrap_or(false)
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }

    /// Iterate over loadable notes in traversal order.
    ///
    /// Each call starts a fresh walk.
    pub fn documents(&self) -> impl Iterator<Item = Document> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| !self.is_excluded(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable vault entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.has_extension(entry.path()))
            .filter_map(move |entry| Document::load(&self.root, entry.path()))
    }

    /// Scan the whole vault into a corpus
    pub fn scan(&self) -> Corpus {
        Corpus::from_documents(self.root.clone(), self.documents())
    }
}

/// All notes of one query run, with lookup indexes
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    documents: Vec<Arc<Document>>,
    by_path: HashMap<DocPath, usize>,
    by_title: HashMap<String, usize>,
    by_title_lower: HashMap<String, usize>,
}

impl Corpus {
    /// Scan the configured vault
    pub fn load(config: &CorpusConfig) -> Result<Self> {
        let scanner = CorpusScanner::new(config)?;
        let corpus = scanner.scan();
        tracing::debug!(
            root = %scanner.root().display(),
            documents = corpus.len(),
            "Corpus scanned"
        );
        Ok(corpus)
    }

    /// Build from documents, keeping the first occurrence of each path.
    ///
    /// When two notes share a title the first in traversal order wins
    /// title resolution.
    pub fn from_documents(root: PathBuf, docs: impl IntoIterator<Item = Document>) -> Self {
        let mut corpus = Self {
            root,
            documents: Vec::new(),
            by_path: HashMap::new(),
            by_title: HashMap::new(),
            by_title_lower: HashMap::new(),
        };

        for doc in docs {
            if corpus.by_path.contains_key(&doc.path) {
                continue;
            }
            let idx = corpus.documents.len();
            corpus.by_path.insert(doc.path.clone(), idx);
            corpus.by_title.entry(doc.title.clone()).or_insert(idx);
            corpus
                .by_title_lower
                .entry(doc.title.to_lowercase())
                .or_insert(idx);
            corpus.documents.push(Arc::new(doc));
        }

        corpus
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn get(&self, path: &DocPath) -> Option<&Arc<Document>> {
        self.by_path.get(path).map(|&idx| &self.documents[idx])
    }

    /// Resolve a reference target: exact title first, then case-insensitive
    pub fn resolve_title(&self, target: &str) -> Option<&Arc<Document>> {
        self.by_title
            .get(target)
            .or_else(|| self.by_title_lower.get(&target.to_lowercase()))
            .map(|&idx| &self.documents[idx])
    }

    /// Map a path reported by an external tool to a corpus document.
    ///
    /// Relative paths are taken relative to the root. Paths that do not
    /// resolve inside the root, or that are not part of the corpus, yield
    /// `None`.
    pub fn lookup_reported_path(&self, reported: &str) -> Option<&Arc<Document>> {
        let reported = reported.trim();
        if reported.is_empty() {
            return None;
        }

        let candidate = Path::new(reported);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let resolved = DocPath::resolve(&candidate).ok()?;
        if !resolved.as_path().starts_with(&self.root) {
            tracing::debug!(path = %resolved, "Ignoring path outside the vault");
            return None;
        }
        self.get(&resolved)
    }
}
