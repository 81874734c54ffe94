//! Breadth-first expansion over wikilinks
//!
//! References are resolved lazily against the corpus title index, so no
//! adjacency list is materialized for notes the traversal never reaches.

use noteforge_common::corpus::Corpus;
use noteforge_common::document::{DocPath, Document};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of an expansion
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Seeds first, then discovered notes in discovery order
    pub documents: Vec<Arc<Document>>,

    /// Number of distinct seeds at the front of `documents`
    pub seed_count: usize,

    /// Notes discovered in each completed round
    pub rounds: Vec<usize>,
}

impl Expansion {
    /// Notes added beyond the seeds
    pub fn discovered(&self) -> &[Arc<Document>] {
        &self.documents[self.seed_count..]
    }

    /// Round in which the note at `idx` was discovered (0 for seeds)
    pub fn round_of(&self, idx: usize) -> usize {
        if idx < self.seed_count {
            return 0;
        }
        let mut boundary = self.seed_count;
        for (round, &count) in self.rounds.iter().enumerate() {
            boundary += count;
            if idx < boundary {
                return round + 1;
            }
        }
        self.rounds.len()
    }
}

/// Link graph expander
#[derive(Debug, Clone)]
pub struct GraphExpander {
    /// Cap on notes discovered per round
    max_per_round: usize,
}

impl GraphExpander {
    pub fn new(max_per_round: usize) -> Self {
        Self { max_per_round }
    }

    /// Resolve a note's references to corpus documents, in reference order
    pub fn neighbors<'a>(
        &self,
        doc: &'a Document,
        corpus: &'a Corpus,
    ) -> impl Iterator<Item = &'a Arc<Document>> + 'a {
        doc.outgoing_refs
            .iter()
            .filter_map(move |target| corpus.resolve_title(target))
    }

    /// Expand `seeds` for up to `depth` rounds.
    ///
    /// Stops early when a round discovers nothing. No note is visited twice
    /// and duplicate seeds are collapsed.
    pub fn expand(&self, seeds: &[Arc<Document>], corpus: &Corpus, depth: usize) -> Expansion {
        let mut visited: HashSet<DocPath> = HashSet::new();
        let mut documents: Vec<Arc<Document>> = Vec::with_capacity(seeds.len());

        for seed in seeds {
            if visited.insert(seed.path.clone()) {
                documents.push(Arc::clone(seed));
            }
        }

        let seed_count = documents.len();
        let mut frontier: Vec<Arc<Document>> = documents.clone();
        let mut rounds = Vec::new();

        for round in 0..depth {
            if frontier.is_empty() {
                break;
            }

            let mut next: Vec<Arc<Document>> = Vec::new();

            'frontier: for doc in &frontier {
                for neighbor in self.neighbors(doc, corpus) {
                    if next.len() >= self.max_per_round {
                        break 'frontier;
                    }
                    if visited.insert(neighbor.path.clone()) {
                        next.push(Arc::clone(neighbor));
                    }
                }
            }

            tracing::trace!(round = round + 1, discovered = next.len(), "Expansion round");

            if next.is_empty() {
                break;
            }

            rounds.push(next.len());
            documents.extend(next.iter().cloned());
            frontier = next;
        }

        tracing::debug!(
            seeds = seed_count,
            discovered = documents.len() - seed_count,
            rounds = rounds.len(),
            "Link expansion complete"
        );

        Expansion {
            documents,
            seed_count,
            rounds,
        }
    }
}
