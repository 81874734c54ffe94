//! NoteForge search pipeline
//!
//! Keyword seeding, wikilink expansion, and passage reranking over a local
//! Markdown vault. See [`retrieval::Retriever`] for the entry point.

pub mod cli;
pub mod graph;
pub mod precision;
pub mod retrieval;

pub use retrieval::{
    RetrievalMode, RetrievalOutcome, RetrievalRequest, RetrievalResult, Retriever,
};
