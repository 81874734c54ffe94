//! NoteForge Common Library
//!
//! Shared code for the NoteForge retrieval pipeline including:
//! - Note model and metadata parsing
//! - Vault scanning
//! - Completion client abstraction
//! - Context assembly and synthesis
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod context;
pub mod corpus;
pub mod document;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::Completer;
pub use corpus::{Corpus, CorpusScanner};
pub use document::{DocPath, Document};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
