//! Context Engine Core Components
//!
//! The intelligence layer around retrieval:
//! - Completion collaborator (scoring and synthesis)
//! - Budgeted context assembly
//! - Answer synthesis

mod completer;
mod context_builder;
mod synthesizer;

pub use completer::{create_completer, Completer, FnCompleter, HttpCompleter};
pub use context_builder::{AssembledContext, ContextBuilder, ContextBuilderConfig, ContextSource};
pub use synthesizer::{Citation, SynthesisOptions, SynthesisStyle, SynthesizedAnswer, Synthesizer};
