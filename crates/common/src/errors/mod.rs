//! Error types for NoteForge
//!
//! Provides:
//! - Distinct error types for the few failure modes that reach the caller
//! - Error codes for machine-readable identification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    EmptyQuery,

    // Corpus errors (4xxx)
    CorpusNotFound,

    // External collaborator errors (8xxx)
    SearchToolUnavailable,
    SearchToolTimeout,
    CompletionUnavailable,
    CompletionTimeout,
    UpstreamError,

    // Control flow (6xxx)
    Cancelled,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::EmptyQuery => 1002,

            ErrorCode::CorpusNotFound => 4001,

            ErrorCode::Cancelled => 6001,

            ErrorCode::SearchToolUnavailable => 8001,
            ErrorCode::SearchToolTimeout => 8002,
            ErrorCode::CompletionUnavailable => 8003,
            ErrorCode::CompletionTimeout => 8004,
            ErrorCode::UpstreamError => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Query is empty")]
    EmptyQuery,

    // Corpus errors
    #[error("Corpus root not found: {path}")]
    CorpusNotFound { path: String },

    // External collaborators
    #[error("Search tool unavailable: {message}")]
    SearchToolUnavailable { message: String },

    #[error("Search tool timed out after {timeout_ms}ms")]
    SearchToolTimeout { timeout_ms: u64 },

    #[error("Completion service unavailable: {message}")]
    CompletionUnavailable { message: String },

    #[error("Completion timed out after {timeout_ms}ms")]
    CompletionTimeout { timeout_ms: u64 },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Control flow
    #[error("Retrieval cancelled")]
    Cancelled,

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::EmptyQuery => ErrorCode::EmptyQuery,
            AppError::CorpusNotFound { .. } => ErrorCode::CorpusNotFound,
            AppError::SearchToolUnavailable { .. } => ErrorCode::SearchToolUnavailable,
            AppError::SearchToolTimeout { .. } => ErrorCode::SearchToolTimeout,
            AppError::CompletionUnavailable { .. } => ErrorCode::CompletionUnavailable,
            AppError::CompletionTimeout { .. } => ErrorCode::CompletionTimeout,
            AppError::Upstream { .. } | AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Cancelled => ErrorCode::Cancelled,
            AppError::Internal { .. } | AppError::Io(_) | AppError::Other(_) => {
                ErrorCode::InternalError
            }
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// True when the completion collaborator cannot be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::CompletionUnavailable { .. } | AppError::SearchToolUnavailable { .. }
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
