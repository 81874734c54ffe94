//! Configuration management for NoteForge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    /// Vault location and scanning rules
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Keyword seeding configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Link graph expansion configuration
    #[serde(default)]
    pub expansion: ExpansionConfig,

    /// Hybrid context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Precision passage retrieval configuration
    #[serde(default)]
    pub precision: PrecisionConfig,

    /// Completion (scoring and synthesis) service configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorpusConfig {
    /// Vault root directory
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Note file extension, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Directory names skipped at any depth
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Full-text search binary (ripgrep)
    #[serde(default = "default_tool_binary")]
    pub tool_binary: String,

    /// Subprocess timeout in seconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Maximum seed documents
    #[serde(default = "default_seed_limit")]
    pub seed_limit: usize,

    /// Maximum individual terms searched in phase 2
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,

    /// Minimum term length in phase 2
    #[serde(default = "default_min_term_len")]
    pub min_term_len: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpansionConfig {
    /// Depth for hybrid mode
    #[serde(default = "default_depth")]
    pub depth: usize,

    /// Depth for local mode
    #[serde(default = "default_local_depth")]
    pub local_depth: usize,

    /// Depth for global mode
    #[serde(default = "default_global_depth")]
    pub global_depth: usize,

    /// Cap on documents discovered per BFS round
    #[serde(default = "default_max_per_round")]
    pub max_per_round: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Characters of body taken per document
    #[serde(default = "default_per_doc_chars")]
    pub per_doc_chars: usize,

    /// Hard cap on the assembled context
    #[serde(default = "default_total_budget")]
    pub total_budget_chars: usize,

    /// Bodies with fewer non-whitespace characters are skipped
    #[serde(default = "default_min_body_chars")]
    pub min_body_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrecisionConfig {
    /// Number of passages returned
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum score kept
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Characters per passage
    #[serde(default = "default_per_passage_chars")]
    pub per_passage_chars: usize,

    /// Passages per scoring call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Scoring calls in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout per scoring call in seconds
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,

    /// Leading characters compared when collapsing near-duplicates
    #[serde(default = "default_dedup_prefix")]
    pub dedup_prefix_chars: usize,

    /// Shorter blocks are discarded
    #[serde(default = "default_min_passage_chars")]
    pub min_passage_chars: usize,

    /// Expand seeds one hop before extracting passages
    #[serde(default)]
    pub expand: bool,

    /// Score passages (false returns the first K unscored)
    #[serde(default = "default_enabled")]
    pub rerank: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Chat completions endpoint
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    /// API key (unset means the service is unavailable)
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_root() -> PathBuf { PathBuf::from(".") }
fn default_extension() -> String { "md".to_string() }
fn default_excluded_dirs() -> Vec<String> {
    [".git", ".obsidian", ".trash", "node_modules"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_tool_binary() -> String { "rg".to_string() }
fn default_tool_timeout() -> u64 { 20 }
fn default_seed_limit() -> usize { 10 }
fn default_max_terms() -> usize { 5 }
fn default_min_term_len() -> usize { 2 }
fn default_depth() -> usize { 1 }
fn default_local_depth() -> usize { 1 }
fn default_global_depth() -> usize { 2 }
fn default_max_per_round() -> usize { 10 }
fn default_per_doc_chars() -> usize { 3000 }
fn default_total_budget() -> usize { 24_000 }
fn default_min_body_chars() -> usize { 20 }
fn default_top_k() -> usize { 8 }
fn default_threshold() -> f32 { 6.0 }
fn default_per_passage_chars() -> usize { 800 }
fn default_batch_size() -> usize { 12 }
fn default_concurrency() -> usize { 4 }
fn default_batch_timeout() -> u64 { 60 }
fn default_dedup_prefix() -> usize { 100 }
fn default_min_passage_chars() -> usize { 20 }
fn default_enabled() -> bool { true }
fn default_completion_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_completion_model() -> String { "gpt-4o-mini".to_string() }
fn default_completion_timeout() -> u64 { 60 }
fn default_max_tokens() -> usize { 1000 }
fn default_temperature() -> f32 { 0.2 }
fn default_log_level() -> String { "info".to_string() }

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extension: default_extension(),
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tool_binary: default_tool_binary(),
            tool_timeout_secs: default_tool_timeout(),
            seed_limit: default_seed_limit(),
            max_terms: default_max_terms(),
            min_term_len: default_min_term_len(),
        }
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            local_depth: default_local_depth(),
            global_depth: default_global_depth(),
            max_per_round: default_max_per_round(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            per_doc_chars: default_per_doc_chars(),
            total_budget_chars: default_total_budget(),
            min_body_chars: default_min_body_chars(),
        }
    }
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
            per_passage_chars: default_per_passage_chars(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            batch_timeout_secs: default_batch_timeout(),
            dedup_prefix_chars: default_dedup_prefix(),
            min_passage_chars: default_min_passage_chars(),
            expand: false,
            rerank: default_enabled(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            api_key: None,
            model: default_completion_model(),
            timeout_secs: default_completion_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__CORPUS__ROOT=~/vault
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("corpus.excluded_dirs")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific config file, still honouring APP__ overrides
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("corpus.excluded_dirs")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.corpus.extension.trim().is_empty() {
            return Err(AppError::Validation {
                message: "corpus extension must not be empty".to_string(),
                field: Some("corpus.extension".to_string()),
            });
        }
        if self.precision.batch_size == 0 {
            return Err(AppError::Validation {
                message: "batch size must be at least 1".to_string(),
                field: Some("precision.batch_size".to_string()),
            });
        }
        if self.precision.concurrency == 0 {
            return Err(AppError::Validation {
                message: "concurrency must be at least 1".to_string(),
                field: Some("precision.concurrency".to_string()),
            });
        }
        if !self.corpus.root.is_dir() {
            return Err(AppError::CorpusNotFound {
                path: self.corpus.root.display().to_string(),
            });
        }
        Ok(())
    }
}
