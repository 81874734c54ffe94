//! Completion service abstraction
//!
//! A single `complete(context, instructions)` call used both for passage
//! scoring and for answer synthesis. Implementations:
//! - OpenAI-compatible chat completions over HTTP
//! - Closure-backed completer for tests and offline runs

use crate::config::CompletionConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for text completion
#[async_trait]
pub trait Completer: Send + Sync {
    /// Complete `instructions` against `context`
    async fn complete(&self, context: &str, instructions: &str) -> Result<String>;

    /// Whether the service can be called at all
    fn is_available(&self) -> bool {
        true
    }

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client
pub struct HttpCompleter {
    config: CompletionConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl HttpCompleter {
    /// Create a new HTTP completer
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    async fn request(&self, api_key: &str, context: &str, instructions: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instructions,
                },
                ChatMessage {
                    role: "user",
                    content: context,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                message: format!("Completion API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::Upstream {
            message: format!("Failed to parse completion response: {}", e),
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Upstream {
                message: "Empty response from completion API".to_string(),
            })
    }

    fn classify(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::CompletionTimeout {
                timeout_ms: self.config.timeout_secs * 1000,
            }
        } else if err.is_connect() {
            AppError::CompletionUnavailable {
                message: err.to_string(),
            }
        } else {
            AppError::HttpClient(err)
        }
    }
}

#[async_trait]
impl Completer for HttpCompleter {
    async fn complete(&self, context: &str, instructions: &str) -> Result<String> {
        let api_key = self.api_key().ok_or_else(|| AppError::CompletionUnavailable {
            message: "no API key configured".to_string(),
        })?;

        let start = Instant::now();
        let result = self.request(api_key, context, instructions).await;
        metrics::record_completion(
            start.elapsed().as_secs_f64(),
            &self.config.model,
            result.is_ok(),
        );

        if let Err(e) = &result {
            tracing::warn!(model = %self.config.model, error = %e, "Completion request failed");
        }
        result
    }

    fn is_available(&self) -> bool {
        self.api_key().is_some()
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

type CompleteFn = dyn Fn(&str, &str) -> Result<String> + Send + Sync;

/// Completer backed by a closure
pub struct FnCompleter {
    func: Box<CompleteFn>,
    available: bool,
}

impl FnCompleter {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
            available: true,
        }
    }

    /// A completer that reports itself unavailable and always fails
    pub fn unavailable() -> Self {
        Self {
            func: Box::new(|_, _| {
                Err(AppError::CompletionUnavailable {
                    message: "completer disabled".to_string(),
                })
            }),
            available: false,
        }
    }
}

#[async_trait]
impl Completer for FnCompleter {
    async fn complete(&self, context: &str, instructions: &str) -> Result<String> {
        (self.func)(context, instructions)
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn model_name(&self) -> &str {
        "fn-completer"
    }
}

/// Create a completer based on configuration
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    let completer = HttpCompleter::new(config.clone())?;
    if !completer.is_available() {
        tracing::warn!("Completion API key not set, scoring and synthesis disabled");
    }
    Ok(Arc::new(completer))
}
