// llm-client-rs/src/llm_client.rs
//
// HTTP Client for the text-completion model endpoint
//
// This module provides:
// - HTTP calls to the model endpoint via reqwest
// - Exponential backoff retry mechanism for 5xx, network and timeout failures
// - Fail-fast handling of 4xx responses, surfacing the remote error message
// - A per-attempt timeout that cancels the in-flight call
//
// Configuration (.env file):
// - LLM_API_KEY: API key for the model provider
// - LLM_API_URL: Endpoint URL; "{model}" is replaced by the model name
// - LLM_MODEL: Default model when a call does not name one
// - LLM_INITIAL_RETRY_DELAY_MS: Initial delay between retries in ms (default: 1000)
// - LLM_MAX_RETRY_DELAY_MS: Maximum delay between retries in ms (default: 30000)
// - LLM_RETRY_JITTER_MS: Random jitter added to each retry delay (default: 0)

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use error_handling::{Classify, ErrorKind};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_KEY_HEADER: &str = "x-goog-api-key";

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) model: String,
    pub(crate) contents: Vec<Content>,
    pub(crate) generation_config: GenerationConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub(crate) parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default)]
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub(crate) temperature: f32,
    pub(crate) max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl ApiErrorBody {
    fn describe(&self) -> String {
        match &self.status {
            Some(status) if !status.is_empty() => format!("{} ({})", self.message, status),
            _ => self.message.clone(),
        }
    }
}

impl GenerateContentResponse {
    /// Text of the first candidate, all parts concatenated.
    fn completion_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

// Distinguishes retryable transport failures from ones that need intervention
#[derive(Debug, Error)]
pub enum LlmError {
    // 4xx - never retried
    #[error("Invalid request ({status}): {message}")]
    InvalidRequest { status: u16, message: String },

    // 5xx - retried with backoff
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Classify for LlmError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::ServerError { .. }
                | LlmError::Timeout(_)
                | LlmError::NetworkError(_)
                | LlmError::EmptyResponse
        )
    }
}

fn error_for_status(status: u16, message: String) -> LlmError {
    if (400..500).contains(&status) {
        LlmError::InvalidRequest { status, message }
    } else {
        LlmError::ServerError { status, message }
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::NetworkError(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        LlmError::NetworkError(format!("Connection failed: {}", err))
    } else {
        LlmError::NetworkError(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub default_model: String,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub retry_jitter_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
            retry_jitter_ms: 0,
            connect_timeout_ms: 5_000,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: config_rs::env_opt("LLM_API_KEY"),
            api_url: config_rs::env_opt("LLM_API_URL").unwrap_or(defaults.api_url),
            default_model: config_rs::env_opt("LLM_MODEL").unwrap_or(defaults.default_model),
            initial_retry_delay_ms: config_rs::env_or(
                "LLM_INITIAL_RETRY_DELAY_MS",
                defaults.initial_retry_delay_ms,
            ),
            max_retry_delay_ms: config_rs::env_or(
                "LLM_MAX_RETRY_DELAY_MS",
                defaults.max_retry_delay_ms,
            ),
            retry_jitter_ms: config_rs::env_or("LLM_RETRY_JITTER_MS", defaults.retry_jitter_ms),
            connect_timeout_ms: config_rs::env_or(
                "LLM_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout_ms,
            ),
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    /// Model to call; `None` uses the client's default model
    pub model: Option<String>,
    pub timeout_ms: u64,
    pub temperature: f32,
    /// Additional attempts after the first one
    pub max_retries: u32,
    pub max_output_tokens: u32,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            model: None,
            timeout_ms: 20_000,
            temperature: 0.7,
            max_retries: 2,
            max_output_tokens: 2048,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Anything that can turn a prompt into completion text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            log::warn!("LLM_API_KEY is not set; model calls will fail until it is configured");
        }
        log::info!(
            "LLM client initialized (endpoint: {}, default model: {})",
            config.api_url,
            config.default_model
        );

        Ok(Self { client, config })
    }

    fn endpoint_for(&self, model: &str) -> String {
        self.config.api_url.replace("{model}", model)
    }

    /// Exponential backoff starting at the initial delay and doubling per
    /// attempt, capped at max_retry_delay_ms. No randomization; jitter, if
    /// configured, is added separately.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_retry_delay_ms))
            .with_max_interval(Duration::from_millis(self.config.max_retry_delay_ms))
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    fn next_delay(&self, backoff: &mut ExponentialBackoff) -> Duration {
        let base = backoff
            .next_backoff()
            .unwrap_or_else(|| Duration::from_millis(self.config.max_retry_delay_ms));
        if self.config.retry_jitter_ms == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=self.config.retry_jitter_ms);
        base + Duration::from_millis(jitter)
    }

    // Execute a single request attempt
    async fn execute_request(
        &self,
        url: &str,
        api_key: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .map(|envelope| envelope.error.describe())
                .unwrap_or(text);
            return Err(error_for_status(status.as_u16(), message));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::ParseError(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = parsed.error.as_ref() {
            let code = error.code.unwrap_or(500);
            return Err(error_for_status(code, error.describe()));
        }

        let completion = parsed.completion_text();
        if completion.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(completion)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    /// Generate text with the per-attempt timeout and retry policy from `options`.
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Configuration("LLM_API_KEY is not set".to_string()))?;

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let url = self.endpoint_for(&model);

        let body = GenerateContentRequest {
            model: model.clone(),
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        log::debug!(
            "Preparing model request (model: {}, prompt length: {})",
            model,
            prompt.len()
        );

        let attempt_timeout = Duration::from_millis(options.timeout_ms);
        let mut backoff = self.create_backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            // Dropping the request future on timeout cancels the HTTP call
            let outcome =
                match tokio::time::timeout(attempt_timeout, self.execute_request(&url, api_key, &body))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout(options.timeout_ms)),
                };

            match outcome {
                Ok(text) => {
                    if attempt > 1 {
                        log::info!("Model request succeeded on attempt {}", attempt);
                    }
                    return Ok(text);
                }
                Err(err) => {
                    if !err.is_retryable() || attempt > options.max_retries {
                        log::error!("Model request failed after {} attempt(s): {}", attempt, err);
                        return Err(err);
                    }

                    let delay = self.next_delay(&mut backoff);
                    log::warn!("Retryable error: {}. Retrying in {:?}", err, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
