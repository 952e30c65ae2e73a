//! # Telemetrist - Chat Request Telemetry
//!
//! Records one [`LogEntry`] per chat request: stage timings, failure notes and
//! the final response. Entries are emitted as a structured JSON log line and,
//! when an endpoint is configured, forwarded over HTTP. PII is redacted from
//! free-text fields before the entry leaves the process.

pub mod entry;

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

pub use entry::LogEntry;
pub use shared_types::StageTiming;

/// Log target for the per-request JSON lines
pub const CHAT_LOG_TARGET: &str = "chat_log";

/// Configuration for telemetrist
#[derive(Debug, Clone)]
pub struct TelemetristConfig {
    pub enabled: bool,
    /// Optional HTTP endpoint entries are POSTed to
    pub endpoint: Option<String>,
    pub pii_redaction_enabled: bool,
    pub request_timeout_ms: u64,
}

impl Default for TelemetristConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            pii_redaction_enabled: true,
            request_timeout_ms: 5_000,
        }
    }
}

impl TelemetristConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: config_rs::env_flag("TELEMETRY_ENABLED", defaults.enabled),
            endpoint: config_rs::env_opt("TELEMETRY_ENDPOINT"),
            pii_redaction_enabled: config_rs::env_flag(
                "TELEMETRY_PII_REDACTION",
                defaults.pii_redaction_enabled,
            ),
            request_timeout_ms: config_rs::env_or(
                "TELEMETRY_TIMEOUT_MS",
                defaults.request_timeout_ms,
            ),
        }
    }
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email pattern")
});
static CARD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").expect("valid card pattern")
});
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{3}[-. ]?\d{3}[-. ]?\d{4}\b").expect("valid phone pattern")
});

/// PII redaction patterns
#[derive(Debug, Clone, Copy, Default)]
pub struct PiiRedactor;

impl PiiRedactor {
    pub fn redact(&self, text: &str) -> String {
        // Cards before phones: a card number contains phone-shaped runs
        let result = EMAIL_PATTERN.replace_all(text, "[EMAIL_REDACTED]");
        let result = CARD_PATTERN.replace_all(&result, "[CARD_REDACTED]");
        let result = PHONE_PATTERN.replace_all(&result, "[PHONE_REDACTED]");
        result.into_owned()
    }

    pub fn redact_entry(&self, entry: &mut LogEntry) {
        entry.message = self.redact(&entry.message);
        for error in entry.errors.iter_mut() {
            *error = self.redact(error);
        }
        for timing in entry.stage_timings.values_mut() {
            if let Some(reason) = timing.failure_reason.as_mut() {
                *reason = self.redact(reason);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetristError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Destination for finished log entries.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn log_chat_request(&self, entry: LogEntry) -> Result<(), TelemetristError>;
}

/// Main telemetrist service
pub struct Telemetrist {
    config: TelemetristConfig,
    redactor: PiiRedactor,
    http_client: reqwest::Client,
}

impl Telemetrist {
    pub fn new(config: TelemetristConfig) -> Result<Self, TelemetristError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| TelemetristError::Http(e.to_string()))?;

        Ok(Self {
            config,
            redactor: PiiRedactor,
            http_client,
        })
    }

    fn prepare(&self, mut entry: LogEntry) -> LogEntry {
        if self.config.pii_redaction_enabled {
            self.redactor.redact_entry(&mut entry);
        }
        entry
    }

    async fn forward(&self, endpoint: &str, entry: &LogEntry) -> Result<(), TelemetristError> {
        let response = self
            .http_client
            .post(endpoint)
            .json(entry)
            .send()
            .await
            .map_err(|e| TelemetristError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TelemetristError::Http(format!(
                "Telemetry endpoint returned status: {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for Telemetrist {
    async fn log_chat_request(&self, entry: LogEntry) -> Result<(), TelemetristError> {
        if !self.config.enabled {
            return Ok(());
        }

        let entry = self.prepare(entry);
        let line = serde_json::to_string(&entry)
            .map_err(|e| TelemetristError::Serialization(e.to_string()))?;
        log::info!(target: CHAT_LOG_TARGET, "{}", line);

        if let Some(endpoint) = self.config.endpoint.as_deref() {
            self.forward(endpoint, &entry).await?;
            log::debug!("Forwarded chat log {} to telemetry endpoint", entry.request_id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ChatRequest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_entry() -> LogEntry {
        let mut entry = LogEntry::for_request(&ChatRequest::new(
            "u1",
            "Email me at jane.doe@example.com about a date outfit",
        ));
        entry.record_failure(
            "wardrobe_fetch",
            Duration::from_millis(3),
            "lookup failed for 555-123-4567",
        );
        entry
    }

    #[test]
    fn test_pii_redaction() {
        let redactor = PiiRedactor;
        let text = "Contact me at john@example.com or 555-123-4567, card 4111 1111 1111 1111";
        let redacted = redactor.redact(text);
        assert!(redacted.contains("[EMAIL_REDACTED]"));
        assert!(redacted.contains("[PHONE_REDACTED]"));
        assert!(redacted.contains("[CARD_REDACTED]"));
        assert!(!redacted.contains("john@example.com"));
    }

    #[test]
    fn test_redact_entry_covers_free_text_fields() {
        let mut entry = sample_entry();
        PiiRedactor.redact_entry(&mut entry);
        assert!(entry.message.contains("[EMAIL_REDACTED]"));
        assert!(entry.errors[0].contains("[PHONE_REDACTED]"));
        assert_eq!(
            entry.stage_timings["wardrobe_fetch"].failure_reason.as_deref(),
            Some("lookup failed for [PHONE_REDACTED]")
        );
    }

    #[tokio::test]
    async fn test_forwards_redacted_entry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let telemetrist = Telemetrist::new(TelemetristConfig {
            endpoint: Some(format!("{}/events", mock_server.uri())),
            ..TelemetristConfig::default()
        })
        .unwrap();

        telemetrist.log_chat_request(sample_entry()).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["userId"], "u1");
        assert!(body["message"].as_str().unwrap().contains("[EMAIL_REDACTED]"));
    }

    #[tokio::test]
    async fn test_endpoint_failure_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let telemetrist = Telemetrist::new(TelemetristConfig {
            endpoint: Some(mock_server.uri()),
            ..TelemetristConfig::default()
        })
        .unwrap();

        let err = telemetrist.log_chat_request(sample_entry()).await.unwrap_err();
        assert!(matches!(err, TelemetristError::Http(_)));
    }

    #[tokio::test]
    async fn test_disabled_telemetrist_sends_nothing() {
        let mock_server = MockServer::start().await;
        let telemetrist = Telemetrist::new(TelemetristConfig {
            enabled: false,
            endpoint: Some(mock_server.uri()),
            ..TelemetristConfig::default()
        })
        .unwrap();

        telemetrist.log_chat_request(sample_entry()).await.unwrap();
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }
}
