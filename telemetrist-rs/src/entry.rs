//! The per-request log record.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{ChatRequest, ChatResponse, Intent, StageTiming};
use uuid::Uuid;

/// One chat request's telemetry. Created once the request has passed
/// validation, updated as each stage settles, dispatched at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub request_id: String,
    pub user_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub stage_timings: BTreeMap<String, StageTiming>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_response: Option<ChatResponse>,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn for_request(request: &ChatRequest) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            message: request.message.clone(),
            conversation_id: request.conversation_id.clone(),
            intent: None,
            stage_timings: BTreeMap::new(),
            errors: Vec::new(),
            final_response: None,
            created_at: Utc::now(),
        }
    }

    pub fn record_success(&mut self, stage: &str, elapsed: Duration) {
        self.stage_timings.insert(
            stage.to_string(),
            StageTiming {
                duration_ms: elapsed.as_millis() as u64,
                success: true,
                failure_reason: None,
            },
        );
    }

    /// Records the timing and appends `"<stage>: <reason>"` to `errors`.
    pub fn record_failure(&mut self, stage: &str, elapsed: Duration, reason: impl Into<String>) {
        let reason = reason.into();
        self.errors.push(format!("{}: {}", stage, reason));
        self.stage_timings.insert(
            stage.to_string(),
            StageTiming {
                duration_ms: elapsed.as_millis() as u64,
                success: false,
                failure_reason: Some(reason),
            },
        );
    }

    /// An error that is not tied to a single stage.
    pub fn record_error(&mut self, reason: impl Into<String>) {
        self.errors.push(reason.into());
    }

    pub fn failed_stages(&self) -> Vec<&str> {
        self.stage_timings
            .iter()
            .filter(|(_, timing)| !timing.success)
            .map(|(stage, _)| stage.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_starts_empty() {
        let mut request = ChatRequest::new("u1", "hello");
        request.conversation_id = Some("c-9".to_string());
        let entry = LogEntry::for_request(&request);

        assert_eq!(entry.user_id, "u1");
        assert_eq!(entry.conversation_id.as_deref(), Some("c-9"));
        assert!(entry.intent.is_none());
        assert!(entry.errors.is_empty());
        assert!(Uuid::parse_str(&entry.request_id).is_ok());
    }

    #[test]
    fn test_failure_appends_stage_note() {
        let mut entry = LogEntry::for_request(&ChatRequest::new("u1", "hello"));
        entry.record_success("intent", Duration::from_millis(12));
        entry.record_failure("color_analysis", Duration::from_millis(30), "Request timed out after 20000ms");

        assert_eq!(entry.errors, vec!["color_analysis: Request timed out after 20000ms"]);
        assert_eq!(entry.stage_timings["intent"].duration_ms, 12);
        assert!(entry.stage_timings["intent"].success);
        assert_eq!(entry.failed_stages(), vec!["color_analysis"]);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let mut entry = LogEntry::for_request(&ChatRequest::new("u1", "hello"));
        entry.intent = Some(Intent::GeneralChat);
        entry.record_failure("general_chat", Duration::from_millis(5), "boom");

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["intent"], "general_chat");
        assert_eq!(value["stageTimings"]["general_chat"]["durationMs"], 5);
        assert_eq!(value["stageTimings"]["general_chat"]["failureReason"], "boom");
        assert!(value.get("conversationId").is_none());
        assert!(value.get("createdAt").is_some());
    }
}
