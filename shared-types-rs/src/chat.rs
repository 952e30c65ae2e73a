//! Request/response envelope for the chat endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::styling::{
    BodyTypeResult, ColorResult, FinalResponse, Outfit, ReasoningSummary, SilhouetteResult,
};

/// Author of a prior conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// Routing label produced by intent classification.
///
/// Every label except `GeneralChat` takes the full styling flow. `Unknown`
/// is what an unrecognised model label resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    GeneralChat,
    OutfitGeneration,
    StyleAdvice,
    WardrobeReview,
    Unknown,
}

impl Intent {
    pub const LABELS: [Intent; 4] = [
        Intent::GeneralChat,
        Intent::OutfitGeneration,
        Intent::StyleAdvice,
        Intent::WardrobeReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::GeneralChat => "general_chat",
            Intent::OutfitGeneration => "outfit_generation",
            Intent::StyleAdvice => "style_advice",
            Intent::WardrobeReview => "wardrobe_review",
            Intent::Unknown => "unknown",
        }
    }

    /// Lenient label parsing: case, surrounding quotes, spaces and hyphens
    /// are normalised before matching.
    pub fn from_label(label: &str) -> Intent {
        let normalized = label
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .to_ascii_lowercase()
            .replace([' ', '-'], "_");
        Intent::LABELS
            .iter()
            .copied()
            .find(|intent| intent.as_str() == normalized)
            .unwrap_or(Intent::Unknown)
    }

    pub fn requires_styling_flow(&self) -> bool {
        !matches!(self, Intent::GeneralChat)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Intent::from_label(s))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field must not be empty: {0}")]
    EmptyField(&'static str),
}

/// Inbound chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryMessage>,
}

impl ChatRequest {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
            conversation_id: None,
            history: Vec::new(),
        }
    }

    /// `userId` and `message` must be non-empty after trimming.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("userId"));
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyField("message"));
        }
        Ok(())
    }
}

/// Duration and outcome of one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Raw intermediate results, only attached outside production.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugPayload {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_label: Option<String>,
    pub wardrobe_item_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silhouette: Option<SilhouetteResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_type: Option<BodyTypeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfiltered_response: Option<FinalResponse>,
    #[serde(default)]
    pub removed_items: Vec<String>,
    #[serde(default)]
    pub dropped_outfits: usize,
    #[serde(default)]
    pub stage_timings: std::collections::BTreeMap<String, StageTiming>,
}

/// Outbound chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub intent: Intent,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outfits: Option<Vec<Outfit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_tips: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugPayload>,
}

impl ChatResponse {
    pub fn general_chat(message: impl Into<String>) -> Self {
        Self {
            intent: Intent::GeneralChat,
            message: message.into(),
            outfits: None,
            extra_tips: None,
            debug: None,
        }
    }

    pub fn styled(intent: Intent, response: FinalResponse) -> Self {
        Self {
            intent,
            message: response.message,
            outfits: Some(response.outfits),
            extra_tips: Some(response.extra_tips),
            debug: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_from_label_is_lenient() {
        assert_eq!(Intent::from_label("general_chat"), Intent::GeneralChat);
        assert_eq!(Intent::from_label(" Outfit Generation "), Intent::OutfitGeneration);
        assert_eq!(Intent::from_label("\"style-advice\""), Intent::StyleAdvice);
        assert_eq!(Intent::from_label("weather_report"), Intent::Unknown);
        assert_eq!(Intent::from_label(""), Intent::Unknown);
    }

    #[test]
    fn test_only_general_chat_skips_styling_flow() {
        assert!(!Intent::GeneralChat.requires_styling_flow());
        assert!(Intent::OutfitGeneration.requires_styling_flow());
        assert!(Intent::WardrobeReview.requires_styling_flow());
    }

    #[test]
    fn test_chat_request_wire_format() {
        let request: ChatRequest = serde_json::from_value(json!({
            "userId": "u1",
            "message": "What should I wear?",
            "conversationId": "c-9",
            "history": [{"role": "assistant", "content": "Hello!"}]
        }))
        .unwrap();

        assert_eq!(request.user_id, "u1");
        assert_eq!(request.conversation_id.as_deref(), Some("c-9"));
        assert_eq!(request.history[0].role, Role::Assistant);
    }

    #[test]
    fn test_chat_request_validation() {
        assert!(ChatRequest::new("u1", "hi").validate().is_ok());
        assert_eq!(
            ChatRequest::new("   ", "hi").validate(),
            Err(ValidationError::EmptyField("userId"))
        );
        assert_eq!(
            ChatRequest::new("u1", "\n\t ").validate(),
            Err(ValidationError::EmptyField("message"))
        );
    }

    #[test]
    fn test_general_chat_response_omits_styling_fields() {
        let value = serde_json::to_value(ChatResponse::general_chat("Hey there!")).unwrap();
        assert_eq!(value, json!({"intent": "general_chat", "message": "Hey there!"}));
    }
}
