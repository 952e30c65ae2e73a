//! Model-produced payloads for each styling stage, with their fixed
//! fallback values.

use serde::{Deserialize, Serialize};

use crate::chat::Intent;

/// Output of the intent classification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl IntentClassification {
    /// The stage's own declared fallback. The orchestrator never routes on
    /// it directly: an `unknown` intent is forced into `general_chat`.
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Unknown.as_str().to_string(),
            confidence: None,
        }
    }

    pub fn resolve(&self) -> Intent {
        Intent::from_label(&self.intent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorResult {
    pub color_direction: String,
    #[serde(default)]
    pub combos: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

impl ColorResult {
    pub fn fallback() -> Self {
        Self {
            color_direction: "neutral-based outfits".to_string(),
            combos: vec!["black + white".to_string(), "navy + beige".to_string()],
            reason: "Neutral palettes are versatile and work with most wardrobes.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilhouetteResult {
    pub silhouette_verdict: String,
    #[serde(default)]
    pub structures: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl SilhouetteResult {
    pub fn fallback() -> Self {
        Self {
            silhouette_verdict: "balanced proportions".to_string(),
            structures: vec![
                "fitted top + relaxed bottom".to_string(),
                "relaxed top + fitted bottom".to_string(),
            ],
            notes: "Balance volume between top and bottom.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyTypeResult {
    pub body_type: String,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub application: String,
}

impl BodyTypeResult {
    pub fn fallback() -> Self {
        Self {
            body_type: "balanced".to_string(),
            rules: vec![
                "Choose well-fitted pieces".to_string(),
                "Define the waist".to_string(),
            ],
            application: "Focus on fit and proportion.".to_string(),
        }
    }
}

/// Synthesis of the three analyses into one actionable direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningSummary {
    pub summary: String,
    pub core_outfit_direction: String,
    pub key_color_approach: String,
    #[serde(default)]
    pub key_silhouette_rules: Vec<String>,
    #[serde(default)]
    pub key_body_type_adaptations: Vec<String>,
}

impl ReasoningSummary {
    /// Fixed fallback, derived from the fallback analyses.
    pub fn fallback() -> Self {
        let color = ColorResult::fallback();
        let silhouette = SilhouetteResult::fallback();
        let body_type = BodyTypeResult::fallback();
        Self {
            summary: "Combined styling analysis".to_string(),
            core_outfit_direction: format!(
                "{} with {}",
                color.color_direction, silhouette.silhouette_verdict
            ),
            key_color_approach: color.combos.join(", "),
            key_silhouette_rules: silhouette.structures,
            key_body_type_adaptations: body_type.rules,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outfit {
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub why_it_works: String,
}

/// The reply shown to the user on the styling path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResponse {
    pub message: String,
    #[serde(default)]
    pub outfits: Vec<Outfit>,
    #[serde(default)]
    pub extra_tips: Vec<String>,
}

impl FinalResponse {
    pub fn fallback() -> Self {
        Self {
            message: "I couldn't put together a full styling answer right now. \
                      Start from your most versatile neutral pieces and build around one statement item."
                .to_string(),
            outfits: Vec::new(),
            extra_tips: vec!["Well-fitted basics are the easiest pieces to combine.".to_string()],
        }
    }
}
