// stylist-service-rs/src/stages.rs
//
// One function per model-backed pipeline stage. Each builds its prompt, calls
// the generator with the stage's profile and normalizes the reply. Transport
// errors and undecodable output are both returned to the caller, which
// substitutes the stage's fallback value.

use std::sync::Arc;

use error_handling::{Classify, ErrorKind};
use llm_client::{
    extract_text, try_extract_structured, DecodeError, InvokeOptions, LlmError, TextGenerator,
};
use serde::de::DeserializeOwned;
use shared_types::{
    BodyTypeResult, ColorResult, FinalResponse, HistoryMessage, IntentClassification,
    ReasoningSummary, SilhouetteResult, WardrobeContext,
};
use thiserror::Error;

use crate::prompts;

/// Stage names used for timings, error notes and log lines.
pub mod names {
    pub const INTENT: &str = "intent_classification";
    pub const GENERAL_CHAT: &str = "general_chat";
    pub const WARDROBE_FETCH: &str = "wardrobe_fetch";
    pub const COLOR: &str = "color_analysis";
    pub const SILHOUETTE: &str = "silhouette_analysis";
    pub const BODY_TYPE: &str = "body_type_analysis";
    pub const REASONING: &str = "reasoning_composition";
    pub const FINAL_RESPONSE: &str = "final_response";
    pub const SAFETY_FILTER: &str = "safety_filter";
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Transport(#[from] LlmError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Classify for StageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StageError::Transport(err) => err.kind(),
            StageError::Decode(err) => err.kind(),
        }
    }
}

fn decode<T: DeserializeOwned>(stage: &str, raw: &str) -> Result<T, StageError> {
    try_extract_structured(raw).map_err(|err| {
        log::warn!("{}: {}", stage, err);
        StageError::from(err)
    })
}

/// Temperature, timeout and retry budget for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageProfile {
    pub temperature: f32,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub max_output_tokens: u32,
}

impl StageProfile {
    const fn new(temperature: f32, timeout_ms: u64, max_retries: u32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            timeout_ms,
            max_retries,
            max_output_tokens,
        }
    }

    /// Override fields from `STYLIST_<STAGE>_{TIMEOUT_MS,MAX_RETRIES,TEMPERATURE}`.
    fn from_env(stage: &str, defaults: Self) -> Self {
        let key = |suffix: &str| format!("STYLIST_{}_{}", stage, suffix);
        Self {
            temperature: config_rs::env_or(&key("TEMPERATURE"), defaults.temperature),
            timeout_ms: config_rs::env_or(&key("TIMEOUT_MS"), defaults.timeout_ms),
            max_retries: config_rs::env_or(&key("MAX_RETRIES"), defaults.max_retries),
            max_output_tokens: config_rs::env_or(&key("MAX_OUTPUT_TOKENS"), defaults.max_output_tokens),
        }
    }

    pub fn invoke_options(&self, model: Option<&str>) -> InvokeOptions {
        InvokeOptions {
            model: model.map(str::to_string),
            timeout_ms: self.timeout_ms,
            temperature: self.temperature,
            max_retries: self.max_retries,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    /// Model override for every stage; `None` uses the client's default
    pub model: Option<String>,
    pub intent: StageProfile,
    pub general_chat: StageProfile,
    pub analysis: StageProfile,
    pub reasoning: StageProfile,
    pub final_response: StageProfile,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            model: None,
            intent: StageProfile::new(0.1, 10_000, 1, 256),
            general_chat: StageProfile::new(0.7, 20_000, 2, 1024),
            analysis: StageProfile::new(0.4, 20_000, 2, 1024),
            reasoning: StageProfile::new(0.4, 20_000, 2, 1024),
            final_response: StageProfile::new(0.7, 30_000, 2, 2048),
        }
    }
}

impl StageSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: config_rs::env_opt("STYLIST_MODEL"),
            intent: StageProfile::from_env("INTENT", defaults.intent),
            general_chat: StageProfile::from_env("GENERAL_CHAT", defaults.general_chat),
            analysis: StageProfile::from_env("ANALYSIS", defaults.analysis),
            reasoning: StageProfile::from_env("REASONING", defaults.reasoning),
            final_response: StageProfile::from_env("FINAL", defaults.final_response),
        }
    }
}

/// The model-backed stages, sharing one generator.
#[derive(Clone)]
pub struct Stages {
    generator: Arc<dyn TextGenerator>,
    settings: StageSettings,
}

impl Stages {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: StageSettings) -> Self {
        Self { generator, settings }
    }

    async fn call(&self, stage: &str, prompt: String, profile: &StageProfile) -> Result<String, LlmError> {
        log::debug!("{}: invoking model (timeout {}ms)", stage, profile.timeout_ms);
        let options = profile.invoke_options(self.settings.model.as_deref());
        self.generator.invoke(&prompt, &options).await
    }

    pub async fn classify_intent(
        &self,
        message: &str,
        history: &[HistoryMessage],
    ) -> Result<IntentClassification, StageError> {
        let raw = self
            .call(names::INTENT, prompts::intent_prompt(message, history), &self.settings.intent)
            .await?;
        decode(names::INTENT, &raw)
    }

    pub async fn general_chat(
        &self,
        message: &str,
        history: &[HistoryMessage],
    ) -> Result<String, StageError> {
        let raw = self
            .call(
                names::GENERAL_CHAT,
                prompts::general_chat_prompt(message, history),
                &self.settings.general_chat,
            )
            .await?;
        let reply = extract_text(&raw);
        if reply.is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(reply)
    }

    pub async fn analyze_color(&self, context: &str) -> Result<ColorResult, StageError> {
        let raw = self
            .call(names::COLOR, prompts::color_prompt(context), &self.settings.analysis)
            .await?;
        decode(names::COLOR, &raw)
    }

    pub async fn analyze_silhouette(&self, context: &str) -> Result<SilhouetteResult, StageError> {
        let raw = self
            .call(names::SILHOUETTE, prompts::silhouette_prompt(context), &self.settings.analysis)
            .await?;
        decode(names::SILHOUETTE, &raw)
    }

    pub async fn analyze_body_type(&self, context: &str) -> Result<BodyTypeResult, StageError> {
        let raw = self
            .call(names::BODY_TYPE, prompts::body_type_prompt(context), &self.settings.analysis)
            .await?;
        decode(names::BODY_TYPE, &raw)
    }

    pub async fn compose_reasoning(
        &self,
        color: &ColorResult,
        silhouette: &SilhouetteResult,
        body_type: &BodyTypeResult,
    ) -> Result<ReasoningSummary, StageError> {
        let raw = self
            .call(
                names::REASONING,
                prompts::reasoning_prompt(color, silhouette, body_type),
                &self.settings.reasoning,
            )
            .await?;
        decode(names::REASONING, &raw)
    }

    pub async fn generate_final_response(
        &self,
        message: &str,
        wardrobe: &WardrobeContext,
        reasoning: &ReasoningSummary,
    ) -> Result<FinalResponse, StageError> {
        let raw = self
            .call(
                names::FINAL_RESPONSE,
                prompts::final_response_prompt(message, wardrobe, reasoning),
                &self.settings.final_response,
            )
            .await?;
        decode(names::FINAL_RESPONSE, &raw)
    }
}
