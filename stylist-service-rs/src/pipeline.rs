// stylist-service-rs/src/pipeline.rs
//
// Chat pipeline orchestration
//
// Flow for one request:
//   validate -> classify intent
//     general_chat: reply -> done
//     otherwise:    fetch wardrobe -> color | silhouette | body type (concurrent)
//                   -> compose reasoning -> final response -> safety filter -> done
//
// Every stage after validation settles into a value: failures are replaced by
// the stage's fallback and noted in the request's LogEntry. The run, and the
// hand-off of its entry to the telemetry sink, happen on a detached task so
// the entry is dispatched even if the caller stops waiting.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use config_rs::DeploymentMode;
use error_handling::{with_fallback, Classify, ErrorKind, FallbackResult, TimedFallback};
use safety_filter::filter_with_report;
use shared_types::{
    BodyTypeResult, ChatRequest, ChatResponse, ColorResult, DebugPayload, FinalResponse, Intent,
    IntentClassification, ReasoningSummary, SilhouetteResult, ValidationError, WardrobeContext,
};
use telemetrist::{LogEntry, TelemetrySink};
use thiserror::Error;
use tokio::task::JoinError;

use crate::prompts;
use crate::stages::{names, StageError, Stages};
use crate::wardrobe::{WardrobeError, WardrobeSource};

/// Reply used when the general chat stage fails.
pub const GENERAL_CHAT_FALLBACK: &str =
    "Hi! I'm your personal stylist. Ask me what to wear and I'll put together outfits from your wardrobe.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    IntentClassified(Intent),
    GeneralChatDone,
    WardrobeFetched,
    AnalysisFannedOut,
    ReasoningComposed,
    FinalGenerated,
    SafetyFiltered,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Start => write!(f, "start"),
            PipelineState::IntentClassified(intent) => write!(f, "intent_classified({})", intent),
            PipelineState::GeneralChatDone => write!(f, "general_chat_done"),
            PipelineState::WardrobeFetched => write!(f, "wardrobe_fetched"),
            PipelineState::AnalysisFannedOut => write!(f, "analysis_fanned_out"),
            PipelineState::ReasoningComposed => write!(f, "reasoning_composed"),
            PipelineState::FinalGenerated => write!(f, "final_generated"),
            PipelineState::SafetyFiltered => write!(f, "safety_filtered"),
            PipelineState::Done => write!(f, "done"),
        }
    }
}

/// Why a single stage fell back.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Model(#[from] StageError),

    #[error(transparent)]
    Wardrobe(#[from] WardrobeError),

    #[error("stage task aborted: {0}")]
    Aborted(String),
}

impl Classify for StageFailure {
    fn kind(&self) -> ErrorKind {
        match self {
            StageFailure::Model(err) => err.kind(),
            StageFailure::Wardrobe(err) => err.kind(),
            StageFailure::Aborted(_) => ErrorKind::Unhandled,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Classify for PipelineError {
    fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Internal(_) => ErrorKind::Unhandled,
        }
    }
}

type Settled<T> = TimedFallback<T, StageFailure>;

/// Record a settled stage in the log entry.
fn record<T>(entry: &mut LogEntry, stage: &str, settled: &Settled<T>) {
    match settled.result.error() {
        None => entry.record_success(stage, settled.elapsed),
        Some(err) => {
            if !err.kind().is_absorbed() {
                log::error!("[{}] {} failed unexpectedly: {}", entry.request_id, stage, err);
            }
            entry.record_failure(stage, settled.elapsed, err.to_string())
        }
    }
}

/// Fold a spawned stage's join result into a settled value. A panicked or
/// cancelled task falls back like any other failure.
fn settle_joined<T>(
    stage: &str,
    joined: Result<Settled<T>, JoinError>,
    fallback: fn() -> T,
    started: Instant,
) -> Settled<T> {
    match joined {
        Ok(settled) => settled,
        Err(join_err) => {
            log::debug!("{} task did not complete", stage);
            TimedFallback {
                result: FallbackResult::Fallback {
                    value: fallback(),
                    error: StageFailure::Aborted(join_err.to_string()),
                },
                elapsed: started.elapsed(),
            }
        }
    }
}

struct Analyses {
    color: ColorResult,
    silhouette: SilhouetteResult,
    body_type: BodyTypeResult,
}

/// Orchestrates one chat request end to end.
#[derive(Clone)]
pub struct StylistPipeline {
    stages: Stages,
    wardrobe: Arc<dyn WardrobeSource>,
    telemetry: Arc<dyn TelemetrySink>,
    deployment: DeploymentMode,
}

impl StylistPipeline {
    pub fn new(
        stages: Stages,
        wardrobe: Arc<dyn WardrobeSource>,
        telemetry: Arc<dyn TelemetrySink>,
        deployment: DeploymentMode,
    ) -> Self {
        Self {
            stages,
            wardrobe,
            telemetry,
            deployment,
        }
    }

    /// Validate and answer one chat request.
    ///
    /// Only validation failures and unexpected internal errors are returned
    /// as errors. A rejected request never produces a log entry.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, PipelineError> {
        request.validate()?;

        let entry = LogEntry::for_request(&request);
        let request_id = entry.request_id.clone();
        log::info!("[{}] Chat request from user {}", request_id, request.user_id);

        // Dropping this future (client disconnect) does not stop the
        // supervisor, so the entry still reaches the sink.
        let supervisor = tokio::spawn(self.clone().supervise(request, entry));
        match supervisor.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                log::error!("[{}] supervisor task failed: {}", request_id, join_err);
                Err(PipelineError::Internal(join_err.to_string()))
            }
        }
    }

    /// Run the request on its own task and dispatch the entry whatever the
    /// outcome. A panicking run is reported from the entry as it was seeded.
    async fn supervise(
        self,
        request: ChatRequest,
        entry: LogEntry,
    ) -> Result<ChatResponse, PipelineError> {
        let request_id = entry.request_id.clone();
        let seed = entry.clone();

        let pipeline = self.clone();
        let run = tokio::spawn(async move {
            let mut entry = entry;
            let response = pipeline.run(&request, &mut entry).await;
            (response, entry)
        });

        match run.await {
            Ok((response, mut entry)) => {
                entry.final_response = Some(ChatResponse {
                    debug: None,
                    ..response.clone()
                });
                let failed = entry.failed_stages();
                if failed.is_empty() {
                    log::info!("[{}] Completed with intent {}", request_id, response.intent);
                } else {
                    log::info!(
                        "[{}] Completed with intent {}, fallbacks used for: {}",
                        request_id,
                        response.intent,
                        failed.join(", ")
                    );
                }
                self.dispatch(entry);
                Ok(response)
            }
            Err(join_err) => {
                let reason = format!("pipeline aborted: {}", join_err);
                log::error!("[{}] {}", request_id, reason);
                let mut entry = seed;
                entry.record_error(reason.clone());
                self.dispatch(entry);
                Err(PipelineError::Internal(reason))
            }
        }
    }

    fn dispatch(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.telemetry);
        tokio::spawn(async move {
            let request_id = entry.request_id.clone();
            if let Err(err) = sink.log_chat_request(entry).await {
                log::warn!("[{}] Failed to record chat log: {}", request_id, err);
            }
        });
    }

    fn advance(request_id: &str, state: &mut PipelineState, next: PipelineState) {
        log::debug!("[{}] {} -> {}", request_id, state, next);
        *state = next;
    }

    async fn run(&self, request: &ChatRequest, entry: &mut LogEntry) -> ChatResponse {
        let request_id = entry.request_id.clone();
        let mut state = PipelineState::Start;

        let classified = with_fallback(
            names::INTENT,
            async {
                self.stages
                    .classify_intent(&request.message, &request.history)
                    .await
                    .map_err(StageFailure::from)
            },
            IntentClassification::fallback,
        )
        .await;
        record(entry, names::INTENT, &classified);

        let raw_label = classified.result.value().intent.clone();
        let intent = match classified.result {
            FallbackResult::Primary(classification) => match classification.resolve() {
                Intent::Unknown => {
                    log::info!(
                        "[{}] Unrecognised intent '{}', routing to general chat",
                        request_id,
                        classification.intent
                    );
                    Intent::GeneralChat
                }
                intent => intent,
            },
            FallbackResult::Fallback { .. } => Intent::GeneralChat,
        };
        entry.intent = Some(intent);
        Self::advance(&request_id, &mut state, PipelineState::IntentClassified(intent));

        let mut debug = DebugPayload {
            request_id: request_id.clone(),
            intent_label: Some(raw_label),
            ..DebugPayload::default()
        };

        let mut response = if intent.requires_styling_flow() {
            self.styling_flow(request, intent, entry, &mut state, &mut debug)
                .await
        } else {
            let reply = self.general_chat(request, entry).await;
            Self::advance(&request_id, &mut state, PipelineState::GeneralChatDone);
            reply
        };

        Self::advance(&request_id, &mut state, PipelineState::Done);

        if !self.deployment.is_production() {
            debug.stage_timings = entry.stage_timings.clone();
            response.debug = Some(debug);
        }
        response
    }

    async fn general_chat(&self, request: &ChatRequest, entry: &mut LogEntry) -> ChatResponse {
        let settled = with_fallback(
            names::GENERAL_CHAT,
            async {
                self.stages
                    .general_chat(&request.message, &request.history)
                    .await
                    .map_err(StageFailure::from)
            },
            || GENERAL_CHAT_FALLBACK.to_string(),
        )
        .await;
        record(entry, names::GENERAL_CHAT, &settled);

        ChatResponse::general_chat(settled.result.into_value())
    }

    async fn styling_flow(
        &self,
        request: &ChatRequest,
        intent: Intent,
        entry: &mut LogEntry,
        state: &mut PipelineState,
        debug: &mut DebugPayload,
    ) -> ChatResponse {
        let request_id = entry.request_id.clone();

        let user_id = request.user_id.clone();
        let fetched = with_fallback(
            names::WARDROBE_FETCH,
            async {
                self.wardrobe
                    .fetch_wardrobe_and_profile(&request.user_id)
                    .await
                    .map_err(StageFailure::from)
            },
            move || WardrobeContext::empty(user_id),
        )
        .await;
        record(entry, names::WARDROBE_FETCH, &fetched);
        let wardrobe = fetched.result.into_value();
        debug.wardrobe_item_count = wardrobe.wardrobe_items.len();
        Self::advance(&request_id, state, PipelineState::WardrobeFetched);

        let analyses = self.fan_out(&request.message, &wardrobe, entry).await;
        Self::advance(&request_id, state, PipelineState::AnalysisFannedOut);

        let reasoning = with_fallback(
            names::REASONING,
            async {
                self.stages
                    .compose_reasoning(&analyses.color, &analyses.silhouette, &analyses.body_type)
                    .await
                    .map_err(StageFailure::from)
            },
            ReasoningSummary::fallback,
        )
        .await;
        record(entry, names::REASONING, &reasoning);
        let reasoning = reasoning.result.into_value();
        Self::advance(&request_id, state, PipelineState::ReasoningComposed);

        let generated = with_fallback(
            names::FINAL_RESPONSE,
            async {
                self.stages
                    .generate_final_response(&request.message, &wardrobe, &reasoning)
                    .await
                    .map_err(StageFailure::from)
            },
            FinalResponse::fallback,
        )
        .await;
        record(entry, names::FINAL_RESPONSE, &generated);
        let generated = generated.result.into_value();
        Self::advance(&request_id, state, PipelineState::FinalGenerated);

        let filter_started = Instant::now();
        let (outfits, report) =
            filter_with_report(generated.outfits.clone(), &wardrobe.wardrobe_items);
        entry.record_success(names::SAFETY_FILTER, filter_started.elapsed());
        Self::advance(&request_id, state, PipelineState::SafetyFiltered);

        debug.color = Some(analyses.color);
        debug.silhouette = Some(analyses.silhouette);
        debug.body_type = Some(analyses.body_type);
        debug.reasoning = Some(reasoning);
        debug.removed_items = report.removed_items;
        debug.dropped_outfits = report.dropped_outfits;
        debug.unfiltered_response = Some(generated.clone());

        ChatResponse::styled(
            intent,
            FinalResponse {
                outfits,
                ..generated
            },
        )
    }

    /// Run the three analyses as independent tasks. Each settles on its own;
    /// a failing task does not cancel its siblings.
    async fn fan_out(&self, message: &str, wardrobe: &WardrobeContext, entry: &mut LogEntry) -> Analyses {
        let context: Arc<str> = Arc::from(prompts::analysis_context(message, wardrobe));
        let started = Instant::now();

        let color_task = {
            let stages = self.stages.clone();
            let context = Arc::clone(&context);
            tokio::spawn(async move {
                with_fallback(
                    names::COLOR,
                    async move { stages.analyze_color(&context).await.map_err(StageFailure::from) },
                    ColorResult::fallback,
                )
                .await
            })
        };

        let silhouette_task = {
            let stages = self.stages.clone();
            let context = Arc::clone(&context);
            tokio::spawn(async move {
                with_fallback(
                    names::SILHOUETTE,
                    async move {
                        stages
                            .analyze_silhouette(&context)
                            .await
                            .map_err(StageFailure::from)
                    },
                    SilhouetteResult::fallback,
                )
                .await
            })
        };

        let body_type_task = {
            let stages = self.stages.clone();
            let context = Arc::clone(&context);
            tokio::spawn(async move {
                with_fallback(
                    names::BODY_TYPE,
                    async move {
                        stages
                            .analyze_body_type(&context)
                            .await
                            .map_err(StageFailure::from)
                    },
                    BodyTypeResult::fallback,
                )
                .await
            })
        };

        let (color, silhouette, body_type) = tokio::join!(color_task, silhouette_task, body_type_task);

        let color = settle_joined(names::COLOR, color, ColorResult::fallback, started);
        let silhouette = settle_joined(names::SILHOUETTE, silhouette, SilhouetteResult::fallback, started);
        let body_type = settle_joined(names::BODY_TYPE, body_type, BodyTypeResult::fallback, started);

        record(entry, names::COLOR, &color);
        record(entry, names::SILHOUETTE, &silhouette);
        record(entry, names::BODY_TYPE, &body_type);

        Analyses {
            color: color.result.into_value(),
            silhouette: silhouette.result.into_value(),
            body_type: body_type.result.into_value(),
        }
    }
}
