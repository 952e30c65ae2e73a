use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use error_handling::{Classify, ErrorKind};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use shared_types::{ChatRequest, ChatResponse, HistoryMessage, ValidationError};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::pipeline::{PipelineError, StylistPipeline};

pub const SERVICE_NAME: &str = "stylist-service";

/// Maximum request body size (1 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

// Track service start time for uptime reporting
pub static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Request body as received. Every field is optional so that a missing field
/// is reported as a validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub user_id: Option<String>,
    pub message: Option<String>,
    pub conversation_id: Option<String>,
    pub history: Option<Vec<HistoryMessage>>,
}

impl ChatRequestBody {
    pub fn into_request(self) -> Result<ChatRequest, ValidationError> {
        let user_id = self.user_id.ok_or(ValidationError::MissingField("userId"))?;
        let message = self.message.ok_or(ValidationError::MissingField("message"))?;
        Ok(ChatRequest {
            user_id,
            message,
            conversation_id: self.conversation_id,
            history: self.history.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn from_rejection(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(MAX_PAYLOAD_SIZE)
        } else {
            ApiError::Validation(format!("Malformed request body: {}", rejection.body_text()))
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::from_u16(self.kind().http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl Classify for ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) | ApiError::PayloadTooLarge(_) => ErrorKind::Validation,
            ApiError::Internal(_) => ErrorKind::Unhandled,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(err) => err.into(),
            PipelineError::Internal(message) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: self.kind().as_str().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub struct AppState {
    pub pipeline: StylistPipeline,
}

/// Create the Axum router with all routes and middleware
pub fn create_router(pipeline: StylistPipeline) -> Router {
    let state = Arc::new(AppState { pipeline });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /health",
            "POST /chat"
        ]
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        service_name: SERVICE_NAME.to_string(),
        uptime_seconds: START_TIME.elapsed().as_secs() as i64,
        status: "SERVING".to_string(),
    })
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = payload.map_err(ApiError::from_rejection)?;
    let request = body.into_request()?;
    let response = state.pipeline.handle(request).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_are_validation_errors() {
        let body = ChatRequestBody {
            message: Some("hi".into()),
            ..ChatRequestBody::default()
        };
        assert_eq!(
            body.into_request().unwrap_err(),
            ValidationError::MissingField("userId")
        );
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::PayloadTooLarge(1).status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::Validation("x".into()).kind().as_str(), "ValidationError");
    }
}
