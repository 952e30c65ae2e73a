use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use config_rs::DeploymentMode;
use serde_json::{json, Value};
use telemetrist::{LogEntry, TelemetristError, TelemetrySink};
use tower::ServiceExt;

use super::pipeline_tests::MockGenerator;
use crate::pipeline::StylistPipeline;
use crate::server::{create_router, MAX_PAYLOAD_SIZE};
use crate::stages::{StageSettings, Stages};
use crate::wardrobe::MockWardrobeSource;

struct NullSink;

#[async_trait]
impl TelemetrySink for NullSink {
    async fn log_chat_request(&self, _entry: LogEntry) -> Result<(), TelemetristError> {
        Ok(())
    }
}

/// Router whose model always classifies as general chat and replies "Hello!".
fn general_chat_router(expected_calls: usize) -> Router {
    let mut generator = MockGenerator::new();
    generator
        .expect_invoke()
        .times(expected_calls)
        .returning(|prompt, _| {
            if prompt.contains("Classify the user's latest message") {
                Ok(r#"{"intent": "general_chat"}"#.to_string())
            } else {
                Ok("Hello!".to_string())
            }
        });

    let mut wardrobe = MockWardrobeSource::new();
    wardrobe.expect_fetch_wardrobe_and_profile().never();

    let pipeline = StylistPipeline::new(
        Stages::new(Arc::new(generator), StageSettings::default()),
        Arc::new(wardrobe),
        Arc::new(NullSink),
        DeploymentMode::Production,
    );
    create_router(pipeline)
}

fn post_chat(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_chat_returns_reply() {
    let app = general_chat_router(2);
    let request = post_chat(json!({"userId": "u2", "message": "hi"}).to_string());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body, json!({"intent": "general_chat", "message": "Hello!"}));
}

#[tokio::test]
async fn test_missing_user_id_is_bad_request() {
    let app = general_chat_router(0);
    let response = app
        .oneshot(post_chat(json!({"message": "hi"}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "ValidationError");
    assert!(body["message"].as_str().unwrap().contains("userId"));
}

#[tokio::test]
async fn test_blank_message_is_bad_request() {
    let app = general_chat_router(0);
    let response = app
        .oneshot(post_chat(json!({"userId": "u1", "message": "  "}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "ValidationError");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = general_chat_router(0);
    let response = app.oneshot(post_chat("{\"userId\": ")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "ValidationError");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = general_chat_router(0);
    let message = "a".repeat(MAX_PAYLOAD_SIZE + 1);
    let response = app
        .oneshot(post_chat(json!({"userId": "u1", "message": message}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_health_and_banner() {
    let app = general_chat_router(0);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["healthy"], true);
    assert_eq!(health["service_name"], "stylist-service");
    assert_eq!(health["status"], "SERVING");

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let banner = json_body(response).await;
    assert_eq!(banner["endpoints"][1], "POST /chat");
}
