// stylist-service-rs/src/wardrobe.rs
//
// Client for the wardrobe/profile service.
//
// Configuration (.env file):
// - WARDROBE_SERVICE_ADDR: Base URL of the wardrobe service (default: http://localhost:8090)
// - WARDROBE_TIMEOUT_MS: Request timeout in ms (default: 5000)

use std::time::Duration;

use async_trait::async_trait;
use error_handling::{Classify, ErrorKind};
use shared_types::WardrobeContext;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardrobeError {
    #[error("Wardrobe service request failed: {0}")]
    Request(String),

    #[error("Wardrobe service returned status {0}")]
    Status(u16),

    #[error("Unexpected wardrobe payload: {0}")]
    Shape(String),

    #[error("Wardrobe client configuration error: {0}")]
    Configuration(String),
}

impl Classify for WardrobeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::UpstreamDependency
    }
}

/// Source of a user's wardrobe snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WardrobeSource: Send + Sync {
    async fn fetch_wardrobe_and_profile(&self, user_id: &str) -> Result<WardrobeContext, WardrobeError>;
}

#[derive(Debug, Clone)]
pub struct WardrobeClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl WardrobeClientConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: config_rs::get_client_address("WARDROBE", 8090, None),
            timeout_ms: config_rs::env_or("WARDROBE_TIMEOUT_MS", 5_000),
        }
    }
}

/// Fetches `GET {base}/users/{userId}/wardrobe`.
pub struct HttpWardrobeClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWardrobeClient {
    pub fn new(config: WardrobeClientConfig) -> Result<Self, WardrobeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| WardrobeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn wardrobe_url(&self, user_id: &str) -> Result<reqwest::Url, WardrobeError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| WardrobeError::Configuration(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| WardrobeError::Configuration("Base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["users", user_id, "wardrobe"]);
        Ok(url)
    }
}

#[async_trait]
impl WardrobeSource for HttpWardrobeClient {
    async fn fetch_wardrobe_and_profile(&self, user_id: &str) -> Result<WardrobeContext, WardrobeError> {
        let url = self.wardrobe_url(user_id)?;
        log::debug!("Fetching wardrobe from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WardrobeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WardrobeError::Status(status.as_u16()));
        }

        let mut context: WardrobeContext = response
            .json()
            .await
            .map_err(|e| WardrobeError::Shape(e.to_string()))?;

        if context.user_id != user_id {
            log::warn!(
                "Wardrobe service answered for user '{}' when '{}' was requested",
                context.user_id,
                user_id
            );
            context.user_id = user_id.to_string();
        }

        Ok(context)
    }
}
