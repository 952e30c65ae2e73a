// stylist-service-rs/src/main.rs
// Main Entry Point for stylist-service-rs
// HTTP entry point (port 8080) for the wardrobe stylist chat pipeline

use std::sync::Arc;

use config_rs::DeploymentMode;
use llm_client::{LlmClient, LlmConfig};
use once_cell::sync::Lazy;
use stylist_service::server::START_TIME;
use stylist_service::{
    create_router, HttpWardrobeClient, StageSettings, Stages, StylistPipeline, WardrobeClientConfig,
};
use telemetrist::{Telemetrist, TelemetristConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config_rs::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Lazy::force(&START_TIME);

    let deployment = DeploymentMode::from_env();
    log::info!("Starting stylist service ({:?} mode)", deployment);

    let llm = LlmClient::new(LlmConfig::from_env())?;
    let stages = Stages::new(Arc::new(llm), StageSettings::from_env());

    let wardrobe_config = WardrobeClientConfig::from_env();
    log::info!("Wardrobe service at {}", wardrobe_config.base_url);
    let wardrobe = HttpWardrobeClient::new(wardrobe_config)?;

    let telemetry_config = TelemetristConfig::from_env();
    if !telemetry_config.enabled {
        log::warn!("Telemetry is disabled; chat logs will not be recorded");
    }
    let telemetrist = Telemetrist::new(telemetry_config)?;

    let pipeline = StylistPipeline::new(stages, Arc::new(wardrobe), Arc::new(telemetrist), deployment);
    let app = create_router(pipeline);

    let addr = config_rs::get_bind_address("STYLIST", 8080);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Stylist service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
