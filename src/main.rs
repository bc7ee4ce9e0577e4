//! Translation Gateway
//!
//! A single HTTP endpoint that forwards text to a chat-completion model for:
//! - Translation (single text or arrays of UI strings)
//! - Language detection
//! - Translation refinement

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use translate_gateway::config::Config;
use translate_gateway::gateway::{self, GatewayState};
use translate_gateway::services::completion::OpenAiClient;
use translate_gateway::TranslatorService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let dotenv_loaded = std::path::Path::new(".env").exists();
    if dotenv_loaded {
        dotenvy::dotenv()?;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if dotenv_loaded {
        info!("Loaded environment variables from .env file");
    }

    info!("Translation gateway starting...");

    let config = Config::load()?;
    info!("Configuration loaded");
    info!("Completion URL: {}", config.completion.api_url);
    info!("Completion API key: {}", if config.completion.api_key.is_empty() { "EMPTY" } else { "SET" });
    info!("Translation model: {}", config.completion.translate_model);
    info!("Detection model: {}", config.completion.detect_model);

    if config.completion.api_key.is_empty() {
        warn!("No completion API key configured, every translation request will fail");
    }

    // One client for the lifetime of the process
    let client = Arc::new(OpenAiClient::new(&config.completion)?);
    let translator = TranslatorService::new(&config.completion, client);

    gateway::serve(&config, GatewayState { translator }).await?;

    info!("Translation gateway shutting down");

    Ok(())
}
