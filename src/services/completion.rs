//! Chat-completion client - the single outbound dependency
//!
//! Speaks the OpenAI-compatible `/chat/completions` contract. The trait is the
//! seam the gateway depends on, so handlers never see `reqwest` directly.

use crate::config::CompletionConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A role-tagged chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One chat-completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Anything that can turn a chat request into a single free-text completion
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// Client for OpenAI and API-compatible providers
pub struct OpenAiClient {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        if self.api_key.is_empty() {
            anyhow::bail!("No API key configured for the completion service");
        }

        let url = format!("{}/chat/completions", self.api_url);

        debug!("Requesting completion from {} ({})", request.model, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion request failed: {} - {}", status, body);
        }

        let result: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        extract_content(result)
    }
}

fn extract_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .context("Completion response contained no choices")?
        .message
        .content
        .context("Completion response contained no message content")
}
