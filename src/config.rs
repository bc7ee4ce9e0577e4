//! Configuration management for the translation gateway

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Settings for the upstream chat-completion service
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Model used for translation and refinement
    #[serde(default = "default_translate_model")]
    pub translate_model: String,
    /// Lighter model used for language detection
    #[serde(default = "default_detect_model")]
    pub detect_model: String,
    #[serde(default = "default_translate_temperature")]
    pub translate_temperature: f32,
    #[serde(default)]
    pub detect_temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            translate_model: default_translate_model(),
            detect_model: default_detect_model(),
            translate_temperature: default_translate_temperature(),
            detect_temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_translate_model() -> String {
    "gpt-4o".to_string()
}

fn default_detect_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_translate_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from gateway.toml
    pub fn load() -> Result<Self> {
        Self::load_from("gateway.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;

            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?;

            config.expand_env_vars();
            return Ok(config);
        }

        // Fall back to environment variables only
        Self::from_env()
    }

    /// Load configuration entirely from environment variables
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("GATEWAY_PORT").or_else(|_| std::env::var("PORT")) {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid port: {}", raw))?,
            Err(_) => default_port(),
        };

        Ok(Config {
            server: ServerConfig {
                host: std::env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port,
            },
            completion: CompletionConfig {
                api_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| default_api_url()),
                api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
                translate_model: std::env::var("TRANSLATION_MODEL")
                    .unwrap_or_else(|_| default_translate_model()),
                detect_model: std::env::var("DETECTION_MODEL")
                    .unwrap_or_else(|_| default_detect_model()),
                translate_temperature: env_parse("TRANSLATION_TEMPERATURE")?
                    .unwrap_or_else(default_translate_temperature),
                detect_temperature: env_parse("DETECTION_TEMPERATURE")?.unwrap_or(0.0),
                timeout_secs: env_parse("COMPLETION_TIMEOUT_SECS")?
                    .unwrap_or_else(default_timeout_secs),
            },
        })
    }

    /// Expand ${VAR} patterns in string fields
    fn expand_env_vars(&mut self) {
        self.completion.api_key = expand_env(&self.completion.api_key);
        self.completion.api_url = expand_env(&self.completion.api_url);
    }
}

/// Read and parse an optional environment variable
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

/// Expand ${VAR} patterns in a string
///
/// Substituted values are not expanded again.
fn expand_env(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }

    result.push_str(rest);
    result
}
