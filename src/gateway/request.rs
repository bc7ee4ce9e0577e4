//! Request/response shapes and validation into a typed operation

use super::error::GatewayError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Language used when a prompt names no target
pub const DEFAULT_TARGET: &str = "en";

/// Body of `POST /api/translate`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranslationRequest {
    pub mode: Option<String>,
    pub target: Option<String>,
    pub text: Option<String>,
    pub items: Option<Vec<String>>,
    pub source: Option<String>,
    pub current: Option<String>,
    pub prompt: Option<String>,
}

/// Body of the legacy `POST /api/complete`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PromptRequest {
    pub prompt: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TranslationResponse {
    Detected { lang: String },
    Single { translation: String },
    Batch { translations: Vec<String> },
}

/// A validated request, ready to dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Detect {
        text: String,
    },
    Refine {
        source: String,
        current: String,
        target: String,
    },
    TranslateBatch {
        items: Vec<String>,
        target: String,
    },
    TranslateText {
        text: String,
        target: String,
    },
}

impl TryFrom<TranslationRequest> for Operation {
    type Error = GatewayError;

    fn try_from(req: TranslationRequest) -> Result<Self, Self::Error> {
        let mode = present(req.mode);
        match mode.as_deref().unwrap_or("translate") {
            "detect" => {
                let text = present(req.text).ok_or_else(|| GatewayError::validation("Missing text"))?;
                Ok(Operation::Detect { text })
            }
            "refine" => match (present(req.source), present(req.current), present(req.target)) {
                (Some(source), Some(current), Some(target)) => Ok(Operation::Refine {
                    source,
                    current,
                    target,
                }),
                _ => Err(GatewayError::validation("Missing refine fields")),
            },
            "translate" => {
                let prompt = present(req.prompt);
                let target = resolve_target(req.target.as_deref(), prompt.as_deref())
                    .ok_or_else(|| GatewayError::validation("Missing target language"))?;

                if let Some(items) = req.items.filter(|items| !items.is_empty()) {
                    return Ok(Operation::TranslateBatch { items, target });
                }

                let text = present(req.text)
                    .or(prompt)
                    .ok_or_else(|| GatewayError::validation("Missing text/prompt"))?;
                Ok(Operation::TranslateText { text, target })
            }
            _ => Err(GatewayError::validation("Unsupported mode")),
        }
    }
}

/// Resolve the target language of a translate request.
///
/// Explicit `target` wins, then `to <word>` in the prompt, then
/// [`DEFAULT_TARGET`] when a prompt exists. Without either, nothing resolves.
/// "to" must start a word and may be followed by any run of whitespace
/// (spaces, tabs, newlines). Only the word right after it is taken, so
/// "to Brazilian Portuguese" yields "Brazilian".
pub fn resolve_target(target: Option<&str>, prompt: Option<&str>) -> Option<String> {
    if let Some(target) = target.filter(|t| !t.is_empty()) {
        return Some(target.to_string());
    }

    let prompt = prompt.filter(|p| !p.is_empty())?;
    let language = target_pattern()
        .captures(prompt)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_TARGET);
    Some(language.to_string())
}

fn target_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bto\s+(\w+)").expect("target pattern is valid"))
}

/// Empty strings count as absent
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
