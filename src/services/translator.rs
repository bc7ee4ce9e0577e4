//! Translation service - builds prompts and shapes model output
//!
//! Every public operation issues exactly one completion call. The translation
//! model handles translate/refine, the lighter detection model handles detect.

use crate::config::CompletionConfig;
use crate::services::completion::{ChatMessage, CompletionClient, CompletionRequest};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Only this many characters of input are sent for language detection
const DETECT_INPUT_CHARS: usize = 1000;

/// Upper bound on the length of a returned language code
const DETECT_CODE_CHARS: usize = 5;

const TRANSLATOR_PERSONA: &str = "You are a professional UI+content translator. Preserve meaning and tone. \
     Keep brand names, URLs, numbers, emojis, and code unchanged. \
     For UI text keep natural capitalization. Output ONLY the translation(s).";

/// Translation service backed by a chat-completion client
pub struct TranslatorService {
    config: CompletionConfig,
    client: Arc<dyn CompletionClient>,
}

/// Outcome of decoding a batch translation reply.
///
/// Both variants hold exactly one entry per input item, in input order.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedTranslations {
    /// The reply parsed as a JSON array
    Strict(Vec<String>),
    /// The reply was split into lines and paired with the inputs by position
    Heuristic(Vec<String>),
}

impl DecodedTranslations {
    pub fn into_inner(self) -> Vec<String> {
        match self {
            DecodedTranslations::Strict(v) | DecodedTranslations::Heuristic(v) => v,
        }
    }
}

impl TranslatorService {
    /// Create a new translator service around a long-lived client
    pub fn new(config: &CompletionConfig, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            config: config.clone(),
            client,
        }
    }

    /// Translate a batch of strings, one output per input
    pub async fn translate_batch(&self, items: &[String], target: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Translate the following JSON array of strings to {}.\n\
             Return ONLY a JSON array with same length and order.\n{}",
            target,
            serde_json::to_string(items)?
        );

        let request = CompletionRequest {
            model: self.config.translate_model.clone(),
            messages: vec![
                ChatMessage::system(TRANSLATOR_PERSONA),
                ChatMessage::user(prompt),
            ],
            temperature: self.config.translate_temperature,
        };

        debug!("Translating {} item(s) to {}", items.len(), target);

        let raw = self.client.complete(request).await?;

        match decode_translations(&raw, items) {
            DecodedTranslations::Strict(out) => Ok(out),
            DecodedTranslations::Heuristic(out) => {
                warn!(
                    "Model reply for {} item(s) was not a JSON array, fell back to line pairing",
                    items.len()
                );
                Ok(out)
            }
        }
    }

    /// Translate a single text through the batch path
    pub async fn translate_text(&self, text: &str, target: &str) -> Result<String> {
        let out = self.translate_batch(&[text.to_string()], target).await?;
        Ok(out.into_iter().next().unwrap_or_else(|| text.to_string()))
    }

    /// Detect the ISO 639-1 code of a text
    pub async fn detect_language(&self, text: &str) -> Result<String> {
        let prompt = format!(
            "Detect the ISO 639-1 language code (2 letters) of the following text. \
             Return ONLY the code.\n\n{}",
            truncate_str(text, DETECT_INPUT_CHARS)
        );

        let request = CompletionRequest {
            model: self.config.detect_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.config.detect_temperature,
        };

        let raw = self.client.complete(request).await?;
        let code = raw.trim().to_lowercase();
        Ok(truncate_str(&code, DETECT_CODE_CHARS).to_string())
    }

    /// Ask the model to improve an existing translation
    pub async fn refine(&self, source: &str, current: &str, target: &str) -> Result<String> {
        let prompt = format!(
            "Improve the translation to {}. Keep meaning and style.\n\
             SOURCE:\n{}\n\nCURRENT:\n{}\n\nRETURN ONLY THE IMPROVED TRANSLATION.",
            target, source, current
        );

        let request = CompletionRequest {
            model: self.config.translate_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.config.translate_temperature,
        };

        let raw = self.client.complete(request).await?;
        Ok(raw.trim().to_string())
    }

    /// Send a free-form prompt to the translation model
    pub async fn complete_prompt(&self, prompt: &str, temperature: Option<f32>) -> Result<String> {
        let request = CompletionRequest {
            model: self.config.translate_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: temperature.unwrap_or(self.config.translate_temperature),
        };

        let raw = self.client.complete(request).await?;
        Ok(raw.trim().to_string())
    }
}

/// Decode a batch reply: strict JSON first, then line pairing.
///
/// Missing or empty outputs fall back to the original item and surplus
/// outputs are dropped, so the result always matches `items` in length.
/// Numbers and booleans in a JSON reply are kept as text; `null` and nested
/// values count as missing.
pub fn decode_translations(raw: &str, items: &[String]) -> DecodedTranslations {
    match serde_json::from_str::<Vec<Value>>(raw.trim()) {
        Ok(parsed) => {
            let outputs = parsed.into_iter().map(json_to_text).collect();
            DecodedTranslations::Strict(pair_with_items(outputs, items))
        }
        Err(_) => {
            let lines = raw
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            DecodedTranslations::Heuristic(pair_with_items(lines, items))
        }
    }
}

fn json_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn pair_with_items(outputs: Vec<String>, items: &[String]) -> Vec<String> {
    let mut outputs = outputs.into_iter();
    items
        .iter()
        .map(|item| match outputs.next() {
            Some(out) if !out.is_empty() => out,
            _ => item.clone(),
        })
        .collect()
}

/// Truncate a string to at most n characters (UTF-8 safe)
fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
