//! Generative captions and note polishing via the Gemini `generateContent` API.
//!
//! Both helpers always return usable text: when no key is configured or the
//! request fails they fall back to a fixed caption, or to the note unchanged.

use serde_json::{json, Value};
use thiserror::Error;

use crate::config::AssistConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const CAPTION_DISABLED: &str = "A beautiful moment shared together (AI Disabled)";
pub const CAPTION_EMPTY: &str = "A beautiful moment shared together.";
pub const CAPTION_FAILED: &str = "Sharing life's best moments with you.";

#[derive(Error, Debug)]
pub enum AssistError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini API error: {0}")]
    Api(String),
    #[error("Failed to parse response JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct GeminiAssist {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiAssist {
    pub fn new(config: &AssistConfig) -> Self {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        if api_key.is_none() {
            log::warn!("Gemini API key missing, AI features are disabled");
        }
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: config.model.clone(),
            api_key,
        }
    }

    /// Point at a different API root, e.g. a proxy
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// A short romantic caption for a memory about `topic`
    pub async fn suggest_caption(&self, topic: &str, mood: &str) -> String {
        let Some(api_key) = &self.api_key else {
            return CAPTION_DISABLED.to_string();
        };
        let prompt = format!(
            "Suggest a short, cute, and romantic caption (max 15 words) for a couple's memory about \"{}\". The mood is {}. Make it feel warm and sincere.",
            topic, mood
        );
        match self.generate(api_key, &prompt, 60, 0.8).await {
            Ok(Some(text)) => text,
            Ok(None) => CAPTION_EMPTY.to_string(),
            Err(e) => {
                log::error!("Gemini failed: {}", e);
                CAPTION_FAILED.to_string()
            }
        }
    }

    /// A more poetic rewrite of `note`, or `note` itself when that is not possible
    pub async fn polish_note(&self, note: &str) -> String {
        let Some(api_key) = &self.api_key else {
            return note.to_string();
        };
        let prompt = format!(
            "Rewrite this short romantic note to be more poetic but keep it under 30 words: \"{}\". Maintain the original sentiment.",
            note
        );
        match self.generate(api_key, &prompt, 100, 0.7).await {
            Ok(Some(text)) => text,
            Ok(None) => note.to_string(),
            Err(e) => {
                log::error!("Gemini failed: {}", e);
                note.to_string()
            }
        }
    }

    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<Option<String>, AssistError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.model,
            urlencoding::encode(api_key)
        );
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": max_output_tokens,
                "temperature": temperature,
            }
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
            return Err(AssistError::Api(message));
        }
        extract_text(&body)
    }
}

/// Concatenated, trimmed text of the first candidate; `None` when it is empty
fn extract_text(body: &str) -> Result<Option<String>, AssistError> {
    let v: Value = serde_json::from_str(body)?;
    if let Some(error) = v.get("error") {
        let message = error["message"].as_str().unwrap_or("Unknown error");
        return Err(AssistError::Api(message.to_string()));
    }

    let text: String = v["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
