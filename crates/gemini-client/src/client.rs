//! Blocking transport for `models/{model}:generateContent`.

use serde::Deserialize;
use thiserror::Error;

use crate::config::GeminiConfig;

/// Responses carry base64 audio, so the body limit is well above ureq's default.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;
const ERROR_SNIPPET_CHARS: usize = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request failed (transport): {0}")]
    Transport(String),
    #[error("request failed (status {status}): {message}")]
    Status { status: u16, message: String },
    #[error("response decode failed: {0}")]
    Body(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// First part of the first candidate, where both audio and JSON text land.
    pub fn first_part(&self) -> Option<&Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct GeminiClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(cfg.timeout)
            .build();
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// POST `body` to `models/{model}:generateContent`.
    pub fn generate_content(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> Result<GenerateContentResponse, ApiError> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        tracing::debug!(model, "generateContent request");
        let resp = self
            .agent
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .send_json(body)
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .into_body()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_string();

        if status >= 400 {
            let message = error_message(text.as_deref().unwrap_or_default());
            tracing::warn!(model, status, "generateContent failed");
            return Err(ApiError::Status { status, message });
        }
        let text = text.map_err(|e| ApiError::Body(e.to_string()))?;
        parse_response(&text)
    }
}

pub(crate) fn parse_response(text: &str) -> Result<GenerateContentResponse, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Body(e.to_string()))
}

/// Human-readable message from an error body: the API's own message when present, otherwise
/// a trimmed snippet.
fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    let snippet: String = trimmed.chars().take(ERROR_SNIPPET_CHARS).collect();
    let suffix = if trimmed.chars().count() > ERROR_SNIPPET_CHARS {
        "..."
    } else {
        ""
    };
    format!("{snippet}{suffix}")
}
