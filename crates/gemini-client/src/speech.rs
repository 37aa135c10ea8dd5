//! Text-to-speech over `generateContent` with an audio response modality.

use serde_json::json;
use speech_player::{GenerationFailure, SpeechSynthesizer};

use crate::client::{ApiError, GeminiClient, GenerateContentResponse};
use crate::config::GeminiConfig;

const READ_ALOUD_PREFIX: &str = "Lue tämä teksti suomeksi: ";

pub struct GeminiSpeech {
    client: GeminiClient,
    model: String,
    voice: String,
}

impl GeminiSpeech {
    pub fn new(cfg: &GeminiConfig) -> Self {
        Self {
            client: GeminiClient::new(cfg),
            model: cfg.speech_model.clone(),
            voice: cfg.voice.clone(),
        }
    }
}

impl SpeechSynthesizer for GeminiSpeech {
    fn synthesize(&self, text: &str) -> Result<String, GenerationFailure> {
        let body = speech_request(text, &self.voice);
        let resp = self
            .client
            .generate_content(&self.model, &body)
            .map_err(|e| match e {
                ApiError::Status { status, message } => GenerationFailure::Api { status, message },
                ApiError::Transport(msg) => GenerationFailure::Transport(msg),
                ApiError::Body(msg) => GenerationFailure::InvalidResponse(msg),
            })?;
        extract_audio(&resp)
    }
}

pub(crate) fn speech_request(text: &str, voice: &str) -> serde_json::Value {
    json!({
        "contents": [{ "parts": [{ "text": format!("{READ_ALOUD_PREFIX}{text}") }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice }
                }
            }
        }
    })
}

/// Base64 audio from the first response part.
pub(crate) fn extract_audio(resp: &GenerateContentResponse) -> Result<String, GenerationFailure> {
    let part = resp.first_part();
    if let Some(inline) = part.and_then(|p| p.inline_data.as_ref()) {
        if !inline.data.is_empty() {
            tracing::debug!(
                mime = inline.mime_type.as_deref().unwrap_or("-"),
                encoded_len = inline.data.len(),
                "speech audio received"
            );
            return Ok(inline.data.clone());
        }
    }
    let text = part.and_then(|p| p.text.clone());
    if let Some(text) = text.as_deref() {
        tracing::warn!(text, "speech model returned text instead of audio");
    }
    if let Some(reason) = resp
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        tracing::warn!(reason, "speech request blocked");
    }
    Err(GenerationFailure::NoAudio { text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::parse_response;

    #[test]
    fn request_wraps_text_and_selects_voice() {
        let body = speech_request("Hyvää huomenta.", "Kore");
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "Lue tämä teksti suomeksi: Hyvää huomenta."
        );
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
    }

    #[test]
    fn inline_audio_is_returned_verbatim() {
        let resp = parse_response(
            r#"{"candidates":[{"content":{"parts":[
                {"inlineData":{"mimeType":"audio/L16;codec=pcm;rate=24000","data":"AAEC/w=="}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_audio(&resp).unwrap(), "AAEC/w==");
    }

    #[test]
    fn text_reply_is_no_audio() {
        let resp = parse_response(
            r#"{"candidates":[{"content":{"parts":[{"text":"En voi lukea tätä."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            extract_audio(&resp),
            Err(GenerationFailure::NoAudio {
                text: Some("En voi lukea tätä.".into())
            })
        );
    }

    #[test]
    fn empty_response_is_no_audio() {
        let resp = parse_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(
            extract_audio(&resp),
            Err(GenerationFailure::NoAudio { text: None })
        );
    }
}
