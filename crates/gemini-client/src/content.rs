//! Mock-test generation with a structured JSON response.

use serde_json::{Value, json};
use thiserror::Error;
use yki_types::{FullTest, TestLevel};

use crate::client::{ApiError, GeminiClient, GenerateContentResponse};
use crate::config::GeminiConfig;

const LISTENING_INTRO: &str = "Tehtävä 1. Kuuntele seuraava teksti ja vastaa kysymyksiin.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentGenerationFailure {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("model returned no content")]
    Empty,
    #[error("generated test is not valid JSON for the schema: {0}")]
    InvalidJson(String),
    #[error("generated test is incomplete: {0}")]
    Incomplete(String),
}

impl ContentGenerationFailure {
    /// Finnish notice shown when generation fails.
    pub fn user_notice(&self) -> &'static str {
        match self {
            ContentGenerationFailure::Api(ApiError::Status { status: 401 | 403, .. }) => {
                "API-avain puuttuu tai on virheellinen."
            }
            ContentGenerationFailure::Api(ApiError::Status { message, .. })
                if message.to_lowercase().contains("entity not found") =>
            {
                "API-avain puuttuu tai on virheellinen."
            }
            _ => "Virhe kokeen luomisessa.",
        }
    }
}

/// Source of generated mock tests.
pub trait ContentGenerator: Send + Sync {
    fn generate_test(&self, level: TestLevel) -> Result<FullTest, ContentGenerationFailure>;
}

pub struct GeminiContent {
    client: GeminiClient,
    model: String,
}

impl GeminiContent {
    pub fn new(cfg: &GeminiConfig) -> Self {
        Self {
            client: GeminiClient::new(cfg),
            model: cfg.content_model.clone(),
        }
    }
}

impl ContentGenerator for GeminiContent {
    fn generate_test(&self, level: TestLevel) -> Result<FullTest, ContentGenerationFailure> {
        tracing::info!(level = %level, model = %self.model, "generating mock test");
        let resp = self.client.generate_content(&self.model, &content_request(level))?;
        let test = parse_test(&resp, level)?;
        tracing::info!(
            reading = test.reading.len(),
            listening = test.listening.len(),
            writing = test.writing.len(),
            speaking = test.speaking.len(),
            "mock test generated"
        );
        Ok(test)
    }
}

pub fn prompt(level: TestLevel) -> String {
    let (min_words, max_words) = level.listening_words();
    let other = TestLevel::ALL
        .iter()
        .filter(|l| **l != level)
        .map(|l| {
            let (lo, hi) = l.listening_words();
            format!("{} ~{lo}-{hi} words", l.as_str())
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Generate a full, realistic Finnish YKI mock test for level: {name}.\n\
         \n\
         CRITICAL RULES for Listening Tasks:\n\
         - The 'audioPrompt' MUST be a clean script of ONLY the Finnish text to be read.\n\
         - DO NOT include stage directions like [nainen puhuu] or [tauko].\n\
         - It must start with an introduction: '{LISTENING_INTRO}'\n\
         - The main content must be a substantial passage (dialogue, news, or announcement).\n\
         - Length: {name} ~{min_words}-{max_words} words (for comparison: {other}).\n\
         \n\
         CRITICAL RULES for Other Tasks:\n\
         - 2 Reading tasks: Title, text (~150-300 words), and 3 multiple choice questions.\n\
         - 2 Writing tasks: A clear prompt and a high-quality model answer.\n\
         - 2 Speaking tasks: A scenario for the user.\n\
         \n\
         Ensure all Finnish language is at the {name} level ({cefr}).",
        name = level.as_str(),
        cefr = level.cefr_range(),
    )
}

fn question_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "id": { "type": "STRING" },
            "text": { "type": "STRING" },
            "options": { "type": "ARRAY", "items": { "type": "STRING" } },
            "correctAnswer": { "type": "STRING" }
        },
        "required": ["id", "text", "options", "correctAnswer"]
    })
}

pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "level": { "type": "STRING" },
            "reading": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "text": { "type": "STRING" },
                        "questions": { "type": "ARRAY", "items": question_schema() },
                        "sampleModelAnswer": { "type": "STRING" }
                    },
                    "required": ["title", "text", "questions", "sampleModelAnswer"]
                }
            },
            "listening": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "transcript": { "type": "STRING" },
                        "audioPrompt": { "type": "STRING" },
                        "questions": { "type": "ARRAY", "items": question_schema() }
                    },
                    "required": ["transcript", "audioPrompt", "questions"]
                }
            },
            "writing": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "prompt": { "type": "STRING" },
                        "context": { "type": "STRING" },
                        "sampleModelAnswer": { "type": "STRING" }
                    },
                    "required": ["prompt", "context", "sampleModelAnswer"]
                }
            },
            "speaking": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "prompt": { "type": "STRING" },
                        "context": { "type": "STRING" }
                    },
                    "required": ["prompt", "context"]
                }
            }
        },
        "required": ["level", "reading", "listening", "writing", "speaking"]
    })
}

pub(crate) fn content_request(level: TestLevel) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt(level) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}

/// Parse the JSON text part into a [`FullTest`].
///
/// The model echoes the level as free text, so the requested level overrides it.
pub(crate) fn parse_test(
    resp: &GenerateContentResponse,
    level: TestLevel,
) -> Result<FullTest, ContentGenerationFailure> {
    let text = resp
        .first_part()
        .and_then(|p| p.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ContentGenerationFailure::Empty)?;

    let mut value: Value = serde_json::from_str(text)
        .map_err(|e| ContentGenerationFailure::InvalidJson(e.to_string()))?;
    let Some(obj) = value.as_object_mut() else {
        return Err(ContentGenerationFailure::InvalidJson(
            "top level is not an object".into(),
        ));
    };
    obj.insert("level".into(), json!(level));

    let test: FullTest = serde_json::from_value(value)
        .map_err(|e| ContentGenerationFailure::InvalidJson(e.to_string()))?;
    if test.reading.is_empty() && test.listening.is_empty() {
        return Err(ContentGenerationFailure::Incomplete(
            "no reading or listening tasks".into(),
        ));
    }
    for task in &test.listening {
        if task.audio_prompt.trim().is_empty() {
            return Err(ContentGenerationFailure::Incomplete(
                "listening task without audio script".into(),
            ));
        }
    }
    Ok(test)
}
