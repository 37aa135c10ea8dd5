//! Gemini REST client for exam content and speech synthesis.

pub mod client;
pub mod config;
pub mod content;
pub mod speech;

pub use client::{ApiError, GeminiClient};
pub use config::GeminiConfig;
pub use content::{ContentGenerationFailure, ContentGenerator, GeminiContent};
pub use speech::GeminiSpeech;
