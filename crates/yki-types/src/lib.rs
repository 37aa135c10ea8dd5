//! Shared types for the YKI practice exam.
//!
//! Two groups live here:
//! - exam content as returned by the generation service (`FullTest` and its tasks)
//! - playback status snapshots published by the speech player

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod session;

/// Proficiency level of a generated test.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestLevel {
    /// Basic level (A1-A2).
    #[serde(alias = "Perustaso", alias = "PERUSTASO")]
    Perustaso,
    /// Intermediate level (B1-B2).
    #[serde(alias = "Keskitaso", alias = "KESKITASO")]
    Keskitaso,
}

impl TestLevel {
    /// Levels offered on the level selection screen, in display order.
    pub const ALL: [TestLevel; 2] = [TestLevel::Perustaso, TestLevel::Keskitaso];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestLevel::Perustaso => "perustaso",
            TestLevel::Keskitaso => "keskitaso",
        }
    }

    /// CEFR band covered by the level.
    pub fn cefr_range(&self) -> &'static str {
        match self {
            TestLevel::Perustaso => "A1-A2",
            TestLevel::Keskitaso => "B1-B2",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TestLevel::Perustaso => "Perustason kokeen harjoittelu arkielämän tilanteisiin.",
            TestLevel::Keskitaso => {
                "Keskitason kokeen simulointi töitä ja kansalaisuutta varten."
            }
        }
    }

    /// Target word count range for a listening script at this level.
    pub fn listening_words(&self) -> (u32, u32) {
        match self {
            TestLevel::Perustaso => (50, 70),
            TestLevel::Keskitaso => (100, 130),
        }
    }
}

impl fmt::Display for TestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perustaso" | "a1-a2" | "basic" => Ok(TestLevel::Perustaso),
            "keskitaso" | "b1-b2" | "intermediate" => Ok(TestLevel::Keskitaso),
            other => Err(format!("unknown test level: {other}")),
        }
    }
}

/// Exam section, in the order the sections are taken.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestPart {
    Reading,
    Listening,
    Writing,
    Speaking,
}

impl TestPart {
    pub const ORDER: [TestPart; 4] = [
        TestPart::Reading,
        TestPart::Listening,
        TestPart::Writing,
        TestPart::Speaking,
    ];

    /// Finnish section title.
    pub fn title(&self) -> &'static str {
        match self {
            TestPart::Reading => "Luetun ymmärtäminen",
            TestPart::Listening => "Kuullun ymmärtäminen",
            TestPart::Writing => "Kirjoittaminen",
            TestPart::Speaking => "Puhuminen",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            TestPart::Reading => 0,
            TestPart::Listening => 1,
            TestPart::Writing => 2,
            TestPart::Speaking => 3,
        }
    }

    /// Following section, or `None` on the last one.
    pub fn next(&self) -> Option<TestPart> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    /// Preceding section, or `None` on the first one.
    pub fn prev(&self) -> Option<TestPart> {
        self.index().checked_sub(1).map(|i| Self::ORDER[i])
    }

    /// Whether the section is answered by picking options.
    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, TestPart::Reading | TestPart::Listening)
    }
}

/// Multiple-choice question with its answer key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
}

impl Question {
    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingTask {
    pub title: String,
    pub text: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub sample_model_answer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListeningTask {
    /// Transcript revealed after submitting.
    pub transcript: String,
    /// Clean Finnish script sent to speech synthesis.
    pub audio_prompt: String,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WritingTask {
    pub prompt: String,
    pub context: String,
    pub sample_model_answer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingTask {
    pub prompt: String,
    pub context: String,
}

/// A complete generated mock test.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FullTest {
    pub level: TestLevel,
    pub reading: Vec<ReadingTask>,
    pub listening: Vec<ListeningTask>,
    pub writing: Vec<WritingTask>,
    pub speaking: Vec<SpeakingTask>,
}

impl FullTest {
    /// All questions of a multiple-choice section. Empty for writing/speaking.
    pub fn questions(&self, part: TestPart) -> Vec<&Question> {
        match part {
            TestPart::Reading => self.reading.iter().flat_map(|t| t.questions.iter()).collect(),
            TestPart::Listening => self
                .listening
                .iter()
                .flat_map(|t| t.questions.iter())
                .collect(),
            TestPart::Writing | TestPart::Speaking => Vec::new(),
        }
    }

    pub fn question(&self, part: TestPart, id: &str) -> Option<&Question> {
        self.questions(part).into_iter().find(|q| q.id == id)
    }

    /// Number of tasks in a section.
    pub fn task_count(&self, part: TestPart) -> usize {
        match part {
            TestPart::Reading => self.reading.len(),
            TestPart::Listening => self.listening.len(),
            TestPart::Writing => self.writing.len(),
            TestPart::Speaking => self.speaking.len(),
        }
    }
}

/// Playback controller state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
}

/// Reason why a playback session returned to idle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// The output consumed the whole buffer.
    Completed,
    /// Playback was explicitly stopped.
    Stopped,
    /// A pending synthesis request was abandoned before audio arrived.
    Cancelled,
    /// Synthesis, decoding or output failed.
    Error,
}

/// Snapshot of the speech player for status lines.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Token of the current (or last) playback session.
    pub token: u64,
    /// Short preview of the text being spoken.
    pub text: Option<String>,
    /// Buffer sample rate (Hz).
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub duration_ms: Option<u64>,
    pub elapsed_ms: Option<u64>,
    /// Output device name, once the output context exists.
    pub device: Option<String>,
    /// Device sample rate when the buffer was resampled.
    pub resample_to_hz: Option<u32>,
    pub end_reason: Option<PlaybackEndReason>,
}

impl PlaybackStatus {
    pub fn is_busy(&self) -> bool {
        self.state != PlaybackState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TEST: &str = r#"{
        "level": "perustaso",
        "reading": [{
            "title": "Kirjasto",
            "text": "Kirjasto on auki maanantaina.",
            "questions": [{
                "id": "r1",
                "text": "Milloin kirjasto on auki?",
                "options": ["maanantaina", "tiistaina"],
                "correctAnswer": "maanantaina"
            }],
            "sampleModelAnswer": "-"
        }],
        "listening": [{
            "transcript": "Tehtävä 1.",
            "audioPrompt": "Tehtävä 1. Kuuntele seuraava teksti ja vastaa kysymyksiin.",
            "questions": [{
                "id": "l1",
                "text": "Mitä?",
                "options": ["a", "b"],
                "correctAnswer": "b"
            }]
        }],
        "writing": [{ "prompt": "Kirjoita", "context": "Ystävälle", "sampleModelAnswer": "Hei!" }],
        "speaking": [{ "prompt": "Kerro", "context": "Kaupassa" }]
    }"#;

    #[test]
    fn full_test_parses_service_json() {
        let test: FullTest = serde_json::from_str(SAMPLE_TEST).unwrap();
        assert_eq!(test.level, TestLevel::Perustaso);
        assert_eq!(test.reading[0].questions[0].correct_answer, "maanantaina");
        assert!(test.listening[0].audio_prompt.starts_with("Tehtävä 1."));
        assert_eq!(test.writing[0].sample_model_answer, "Hei!");
    }

    #[test]
    fn level_accepts_capitalized_alias() {
        let level: TestLevel = serde_json::from_str("\"Keskitaso\"").unwrap();
        assert_eq!(level, TestLevel::Keskitaso);
        assert_eq!("B1-B2".parse::<TestLevel>().unwrap(), TestLevel::Keskitaso);
        assert!("advanced".parse::<TestLevel>().is_err());
    }

    #[test]
    fn question_lookup_by_part() {
        let test: FullTest = serde_json::from_str(SAMPLE_TEST).unwrap();
        assert!(test.question(TestPart::Reading, "r1").is_some());
        assert!(test.question(TestPart::Reading, "l1").is_none());
        assert!(test.question(TestPart::Listening, "l1").is_some());
        assert!(test.questions(TestPart::Writing).is_empty());
    }

    #[test]
    fn part_navigation_is_bounded() {
        assert_eq!(TestPart::Reading.prev(), None);
        assert_eq!(TestPart::Reading.next(), Some(TestPart::Listening));
        assert_eq!(TestPart::Speaking.next(), None);
        assert_eq!(TestPart::Speaking.prev(), Some(TestPart::Writing));
    }

    #[test]
    fn missing_options_default_to_empty() {
        let q: Question =
            serde_json::from_str(r#"{"id":"x","text":"t","correctAnswer":"a"}"#).unwrap();
        assert!(q.options().is_empty());
    }
}
