//! Exam session state.
//!
//! Holds the selected level, the generated test, the active section, the submitted flag and
//! the user's answers. The session never scores a test; after submitting, each question is
//! only compared against the answer key.

use std::collections::BTreeMap;

use crate::{FullTest, Question, TestLevel, TestPart};

/// Where the user is in the exam flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExamPhase {
    SelectingLevel,
    Generating(TestLevel),
    InProgress,
}

/// Answers collected per section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserAnswers {
    /// Question id -> chosen option.
    pub reading: BTreeMap<String, String>,
    /// Question id -> chosen option.
    pub listening: BTreeMap<String, String>,
    /// One text per writing task.
    pub writing: Vec<String>,
    /// Optional self-notes per speaking task.
    pub speaking: Vec<Option<String>>,
}

impl UserAnswers {
    fn sized_for(test: &FullTest) -> Self {
        Self {
            reading: BTreeMap::new(),
            listening: BTreeMap::new(),
            writing: vec![String::new(); test.writing.len()],
            speaking: vec![None; test.speaking.len()],
        }
    }

    pub fn choice(&self, part: TestPart, question_id: &str) -> Option<&str> {
        let map = match part {
            TestPart::Reading => &self.reading,
            TestPart::Listening => &self.listening,
            TestPart::Writing | TestPart::Speaking => return None,
        };
        map.get(question_id).map(String::as_str)
    }
}

/// Outcome of comparing a chosen option with the answer key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerReview<'a> {
    Unanswered { correct: &'a str },
    Correct,
    Incorrect { chosen: &'a str, correct: &'a str },
}

/// Result of pressing the submit control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Answers are frozen and the review is visible.
    Submitted,
    /// The test was already submitted; the session went back to level selection.
    Restarted,
    /// No test is loaded.
    Ignored,
}

#[derive(Debug)]
pub struct ExamSession {
    phase: ExamPhase,
    level: Option<TestLevel>,
    test: Option<FullTest>,
    active_part: TestPart,
    submitted: bool,
    answers: UserAnswers,
    notice: Option<String>,
}

impl Default for ExamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamSession {
    pub fn new() -> Self {
        Self {
            phase: ExamPhase::SelectingLevel,
            level: None,
            test: None,
            active_part: TestPart::Reading,
            submitted: false,
            answers: UserAnswers::default(),
            notice: None,
        }
    }

    pub fn phase(&self) -> &ExamPhase {
        &self.phase
    }

    pub fn level(&self) -> Option<TestLevel> {
        self.level
    }

    pub fn test(&self) -> Option<&FullTest> {
        self.test.as_ref()
    }

    pub fn active_part(&self) -> TestPart {
        self.active_part
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn answers(&self) -> &UserAnswers {
        &self.answers
    }

    /// Blocking notice left by a failed content request.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Start generating a test for `level`. Returns `false` while a generation is already
    /// in flight.
    pub fn begin(&mut self, level: TestLevel) -> bool {
        if matches!(self.phase, ExamPhase::Generating(_)) {
            return false;
        }
        self.phase = ExamPhase::Generating(level);
        self.level = Some(level);
        self.test = None;
        self.submitted = false;
        self.answers = UserAnswers::default();
        self.notice = None;
        true
    }

    /// Install a generated test and open the first section.
    pub fn load(&mut self, test: FullTest) {
        self.answers = UserAnswers::sized_for(&test);
        self.level = Some(test.level);
        self.test = Some(test);
        self.phase = ExamPhase::InProgress;
        self.active_part = TestPart::Reading;
        self.submitted = false;
    }

    /// Content generation failed: back to level selection with a notice.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = ExamPhase::SelectingLevel;
        self.level = None;
        self.test = None;
        self.notice = Some(message.into());
    }

    /// Abandon the current test and return to level selection.
    pub fn reset(&mut self) {
        let notice = self.notice.take();
        *self = Self::new();
        self.notice = notice;
    }

    pub fn select_part(&mut self, part: TestPart) {
        if self.phase == ExamPhase::InProgress {
            self.active_part = part;
        }
    }

    /// Move to the following section. Returns `false` on the last section.
    pub fn next_part(&mut self) -> bool {
        match self.active_part.next() {
            Some(part) if self.phase == ExamPhase::InProgress => {
                self.active_part = part;
                true
            }
            _ => false,
        }
    }

    /// Move to the preceding section. Returns `false` on the first section.
    pub fn prev_part(&mut self) -> bool {
        match self.active_part.prev() {
            Some(part) if self.phase == ExamPhase::InProgress => {
                self.active_part = part;
                true
            }
            _ => false,
        }
    }

    /// Record a multiple-choice answer.
    ///
    /// Ignored once submitted, for non multiple-choice parts, for unknown question ids and
    /// for options the question does not offer.
    pub fn choose(&mut self, part: TestPart, question_id: &str, option: &str) -> bool {
        if self.submitted || !part.is_multiple_choice() {
            return false;
        }
        let Some(question) = self.test.as_ref().and_then(|t| t.question(part, question_id)) else {
            return false;
        };
        if !question.options().iter().any(|o| o == option) {
            return false;
        }
        let map = match part {
            TestPart::Reading => &mut self.answers.reading,
            _ => &mut self.answers.listening,
        };
        map.insert(question_id.to_string(), option.to_string());
        true
    }

    /// Replace the text of writing task `index`.
    pub fn write(&mut self, index: usize, text: impl Into<String>) -> bool {
        if self.submitted {
            return false;
        }
        match self.answers.writing.get_mut(index) {
            Some(slot) => {
                *slot = text.into();
                true
            }
            None => false,
        }
    }

    /// Attach a note to speaking task `index`.
    pub fn note_speaking(&mut self, index: usize, note: Option<String>) -> bool {
        if self.submitted {
            return false;
        }
        match self.answers.speaking.get_mut(index) {
            Some(slot) => {
                *slot = note;
                true
            }
            None => false,
        }
    }

    /// Character count shown under a writing answer.
    pub fn character_count(&self, index: usize) -> usize {
        self.answers
            .writing
            .get(index)
            .map(|text| text.chars().count())
            .unwrap_or(0)
    }

    /// Submit answers, or start over when already submitted.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.phase != ExamPhase::InProgress {
            return SubmitOutcome::Ignored;
        }
        if self.submitted {
            self.reset();
            return SubmitOutcome::Restarted;
        }
        self.submitted = true;
        SubmitOutcome::Submitted
    }

    /// Compare the stored answer for `question` with its key.
    pub fn review<'a>(&'a self, part: TestPart, question: &'a Question) -> AnswerReview<'a> {
        let correct = question.correct_answer.as_str();
        match self.answers.choice(part, &question.id) {
            None => AnswerReview::Unanswered { correct },
            Some(chosen) if chosen == correct => AnswerReview::Correct,
            Some(chosen) => AnswerReview::Incorrect { chosen, correct },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ListeningTask, ReadingTask, SpeakingTask, WritingTask};

    fn question(id: &str, correct: &str) -> Question {
        Question {
            id: id.to_string(),
            text: format!("kysymys {id}"),
            options: Some(vec!["a".into(), "b".into(), "c".into()]),
            correct_answer: correct.to_string(),
        }
    }

    fn sample_test() -> FullTest {
        FullTest {
            level: TestLevel::Keskitaso,
            reading: vec![ReadingTask {
                title: "Uutinen".into(),
                text: "Teksti".into(),
                questions: vec![question("r1", "a"), question("r2", "b")],
                sample_model_answer: String::new(),
            }],
            listening: vec![ListeningTask {
                transcript: "Litterointi".into(),
                audio_prompt: "Tehtävä 1.".into(),
                questions: vec![question("l1", "c")],
            }],
            writing: vec![
                WritingTask {
                    prompt: "Kirjoita viesti".into(),
                    context: "Naapurille".into(),
                    sample_model_answer: "Hei naapuri".into(),
                },
                WritingTask {
                    prompt: "Kirjoita mielipide".into(),
                    context: "Lehteen".into(),
                    sample_model_answer: "Mielestäni".into(),
                },
            ],
            speaking: vec![SpeakingTask {
                prompt: "Kerro perheestäsi".into(),
                context: "Ystävä kysyy".into(),
            }],
        }
    }

    fn loaded() -> ExamSession {
        let mut session = ExamSession::new();
        assert!(session.begin(TestLevel::Keskitaso));
        session.load(sample_test());
        session
    }

    #[test]
    fn load_sizes_answer_slots() {
        let session = loaded();
        assert_eq!(session.phase(), &ExamPhase::InProgress);
        assert_eq!(session.answers().writing.len(), 2);
        assert_eq!(session.answers().speaking.len(), 1);
        assert_eq!(session.active_part(), TestPart::Reading);
    }

    #[test]
    fn begin_is_rejected_while_generating() {
        let mut session = ExamSession::new();
        assert!(session.begin(TestLevel::Perustaso));
        assert!(!session.begin(TestLevel::Keskitaso));
        assert_eq!(session.phase(), &ExamPhase::Generating(TestLevel::Perustaso));
    }

    #[test]
    fn failure_returns_to_level_selection() {
        let mut session = ExamSession::new();
        session.begin(TestLevel::Perustaso);
        session.fail("Virhe kokeen luomisessa.");
        assert_eq!(session.phase(), &ExamPhase::SelectingLevel);
        assert_eq!(session.level(), None);
        assert_eq!(session.notice(), Some("Virhe kokeen luomisessa."));
    }

    #[test]
    fn navigation_stops_at_both_ends() {
        let mut session = loaded();
        assert!(!session.prev_part());
        assert!(session.next_part());
        assert!(session.next_part());
        assert!(session.next_part());
        assert_eq!(session.active_part(), TestPart::Speaking);
        assert!(!session.next_part());
        session.select_part(TestPart::Listening);
        assert_eq!(session.active_part(), TestPart::Listening);
    }

    #[test]
    fn choose_validates_question_and_option() {
        let mut session = loaded();
        assert!(session.choose(TestPart::Reading, "r1", "b"));
        assert!(!session.choose(TestPart::Reading, "l1", "a"));
        assert!(!session.choose(TestPart::Reading, "r1", "z"));
        assert!(!session.choose(TestPart::Writing, "r1", "a"));
        assert_eq!(session.answers().choice(TestPart::Reading, "r1"), Some("b"));
    }

    #[test]
    fn answers_freeze_after_submit() {
        let mut session = loaded();
        session.choose(TestPart::Listening, "l1", "c");
        session.write(0, "Hei");
        assert_eq!(session.submit(), SubmitOutcome::Submitted);
        assert!(!session.choose(TestPart::Listening, "l1", "a"));
        assert!(!session.write(0, "Moi"));
        assert_eq!(session.answers().writing[0], "Hei");
    }

    #[test]
    fn second_submit_starts_over() {
        let mut session = loaded();
        session.submit();
        assert_eq!(session.submit(), SubmitOutcome::Restarted);
        assert_eq!(session.phase(), &ExamPhase::SelectingLevel);
        assert!(session.test().is_none());
        assert_eq!(ExamSession::new().submit(), SubmitOutcome::Ignored);
    }

    #[test]
    fn review_compares_against_key() {
        let mut session = loaded();
        session.choose(TestPart::Reading, "r1", "a");
        session.choose(TestPart::Reading, "r2", "c");
        let test = sample_test();
        let qs = &test.reading[0].questions;
        assert_eq!(session.review(TestPart::Reading, &qs[0]), AnswerReview::Correct);
        assert_eq!(
            session.review(TestPart::Reading, &qs[1]),
            AnswerReview::Incorrect { chosen: "c", correct: "b" }
        );
        let l1 = &test.listening[0].questions[0];
        assert_eq!(
            session.review(TestPart::Listening, l1),
            AnswerReview::Unanswered { correct: "c" }
        );
    }

    #[test]
    fn character_count_counts_chars_not_bytes() {
        let mut session = loaded();
        session.write(1, "Hyvää päivää");
        assert_eq!(session.character_count(1), 12);
        assert_eq!(session.character_count(5), 0);
    }
}
