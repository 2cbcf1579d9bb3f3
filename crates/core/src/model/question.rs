use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least 2 options, got {count}")]
    TooFewOptions { count: usize },

    #[error("duplicate option id: {0}")]
    DuplicateOptionId(OptionId),

    #[error("question has no correct option")]
    NoCorrectOption,

    #[error("correct option id {0} does not match any option")]
    UnknownCorrectOption(OptionId),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("srs level must be 0, 1 or 2, got {0}")]
pub struct SrsLevelError(pub u8);

//
// ─── LEARNING STATUS ───────────────────────────────────────────────────────────
//

/// Coarse learning state shown to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStatus {
    /// Never answered (or reset by a chapter retry).
    #[default]
    NotAttempted,
    /// Last answer was wrong.
    Attempted,
    /// Answered correctly once; waiting for the learning review.
    PassedOnce,
    /// Terminal. Never scheduled again.
    Mastered,
}

impl LearningStatus {
    #[must_use]
    pub fn is_answered(self) -> bool {
        !matches!(self, Self::NotAttempted)
    }

    /// True for the statuses reached through a correct answer.
    #[must_use]
    pub fn is_passing(self) -> bool {
        matches!(self, Self::PassedOnce | Self::Mastered)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Attempted => "attempted",
            Self::PassedOnce => "passed_once",
            Self::Mastered => "mastered",
        }
    }
}

//
// ─── SRS LEVEL ─────────────────────────────────────────────────────────────────
//

/// Three-step SRS ladder, persisted as `0`, `1` or `2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum SrsLevel {
    /// Level 0: new or lapsed questions.
    #[default]
    New,
    /// Level 1: answered correctly once.
    Learning,
    /// Level 2: terminal.
    Mastered,
}

impl SrsLevel {
    /// Next level after a correct answer, saturating at `Mastered`.
    #[must_use]
    pub fn promoted(self) -> Self {
        match self {
            Self::New => Self::Learning,
            Self::Learning | Self::Mastered => Self::Mastered,
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Learning => 1,
            Self::Mastered => 2,
        }
    }
}

impl From<SrsLevel> for u8 {
    fn from(level: SrsLevel) -> Self {
        level.value()
    }
}

impl TryFrom<u8> for SrsLevel {
    type Error = SrsLevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::New),
            1 => Ok(Self::Learning),
            2 => Ok(Self::Mastered),
            _ => Err(SrsLevelError(value)),
        }
    }
}

//
// ─── LEARNING RECORD ───────────────────────────────────────────────────────────
//

/// Mutable per-question learning ledger.
///
/// Only the transition engine writes these fields during a session; a chapter
/// retry replaces the whole record with `LearningRecord::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningRecord {
    pub status: LearningStatus,
    pub srs_level: SrsLevel,
    /// `None` means eligible right away, or never again once mastered.
    pub next_review_at: Option<DateTime<Utc>>,
    pub times_answered_correctly: u32,
    pub times_answered_incorrectly: u32,
    pub history_of_incorrect_selections: Vec<OptionId>,
    pub shown_incorrect_option_ids: Vec<OptionId>,
    pub last_selected_option_id: Option<OptionId>,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

impl LearningRecord {
    #[must_use]
    pub fn is_mastered(&self) -> bool {
        self.status == LearningStatus::Mastered
    }

    /// Bring a loaded record back to a schedulable state.
    ///
    /// Level 2 and status `mastered` imply each other and a null due time. A
    /// level-1 record without a due time is never due, so it drops to level 0.
    pub(crate) fn reconcile(&mut self) {
        if self.srs_level == SrsLevel::Mastered || self.status == LearningStatus::Mastered {
            self.srs_level = SrsLevel::Mastered;
            self.status = LearningStatus::Mastered;
            self.next_review_at = None;
        } else if self.srs_level == SrsLevel::Learning && self.next_review_at.is_none() {
            self.srs_level = SrsLevel::New;
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub option_id: OptionId,
    pub option_text: String,
}

impl QuestionOption {
    #[must_use]
    pub fn new(option_id: impl Into<OptionId>, option_text: impl Into<String>) -> Self {
        Self {
            option_id: option_id.into(),
            option_text: option_text.into(),
        }
    }
}

/// A multiple-choice question together with its learning record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    question_id: QuestionId,
    question_text: String,
    options: Vec<QuestionOption>,
    correct_option_ids: Vec<OptionId>,
    #[serde(default)]
    explanation_text: String,
    #[serde(flatten)]
    pub(crate) learning: LearningRecord,
}

impl Question {
    /// Creates a fresh, never-answered question.
    #[must_use]
    pub fn new(
        question_id: QuestionId,
        question_text: impl Into<String>,
        options: Vec<QuestionOption>,
        correct_option_ids: Vec<OptionId>,
        explanation_text: impl Into<String>,
    ) -> Self {
        Self {
            question_id,
            question_text: question_text.into(),
            options,
            correct_option_ids,
            explanation_text: explanation_text.into(),
            learning: LearningRecord::default(),
        }
    }

    /// Rehydrate a question with a previously persisted learning record.
    #[must_use]
    pub fn with_learning(mut self, learning: LearningRecord) -> Self {
        self.learning = learning;
        self
    }

    /// Same content, learning record back to defaults.
    #[must_use]
    pub fn reset_learning(&self) -> Self {
        let mut reset = self.clone();
        reset.learning = LearningRecord::default();
        reset
    }

    /// Check the structural rules every stored question must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` found.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.question_text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: self.options.len(),
            });
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        for option in &self.options {
            if !seen.insert(&option.option_id) {
                return Err(QuestionError::DuplicateOptionId(option.option_id.clone()));
            }
        }

        if self.correct_option_ids.is_empty() {
            return Err(QuestionError::NoCorrectOption);
        }
        if let Some(unknown) = self
            .correct_option_ids
            .iter()
            .find(|id| !seen.contains(id))
        {
            return Err(QuestionError::UnknownCorrectOption(unknown.clone()));
        }

        Ok(())
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.question_text
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, id: &OptionId) -> Option<&QuestionOption> {
        self.options.iter().find(|o| &o.option_id == id)
    }

    #[must_use]
    pub fn correct_option_ids(&self) -> &[OptionId] {
        &self.correct_option_ids
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation_text
    }

    #[must_use]
    pub fn is_correct(&self, option_id: &OptionId) -> bool {
        self.correct_option_ids.contains(option_id)
    }

    #[must_use]
    pub fn learning(&self) -> &LearningRecord {
        &self.learning
    }

    #[must_use]
    pub fn status(&self) -> LearningStatus {
        self.learning.status
    }

    #[must_use]
    pub fn srs_level(&self) -> SrsLevel {
        self.learning.srs_level
    }

    #[must_use]
    pub fn next_review_at(&self) -> Option<DateTime<Utc>> {
        self.learning.next_review_at
    }

    #[must_use]
    pub fn is_mastered(&self) -> bool {
        self.learning.is_mastered()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
