use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::chapter::Chapter;
use crate::model::ids::{ChapterId, OptionId, QuestionId};
use crate::model::question::{Question, QuestionError};
use crate::transition::TransitionEngine;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module name cannot be empty")]
    EmptyName,

    #[error("chapter name cannot be empty: {0}")]
    EmptyChapterName(ChapterId),

    #[error("duplicate chapter id: {0}")]
    DuplicateChapterId(ChapterId),

    #[error("duplicate question id {question_id} in chapter {chapter_id}")]
    DuplicateQuestionId {
        chapter_id: ChapterId,
        question_id: QuestionId,
    },

    #[error("invalid question {question_id} in chapter {chapter_id}: {source}")]
    InvalidQuestion {
        chapter_id: ChapterId,
        question_id: QuestionId,
        #[source]
        source: QuestionError,
    },

    #[error("chapter not found: {0}")]
    ChapterNotFound(ChapterId),

    #[error("question {question_id} not found in chapter {chapter_id}")]
    QuestionNotFound {
        chapter_id: ChapterId,
        question_id: QuestionId,
    },
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// Root aggregate: a named set of chapters.
///
/// All mutating operations are copy-on-write. They take `&self`, build the next
/// module value and return it, so a failed lookup leaves the caller's snapshot
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    chapters: Vec<Chapter>,
}

impl Module {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        chapters: Vec<Chapter>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            chapters,
        }
    }

    /// Validate the module structure and normalize derived data.
    ///
    /// - trims module and chapter names
    /// - enforces unique chapter ids and per-chapter unique question ids
    /// - validates every question (see `Question::validate`)
    /// - reconciles `srsLevel`, `status` and `nextReviewAt` so every
    ///   non-mastered question can become due
    /// - recomputes every chapter's counters
    ///
    /// # Errors
    ///
    /// Returns the first `ModuleError` found.
    pub fn normalized(mut self) -> Result<Self, ModuleError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ModuleError::EmptyName);
        }
        self.name = name.to_owned();
        self.description = self.description.trim().to_owned();

        let mut chapter_ids = HashSet::with_capacity(self.chapters.len());
        for chapter in &mut self.chapters {
            if !chapter_ids.insert(chapter.id().clone()) {
                return Err(ModuleError::DuplicateChapterId(chapter.id().clone()));
            }

            let chapter_name = chapter.name().trim().to_owned();
            if chapter_name.is_empty() {
                return Err(ModuleError::EmptyChapterName(chapter.id().clone()));
            }
            chapter.set_name(chapter_name);

            let chapter_id = chapter.id().clone();
            let mut question_ids = HashSet::with_capacity(chapter.questions().len());
            for question in chapter.questions_mut() {
                if !question_ids.insert(question.id().clone()) {
                    return Err(ModuleError::DuplicateQuestionId {
                        chapter_id,
                        question_id: question.id().clone(),
                    });
                }
                question
                    .validate()
                    .map_err(|source| ModuleError::InvalidQuestion {
                        chapter_id: chapter_id.clone(),
                        question_id: question.id().clone(),
                        source,
                    })?;
                question.learning.reconcile();
            }
            chapter.recalculate();
        }

        Ok(self)
    }

    // Accessors
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    #[must_use]
    pub fn chapter(&self, id: &ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == id)
    }

    /// Look up a question inside a chapter.
    ///
    /// # Errors
    ///
    /// Returns `ChapterNotFound` or `QuestionNotFound`.
    pub fn question(
        &self,
        chapter_id: &ChapterId,
        question_id: &QuestionId,
    ) -> Result<&Question, ModuleError> {
        self.chapter(chapter_id)
            .ok_or_else(|| ModuleError::ChapterNotFound(chapter_id.clone()))?
            .question(question_id)
            .ok_or_else(|| ModuleError::QuestionNotFound {
                chapter_id: chapter_id.clone(),
                question_id: question_id.clone(),
            })
    }

    /// Every question in chapter order, paired with its chapter id.
    pub fn questions(&self) -> impl Iterator<Item = (&ChapterId, &Question)> {
        self.chapters
            .iter()
            .flat_map(|c| c.questions().iter().map(move |q| (c.id(), q)))
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.chapters.iter().map(|c| c.questions().len()).sum()
    }

    #[must_use]
    pub fn mastered_questions(&self) -> usize {
        self.questions().filter(|(_, q)| q.is_mastered()).count()
    }

    //
    // ─── COPY-ON-WRITE UPDATES ─────────────────────────────────────────────────
    //

    /// Run the transition engine on one question and return the next module.
    ///
    /// The owning chapter's counters are recomputed.
    ///
    /// # Errors
    ///
    /// Returns `ChapterNotFound` or `QuestionNotFound`; `self` is unchanged.
    pub fn apply_answer(
        &self,
        engine: &TransitionEngine,
        chapter_id: &ChapterId,
        question_id: &QuestionId,
        selected: &OptionId,
        displayed: &[OptionId],
        now: DateTime<Utc>,
    ) -> Result<Self, ModuleError> {
        self.update_chapter(chapter_id, |chapter| {
            let question = chapter.question_mut(question_id).ok_or_else(|| {
                ModuleError::QuestionNotFound {
                    chapter_id: chapter_id.clone(),
                    question_id: question_id.clone(),
                }
            })?;
            *question = engine.apply_answer(question, selected, displayed, now);
            Ok(())
        })
    }

    /// Reset the learning record of every question in a chapter.
    ///
    /// # Errors
    ///
    /// Returns `ChapterNotFound`; `self` is unchanged.
    pub fn reset_chapter(&self, chapter_id: &ChapterId) -> Result<Self, ModuleError> {
        self.update_chapter(chapter_id, |chapter| {
            for question in chapter.questions_mut() {
                *question = question.reset_learning();
            }
            Ok(())
        })
    }

    /// Append a question to a chapter.
    ///
    /// # Errors
    ///
    /// Returns `ChapterNotFound`, `DuplicateQuestionId` or `InvalidQuestion`.
    pub fn add_question(
        &self,
        chapter_id: &ChapterId,
        question: Question,
    ) -> Result<Self, ModuleError> {
        self.update_chapter(chapter_id, |chapter| {
            if chapter.question(question.id()).is_some() {
                return Err(ModuleError::DuplicateQuestionId {
                    chapter_id: chapter_id.clone(),
                    question_id: question.id().clone(),
                });
            }
            validate_in(chapter_id, &question)?;
            chapter.questions_mut().push(question);
            Ok(())
        })
    }

    /// Replace a question in place, matched by its id.
    ///
    /// # Errors
    ///
    /// Returns `ChapterNotFound`, `QuestionNotFound` or `InvalidQuestion`.
    pub fn replace_question(
        &self,
        chapter_id: &ChapterId,
        question: Question,
    ) -> Result<Self, ModuleError> {
        self.update_chapter(chapter_id, |chapter| {
            validate_in(chapter_id, &question)?;
            let slot = chapter.question_mut(question.id()).ok_or_else(|| {
                ModuleError::QuestionNotFound {
                    chapter_id: chapter_id.clone(),
                    question_id: question.id().clone(),
                }
            })?;
            *slot = question;
            Ok(())
        })
    }

    /// Remove a question from a chapter.
    ///
    /// # Errors
    ///
    /// Returns `ChapterNotFound` or `QuestionNotFound`.
    pub fn remove_question(
        &self,
        chapter_id: &ChapterId,
        question_id: &QuestionId,
    ) -> Result<Self, ModuleError> {
        self.update_chapter(chapter_id, |chapter| {
            let position = chapter.position_of(question_id).ok_or_else(|| {
                ModuleError::QuestionNotFound {
                    chapter_id: chapter_id.clone(),
                    question_id: question_id.clone(),
                }
            })?;
            chapter.questions_mut().remove(position);
            Ok(())
        })
    }

    fn update_chapter(
        &self,
        chapter_id: &ChapterId,
        edit: impl FnOnce(&mut Chapter) -> Result<(), ModuleError>,
    ) -> Result<Self, ModuleError> {
        let position = self
            .chapters
            .iter()
            .position(|c| c.id() == chapter_id)
            .ok_or_else(|| ModuleError::ChapterNotFound(chapter_id.clone()))?;
        let mut chapter = self.chapters[position].clone();
        edit(&mut chapter)?;

        let mut next = self.clone();
        next.chapters[position] = chapter.recalculated();
        Ok(next)
    }
}

fn validate_in(chapter_id: &ChapterId, question: &Question) -> Result<(), ModuleError> {
    question
        .validate()
        .map_err(|source| ModuleError::InvalidQuestion {
            chapter_id: chapter_id.clone(),
            question_id: question.id().clone(),
            source,
        })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::{LearningRecord, LearningStatus, QuestionOption, SrsLevel};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn build_question(id: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            vec![QuestionOption::new("a", "A"), QuestionOption::new("b", "B")],
            vec![OptionId::new("a")],
            "A is right.",
        )
    }

    fn build_module() -> Module {
        Module::new(
            "Geography",
            "Capitals",
            vec![
                Chapter::new(
                    ChapterId::new("europe"),
                    "Europe",
                    "",
                    vec![build_question("q1"), build_question("q2")],
                ),
                Chapter::new(ChapterId::new("asia"), "Asia", "", vec![build_question("q1")]),
            ],
        )
    }

    #[test]
    fn normalized_accepts_valid_module_and_trims_names() {
        let module = Module::new(
            "  Geography ",
            " ",
            vec![Chapter::new(ChapterId::new("c1"), " Europe ", "", vec![build_question("q1")])],
        )
        .normalized()
        .unwrap();

        assert_eq!(module.name(), "Geography");
        assert_eq!(module.description(), "");
        assert_eq!(module.chapters()[0].name(), "Europe");
        assert_eq!(module.chapters()[0].stats().total_questions, 1);
    }

    #[test]
    fn normalized_rejects_duplicate_ids() {
        let duplicate_chapter = Module::new(
            "M",
            "",
            vec![
                Chapter::new(ChapterId::new("c1"), "One", "", Vec::new()),
                Chapter::new(ChapterId::new("c1"), "Two", "", Vec::new()),
            ],
        );
        assert_eq!(
            duplicate_chapter.normalized().unwrap_err(),
            ModuleError::DuplicateChapterId(ChapterId::new("c1"))
        );

        let duplicate_question = Module::new(
            "M",
            "",
            vec![Chapter::new(
                ChapterId::new("c1"),
                "One",
                "",
                vec![build_question("q1"), build_question("q1")],
            )],
        );
        assert!(matches!(
            duplicate_question.normalized().unwrap_err(),
            ModuleError::DuplicateQuestionId { .. }
        ));
    }

    #[test]
    fn normalized_reports_invalid_question_with_context() {
        let broken = Question::new(
            QuestionId::new("bad"),
            "Pick",
            vec![QuestionOption::new("a", "A"), QuestionOption::new("b", "B")],
            vec![OptionId::new("x")],
            "",
        );
        let module = Module::new(
            "M",
            "",
            vec![Chapter::new(ChapterId::new("c1"), "One", "", vec![broken])],
        );

        let err = module.normalized().unwrap_err();
        assert_eq!(
            err,
            ModuleError::InvalidQuestion {
                chapter_id: ChapterId::new("c1"),
                question_id: QuestionId::new("bad"),
                source: QuestionError::UnknownCorrectOption(OptionId::new("x")),
            }
        );
    }

    #[test]
    fn normalized_clears_due_time_of_mastered_questions() {
        let stale = build_question("q1").with_learning(LearningRecord {
            status: LearningStatus::Mastered,
            srs_level: SrsLevel::Mastered,
            next_review_at: Some(fixed_now()),
            ..LearningRecord::default()
        });
        let module = Module::new(
            "M",
            "",
            vec![Chapter::new(ChapterId::new("c1"), "One", "", vec![stale])],
        )
        .normalized()
        .unwrap();

        let question = module
            .question(&ChapterId::new("c1"), &QuestionId::new("q1"))
            .unwrap();
        assert_eq!(question.next_review_at(), None);
        assert_eq!(module.chapters()[0].stats().correct_answers, 1);
    }

    #[test]
    fn normalized_reconciles_level_and_status() {
        let record = |status, srs_level| LearningRecord {
            status,
            srs_level,
            ..LearningRecord::default()
        };
        let module = Module::new(
            "M",
            "",
            vec![Chapter::new(
                ChapterId::new("c1"),
                "One",
                "",
                vec![
                    build_question("level2")
                        .with_learning(record(LearningStatus::Attempted, SrsLevel::Mastered)),
                    build_question("status_mastered")
                        .with_learning(record(LearningStatus::Mastered, SrsLevel::New)),
                    build_question("learning_undated")
                        .with_learning(record(LearningStatus::PassedOnce, SrsLevel::Learning)),
                ],
            )],
        )
        .normalized()
        .unwrap();
        let c1 = ChapterId::new("c1");

        for id in ["level2", "status_mastered"] {
            let q = module.question(&c1, &QuestionId::new(id)).unwrap();
            assert_eq!(q.status(), LearningStatus::Mastered, "{id}");
            assert_eq!(q.srs_level(), SrsLevel::Mastered, "{id}");
            assert_eq!(q.next_review_at(), None, "{id}");
        }
        let undated = module.question(&c1, &QuestionId::new("learning_undated")).unwrap();
        assert_eq!(undated.srs_level(), SrsLevel::New);

        let scheduler = crate::scheduler::Scheduler::default();
        let (_, next) = scheduler
            .select_next_review_question(&module, fixed_now())
            .unwrap();
        assert_eq!(next.id().as_str(), "learning_undated");
        let counts = scheduler.srs_progress_counts(&module, fixed_now());
        assert_eq!(counts.total_non_mastered, 1);
        assert_eq!(counts.new_or_lapsing_due, 1);
    }

    #[test]
    fn apply_answer_updates_only_the_target_and_recomputes_stats() {
        let module = build_module();
        let engine = TransitionEngine::default();
        let now = fixed_now();

        let next = module
            .apply_answer(
                &engine,
                &ChapterId::new("europe"),
                &QuestionId::new("q1"),
                &OptionId::new("a"),
                &[],
                now,
            )
            .unwrap();

        let answered = next
            .question(&ChapterId::new("europe"), &QuestionId::new("q1"))
            .unwrap();
        assert_eq!(answered.status(), LearningStatus::PassedOnce);
        assert_eq!(answered.next_review_at(), Some(now + Duration::minutes(10)));

        // Same question id in another chapter is untouched.
        let other = next
            .question(&ChapterId::new("asia"), &QuestionId::new("q1"))
            .unwrap();
        assert_eq!(other.status(), LearningStatus::NotAttempted);

        let stats = next.chapter(&ChapterId::new("europe")).unwrap().stats();
        assert_eq!(stats.answered_questions, 1);
        assert_eq!(stats.correct_answers, 1);

        // Previous snapshot is unchanged.
        assert_eq!(
            module
                .question(&ChapterId::new("europe"), &QuestionId::new("q1"))
                .unwrap()
                .status(),
            LearningStatus::NotAttempted
        );
    }

    #[test]
    fn apply_answer_reports_lookup_failures() {
        let module = build_module();
        let engine = TransitionEngine::default();

        let err = module
            .apply_answer(
                &engine,
                &ChapterId::new("africa"),
                &QuestionId::new("q1"),
                &OptionId::new("a"),
                &[],
                fixed_now(),
            )
            .unwrap_err();
        assert_eq!(err, ModuleError::ChapterNotFound(ChapterId::new("africa")));

        let err = module
            .apply_answer(
                &engine,
                &ChapterId::new("asia"),
                &QuestionId::new("q9"),
                &OptionId::new("a"),
                &[],
                fixed_now(),
            )
            .unwrap_err();
        assert!(matches!(err, ModuleError::QuestionNotFound { .. }));
    }

    #[test]
    fn reset_chapter_restores_defaults() {
        let engine = TransitionEngine::default();
        let chapter_id = ChapterId::new("europe");
        let module = build_module()
            .apply_answer(
                &engine,
                &chapter_id,
                &QuestionId::new("q1"),
                &OptionId::new("b"),
                &[OptionId::new("a"), OptionId::new("b")],
                fixed_now(),
            )
            .unwrap();

        let reset = module.reset_chapter(&chapter_id).unwrap();
        let chapter = reset.chapter(&chapter_id).unwrap();
        for question in chapter.questions() {
            assert_eq!(question.learning(), &LearningRecord::default());
        }
        assert_eq!(chapter.stats().answered_questions, 0);
    }

    #[test]
    fn editing_questions_recomputes_counters() {
        let chapter_id = ChapterId::new("europe");
        let module = build_module();

        let added = module.add_question(&chapter_id, build_question("q3")).unwrap();
        assert_eq!(added.chapter(&chapter_id).unwrap().stats().total_questions, 3);

        let err = added.add_question(&chapter_id, build_question("q3")).unwrap_err();
        assert!(matches!(err, ModuleError::DuplicateQuestionId { .. }));

        let edited = Question::new(
            QuestionId::new("q3"),
            "Edited",
            vec![QuestionOption::new("x", "X"), QuestionOption::new("y", "Y")],
            vec![OptionId::new("y")],
            "",
        );
        let replaced = added.replace_question(&chapter_id, edited).unwrap();
        assert_eq!(
            replaced
                .question(&chapter_id, &QuestionId::new("q3"))
                .unwrap()
                .text(),
            "Edited"
        );

        let removed = replaced
            .remove_question(&chapter_id, &QuestionId::new("q1"))
            .unwrap();
        let chapter = removed.chapter(&chapter_id).unwrap();
        assert_eq!(chapter.stats().total_questions, 2);
        assert_eq!(chapter.position_of(&QuestionId::new("q2")), Some(0));
    }

    #[test]
    fn module_round_trips_through_json() {
        let module = build_module();
        let json = serde_json::to_string(&module).unwrap();
        let parsed: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, module);
        assert_eq!(parsed.total_questions(), 3);
        assert_eq!(parsed.mastered_questions(), 0);
    }
}
