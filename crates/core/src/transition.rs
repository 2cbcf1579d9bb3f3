//! Learning-state transitions applied on each submitted answer.

use chrono::{DateTime, Utc};

use crate::model::{LearningStatus, OptionId, Question, SrsLevel, SrsSettings};

/// Pure answer-to-state function.
///
/// `apply_answer` never mutates its input: it returns the next version of the
/// question. Callers guarantee one call per submission.
///
/// # Examples
///
/// ```
/// # use quiz_core::model::{OptionId, Question, QuestionId, QuestionOption, SrsLevel};
/// # use quiz_core::transition::TransitionEngine;
/// let question = Question::new(
///     QuestionId::new("q1"),
///     "2 + 2 = ?",
///     vec![QuestionOption::new("a", "3"), QuestionOption::new("b", "4")],
///     vec![OptionId::new("b")],
///     "",
/// );
/// let engine = TransitionEngine::default();
/// let now = quiz_core::time::fixed_now();
/// let next = engine.apply_answer(&question, &OptionId::new("b"), &[], now);
/// assert_eq!(next.srs_level(), SrsLevel::Learning);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionEngine {
    settings: SrsSettings,
}

impl TransitionEngine {
    #[must_use]
    pub fn new(settings: SrsSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SrsSettings {
        &self.settings
    }

    /// Apply one answer event and return the updated question.
    ///
    /// `displayed` lists the option ids the learner saw, in display order.
    #[must_use]
    pub fn apply_answer(
        &self,
        question: &Question,
        selected: &OptionId,
        displayed: &[OptionId],
        now: DateTime<Utc>,
    ) -> Question {
        let mut next = question.clone();
        let is_correct = question.is_correct(selected);
        let learning = &mut next.learning;

        learning.last_selected_option_id = Some(selected.clone());
        learning.last_attempted_at = Some(now);

        if is_correct {
            learning.times_answered_correctly = learning.times_answered_correctly.saturating_add(1);
            let level = learning.srs_level.promoted();
            learning.srs_level = level;

            if level == SrsLevel::Mastered {
                learning.status = LearningStatus::Mastered;
                learning.next_review_at = None;
            } else {
                learning.status = LearningStatus::PassedOnce;
                learning.next_review_at = Some(now + self.settings.interval_for(level));
            }
        } else {
            learning.times_answered_incorrectly =
                learning.times_answered_incorrectly.saturating_add(1);
            learning.history_of_incorrect_selections.push(selected.clone());

            for option_id in displayed {
                if !question.is_correct(option_id)
                    && !learning.shown_incorrect_option_ids.contains(option_id)
                {
                    learning.shown_incorrect_option_ids.push(option_id.clone());
                }
            }

            learning.srs_level = SrsLevel::New;
            learning.status = LearningStatus::Attempted;
            learning.next_review_at = Some(now + self.settings.retry_delay());
        }

        next
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LearningRecord, QuestionId, QuestionOption};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn build_question() -> Question {
        Question::new(
            QuestionId::new("q1"),
            "Which are primes?",
            vec![
                QuestionOption::new("a", "2"),
                QuestionOption::new("b", "4"),
                QuestionOption::new("c", "3"),
                QuestionOption::new("d", "9"),
            ],
            vec![OptionId::new("a"), OptionId::new("c")],
            "2 and 3 are prime.",
        )
    }

    fn displayed() -> Vec<OptionId> {
        ["a", "b", "c", "d"].into_iter().map(OptionId::new).collect()
    }

    #[test]
    fn first_correct_answer_moves_to_learning() {
        let engine = TransitionEngine::default();
        let now = fixed_now();

        let next = engine.apply_answer(&build_question(), &OptionId::new("a"), &displayed(), now);

        assert_eq!(next.srs_level(), SrsLevel::Learning);
        assert_eq!(next.status(), LearningStatus::PassedOnce);
        assert_eq!(next.next_review_at(), Some(now + Duration::minutes(10)));
        assert_eq!(next.learning().times_answered_correctly, 1);
        assert_eq!(next.learning().last_selected_option_id, Some(OptionId::new("a")));
        assert_eq!(next.learning().last_attempted_at, Some(now));
        assert!(next.learning().shown_incorrect_option_ids.is_empty());
    }

    #[test]
    fn second_correct_answer_masters_and_clears_due_time() {
        let engine = TransitionEngine::default();
        let t0 = fixed_now();
        let once = engine.apply_answer(&build_question(), &OptionId::new("a"), &[], t0);

        let t1 = t0 + Duration::minutes(10);
        let twice = engine.apply_answer(&once, &OptionId::new("c"), &[], t1);

        assert_eq!(twice.srs_level(), SrsLevel::Mastered);
        assert_eq!(twice.status(), LearningStatus::Mastered);
        assert_eq!(twice.next_review_at(), None);
        assert_eq!(twice.learning().times_answered_correctly, 2);
    }

    #[test]
    fn correct_answer_on_mastered_question_stays_terminal() {
        let engine = TransitionEngine::default();
        let mastered = build_question().with_learning(LearningRecord {
            status: LearningStatus::Mastered,
            srs_level: SrsLevel::Mastered,
            ..LearningRecord::default()
        });

        let next = engine.apply_answer(&mastered, &OptionId::new("a"), &[], fixed_now());

        assert_eq!(next.srs_level(), SrsLevel::Mastered);
        assert!(next.srs_level() >= mastered.srs_level());
        assert_eq!(next.next_review_at(), None);
    }

    #[test]
    fn wrong_answer_resets_level_and_schedules_retry() {
        let engine = TransitionEngine::default();
        let now = fixed_now();
        let learning = engine.apply_answer(&build_question(), &OptionId::new("a"), &[], now);

        let lapsed = engine.apply_answer(&learning, &OptionId::new("b"), &displayed(), now);

        assert_eq!(lapsed.srs_level(), SrsLevel::New);
        assert_eq!(lapsed.status(), LearningStatus::Attempted);
        assert_eq!(lapsed.next_review_at(), Some(now + Duration::seconds(30)));
        assert_eq!(lapsed.learning().times_answered_incorrectly, 1);
        assert_eq!(lapsed.learning().times_answered_correctly, 1);
        assert_eq!(
            lapsed.learning().history_of_incorrect_selections,
            vec![OptionId::new("b")]
        );
    }

    #[test]
    fn wrong_answer_from_any_level_drops_to_zero() {
        let engine = TransitionEngine::default();
        for level in [SrsLevel::New, SrsLevel::Learning, SrsLevel::Mastered] {
            let question = build_question().with_learning(LearningRecord {
                srs_level: level,
                ..LearningRecord::default()
            });
            let next = engine.apply_answer(&question, &OptionId::new("d"), &[], fixed_now());
            assert_eq!(next.srs_level(), SrsLevel::New);
        }
    }

    #[test]
    fn shown_incorrect_options_accumulate_without_duplicates() {
        let engine = TransitionEngine::default();
        let now = fixed_now();
        let first = engine.apply_answer(
            &build_question(),
            &OptionId::new("b"),
            &[OptionId::new("a"), OptionId::new("b")],
            now,
        );
        assert_eq!(
            first.learning().shown_incorrect_option_ids,
            vec![OptionId::new("b")]
        );

        let second = engine.apply_answer(&first, &OptionId::new("d"), &displayed(), now);
        assert_eq!(
            second.learning().shown_incorrect_option_ids,
            vec![OptionId::new("b"), OptionId::new("d")]
        );
        assert_eq!(
            second.learning().history_of_incorrect_selections,
            vec![OptionId::new("b"), OptionId::new("d")]
        );
    }

    #[test]
    fn custom_settings_change_intervals() {
        let settings = SrsSettings::new(120, 5, 60, 3).unwrap();
        let engine = TransitionEngine::new(settings);
        let now = fixed_now();

        let right = engine.apply_answer(&build_question(), &OptionId::new("a"), &[], now);
        assert_eq!(right.next_review_at(), Some(now + Duration::minutes(2)));

        let wrong = engine.apply_answer(&build_question(), &OptionId::new("b"), &[], now);
        assert_eq!(wrong.next_review_at(), Some(now + Duration::seconds(5)));
    }

    #[test]
    fn input_question_is_left_untouched() {
        let engine = TransitionEngine::default();
        let original = build_question();
        let _ = engine.apply_answer(&original, &OptionId::new("b"), &displayed(), fixed_now());
        assert_eq!(original.learning(), &LearningRecord::default());
    }
}
