use chrono::{DateTime, Utc};
use serde::Serialize;

use quiz_core::model::{
    ChapterId, ChapterStats, LearningStatus, Module, OptionId, Question, QuestionId,
    QuestionOption,
};
use quiz_core::scheduler::Scheduler;

use super::state::Selection;

/// Presentation-agnostic snapshot of the question on screen.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - the correct answer and explanation stay hidden until submission
///
/// `options` are already in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub chapter_id: ChapterId,
    pub question_id: QuestionId,
    pub question_text: String,
    pub options: Vec<QuestionOption>,
    pub selected_option_id: Option<OptionId>,
    pub submitted: bool,
    pub is_correct: Option<bool>,
    pub correct_option_ids: Option<Vec<OptionId>>,
    pub explanation: Option<String>,
    pub status: LearningStatus,
    /// True when the learner is browsing the session history.
    pub is_history_view: bool,
    /// Zero-based position in the chapter.
    pub position: usize,
    pub total: usize,
}

impl QuestionView {
    pub(crate) fn build(
        chapter_id: &ChapterId,
        question: &Question,
        selection: &Selection,
        position: usize,
        total: usize,
        is_history_view: bool,
    ) -> Self {
        let options = if selection.displayed.is_empty() {
            question.options().to_vec()
        } else {
            selection
                .displayed
                .iter()
                .filter_map(|id| question.option(id).cloned())
                .collect()
        };
        let revealed = selection.submitted;

        Self {
            chapter_id: chapter_id.clone(),
            question_id: question.id().clone(),
            question_text: question.text().to_string(),
            options,
            selected_option_id: selection.selected.clone(),
            submitted: selection.submitted,
            is_correct: selection.is_correct,
            correct_option_ids: revealed.then(|| question.correct_option_ids().to_vec()),
            explanation: (revealed && !question.explanation().is_empty())
                .then(|| question.explanation().to_string()),
            status: question.status(),
            is_history_view,
            position,
            total,
        }
    }
}

/// One row of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    pub chapter_id: ChapterId,
    pub name: String,
    pub stats: ChapterStats,
    /// Questions not yet mastered.
    pub remaining: usize,
}

/// Module-level overview shown between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub module_name: String,
    pub chapters: Vec<ChapterSummary>,
    pub total_questions: usize,
    pub mastered_questions: usize,
    pub review_queue_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl DashboardView {
    #[must_use]
    pub fn build(module: &Module, scheduler: &Scheduler, now: DateTime<Utc>) -> Self {
        let chapters = module
            .chapters()
            .iter()
            .map(|chapter| ChapterSummary {
                chapter_id: chapter.id().clone(),
                name: chapter.name().to_string(),
                stats: chapter.stats(),
                remaining: chapter.remaining(),
            })
            .collect();

        Self {
            module_name: module.name().to_string(),
            chapters,
            total_questions: module.total_questions(),
            mastered_questions: module.mastered_questions(),
            review_queue_count: scheduler.review_queue_count(module, now),
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::Chapter;
    use quiz_core::time::fixed_now;

    fn question() -> Question {
        Question::new(
            QuestionId::new("q1"),
            "Capital of France?",
            vec![
                QuestionOption::new("a", "Paris"),
                QuestionOption::new("b", "Lyon"),
                QuestionOption::new("c", "Nice"),
            ],
            vec![OptionId::new("a")],
            "Paris has been the capital since 987.",
        )
    }

    #[test]
    fn unsubmitted_view_hides_answer() {
        let selection = Selection {
            selected: Some(OptionId::new("b")),
            displayed: vec![OptionId::new("c"), OptionId::new("a"), OptionId::new("b")],
            ..Selection::default()
        };
        let view = QuestionView::build(&ChapterId::new("c1"), &question(), &selection, 0, 1, false);

        let order: Vec<&str> = view.options.iter().map(|o| o.option_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(view.correct_option_ids, None);
        assert_eq!(view.explanation, None);
    }

    #[test]
    fn submitted_view_reveals_answer() {
        let selection = Selection {
            selected: Some(OptionId::new("b")),
            submitted: true,
            is_correct: Some(false),
            displayed: Vec::new(),
        };
        let view = QuestionView::build(&ChapterId::new("c1"), &question(), &selection, 0, 1, true);

        assert_eq!(view.options.len(), 3);
        assert_eq!(view.correct_option_ids, Some(vec![OptionId::new("a")]));
        assert!(view.explanation.is_some());
        assert!(view.is_history_view);
    }

    #[test]
    fn dashboard_counts_due_questions() {
        let module = Module::new(
            "Geo",
            "",
            vec![Chapter::new(ChapterId::new("c1"), "Europe", "", vec![question()])],
        );
        let dashboard = DashboardView::build(&module, &Scheduler::default(), fixed_now());

        assert_eq!(dashboard.module_name, "Geo");
        assert_eq!(dashboard.review_queue_count, 1);
        assert_eq!(dashboard.chapters[0].stats.total_questions, 1);
        assert_eq!(dashboard.chapters[0].remaining, 1);

        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["chapters"][0]["chapterId"], "c1");
        assert_eq!(json["reviewQueueCount"], 1);
    }
}
