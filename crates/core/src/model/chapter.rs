use serde::{Deserialize, Serialize};

use crate::model::ids::{ChapterId, QuestionId};
use crate::model::question::{LearningStatus, Question};

//
// ─── CHAPTER STATS ─────────────────────────────────────────────────────────────
//

/// Cached chapter counters.
///
/// Derived data: always produced by `ChapterStats::from_questions`, never edited
/// field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterStats {
    pub total_questions: usize,
    /// Questions whose status is anything but `not_attempted`.
    pub answered_questions: usize,
    /// Questions currently `passed_once` or `mastered`.
    pub correct_answers: usize,
    pub is_completed: bool,
}

impl ChapterStats {
    #[must_use]
    pub fn from_questions(questions: &[Question]) -> Self {
        let total_questions = questions.len();
        let answered_questions = questions
            .iter()
            .filter(|q| q.status().is_answered())
            .count();
        let correct_answers = questions
            .iter()
            .filter(|q| q.status().is_passing())
            .count();

        Self {
            total_questions,
            answered_questions,
            correct_answers,
            is_completed: answered_questions == total_questions,
        }
    }
}

//
// ─── CHAPTER ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    id: ChapterId,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    questions: Vec<Question>,
    #[serde(flatten)]
    stats: ChapterStats,
}

impl Chapter {
    #[must_use]
    pub fn new(
        id: ChapterId,
        name: impl Into<String>,
        description: impl Into<String>,
        questions: Vec<Question>,
    ) -> Self {
        let stats = ChapterStats::from_questions(&questions);
        Self {
            id,
            name: name.into(),
            description: description.into(),
            questions,
            stats,
        }
    }

    /// Recompute the cached counters from the current questions.
    ///
    /// Must run after every add, delete, edit, answer or reset.
    #[must_use]
    pub fn recalculated(mut self) -> Self {
        self.recalculate();
        self
    }

    pub(crate) fn recalculate(&mut self) {
        self.stats = ChapterStats::from_questions(&self.questions);
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn questions_mut(&mut self) -> &mut Vec<Question> {
        &mut self.questions
    }

    pub(crate) fn question_mut(&mut self, id: &QuestionId) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id() == id)
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &ChapterId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn position_of(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id() == id)
    }

    #[must_use]
    pub fn stats(&self) -> ChapterStats {
        self.stats
    }

    /// Number of questions not yet mastered.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| q.status() != LearningStatus::Mastered)
            .count()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::OptionId;
    use crate::model::question::{LearningRecord, QuestionOption, SrsLevel};

    fn question(id: &str, status: LearningStatus) -> Question {
        let srs_level = match status {
            LearningStatus::PassedOnce => SrsLevel::Learning,
            LearningStatus::Mastered => SrsLevel::Mastered,
            _ => SrsLevel::New,
        };
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            vec![QuestionOption::new("a", "A"), QuestionOption::new("b", "B")],
            vec![OptionId::new("a")],
            "",
        )
        .with_learning(LearningRecord {
            status,
            srs_level,
            ..LearningRecord::default()
        })
    }

    #[test]
    fn stats_count_answered_and_correct() {
        let chapter = Chapter::new(
            ChapterId::new("c1"),
            "Basics",
            "",
            vec![
                question("q1", LearningStatus::NotAttempted),
                question("q2", LearningStatus::Attempted),
                question("q3", LearningStatus::PassedOnce),
                question("q4", LearningStatus::Mastered),
            ],
        );

        let stats = chapter.stats();
        assert_eq!(stats.total_questions, 4);
        assert_eq!(stats.answered_questions, 3);
        assert_eq!(stats.correct_answers, 2);
        assert!(!stats.is_completed);
        assert_eq!(chapter.remaining(), 3);
    }

    #[test]
    fn chapter_completes_once_every_question_was_answered() {
        let chapter = Chapter::new(
            ChapterId::new("c1"),
            "Basics",
            "",
            vec![
                question("q1", LearningStatus::Attempted),
                question("q2", LearningStatus::Mastered),
            ],
        );
        assert!(chapter.stats().is_completed);
        assert_eq!(chapter.stats().correct_answers, 1);
    }

    #[test]
    fn recalculated_replaces_stale_counters() {
        let mut chapter = Chapter::new(
            ChapterId::new("c1"),
            "Basics",
            "",
            vec![question("q1", LearningStatus::NotAttempted)],
        );
        chapter
            .questions_mut()
            .push(question("q2", LearningStatus::PassedOnce));
        assert_eq!(chapter.stats().total_questions, 1);

        let chapter = chapter.recalculated();
        assert_eq!(chapter.stats().total_questions, 2);
        assert_eq!(chapter.stats().correct_answers, 1);
    }

    #[test]
    fn lookups_by_id_and_position() {
        let chapter = Chapter::new(
            ChapterId::new("c1"),
            "Basics",
            "",
            vec![
                question("q1", LearningStatus::NotAttempted),
                question("q2", LearningStatus::NotAttempted),
            ],
        );
        assert_eq!(chapter.position_of(&QuestionId::new("q2")), Some(1));
        assert_eq!(chapter.question_at(0).unwrap().id(), &QuestionId::new("q1"));
        assert!(chapter.question(&QuestionId::new("missing")).is_none());
    }

    #[test]
    fn stats_are_flattened_into_chapter_json() {
        let chapter = Chapter::new(
            ChapterId::new("c1"),
            "Basics",
            "",
            vec![question("q1", LearningStatus::Attempted)],
        );
        let value = serde_json::to_value(&chapter).unwrap();
        assert_eq!(value["totalQuestions"], 1);
        assert_eq!(value["answeredQuestions"], 1);
        assert_eq!(value["correctAnswers"], 0);
        assert_eq!(value["isCompleted"], true);
    }
}
