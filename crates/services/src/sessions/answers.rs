use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quiz_core::model::{ChapterId, OptionId, QuestionId};

/// What the learner submitted for one question during the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub selected_option_id: OptionId,
    pub is_correct: bool,
    pub displayed_option_ids: Vec<OptionId>,
    pub answered_at: DateTime<Utc>,
}

/// Per-session answer records, at most one per question.
///
/// A later submission for the same question replaces the earlier record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerBook {
    records: HashMap<(ChapterId, QuestionId), AnswerRecord>,
}

impl AnswerBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, chapter_id: ChapterId, question_id: QuestionId, record: AnswerRecord) {
        self.records.insert((chapter_id, question_id), record);
    }

    #[must_use]
    pub fn get(&self, chapter_id: &ChapterId, question_id: &QuestionId) -> Option<&AnswerRecord> {
        self.records.get(&(chapter_id.clone(), question_id.clone()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Drop every record belonging to one chapter.
    pub fn clear_chapter(&mut self, chapter_id: &ChapterId) {
        self.records.retain(|(chapter, _), _| chapter != chapter_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    fn record(option: &str, is_correct: bool) -> AnswerRecord {
        AnswerRecord {
            selected_option_id: OptionId::new(option),
            is_correct,
            displayed_option_ids: vec![OptionId::new("a"), OptionId::new("b")],
            answered_at: fixed_now(),
        }
    }

    #[test]
    fn later_answer_replaces_earlier_one() {
        let mut book = AnswerBook::new();
        let chapter = ChapterId::new("c1");
        let question = QuestionId::new("q1");

        book.record(chapter.clone(), question.clone(), record("b", false));
        book.record(chapter.clone(), question.clone(), record("a", true));

        assert_eq!(book.len(), 1);
        assert!(book.get(&chapter, &question).unwrap().is_correct);
    }

    #[test]
    fn clear_chapter_keeps_other_chapters() {
        let mut book = AnswerBook::new();
        book.record(ChapterId::new("c1"), QuestionId::new("q1"), record("a", true));
        book.record(ChapterId::new("c2"), QuestionId::new("q1"), record("b", false));

        book.clear_chapter(&ChapterId::new("c1"));

        assert_eq!(book.len(), 1);
        assert!(book.get(&ChapterId::new("c1"), &QuestionId::new("q1")).is_none());
        assert!(book.get(&ChapterId::new("c2"), &QuestionId::new("q1")).is_some());
    }
}
