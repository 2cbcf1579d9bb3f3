use quiz_core::model::{ChapterId, OptionId, Question, QuestionId};

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// One submitted answer, frozen at the moment it was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistoryEntry {
    pub chapter_id: ChapterId,
    /// The question as it stood right after the answer was applied.
    pub question: Question,
    pub selected_option_id: OptionId,
    pub is_correct: bool,
    pub displayed_option_ids: Vec<OptionId>,
    pub is_review_session_question: bool,
    /// 1 for the first submission of this question in the session, then 2, 3...
    pub attempt: u32,
}

impl SessionHistoryEntry {
    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        self.question.id()
    }

    fn matches(&self, chapter_id: &ChapterId, question_id: &QuestionId) -> bool {
        &self.chapter_id == chapter_id && self.question.id() == question_id
    }
}

//
// ─── LOG ───────────────────────────────────────────────────────────────────────
//

/// Append-only log of submissions for the running quiz session, plus a cursor
/// for browsing it.
///
/// `view_index == None` means the learner is on the live question.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionHistory {
    entries: Vec<SessionHistoryEntry>,
    view_index: Option<usize>,
}

impl SessionHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a submission. The attempt number is filled in from earlier entries.
    pub fn append(&mut self, mut entry: SessionHistoryEntry) {
        let earlier = self
            .entries
            .iter()
            .filter(|e| e.matches(&entry.chapter_id, entry.question.id()))
            .count();
        entry.attempt = u32::try_from(earlier).unwrap_or(u32::MAX).saturating_add(1);
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[SessionHistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn view_index(&self) -> Option<usize> {
        self.view_index
    }

    #[must_use]
    pub fn is_viewing(&self) -> bool {
        self.view_index.is_some()
    }

    /// The entry under the cursor, if browsing.
    #[must_use]
    pub fn current(&self) -> Option<&SessionHistoryEntry> {
        self.view_index.and_then(|i| self.entries.get(i))
    }

    /// Step back one entry. From the live question this enters the log at the
    /// most recent entry.
    ///
    /// Returns `None` when the log is empty or the cursor is already at the start.
    pub fn view_previous(&mut self) -> Option<&SessionHistoryEntry> {
        let target = match self.view_index {
            None => self.entries.len().checked_sub(1)?,
            Some(0) => return None,
            Some(i) => i - 1,
        };
        self.view_index = Some(target);
        self.entries.get(target)
    }

    /// Step forward one entry.
    ///
    /// At the last entry the cursor stays put; returning to the live question is
    /// done with `return_to_live`.
    pub fn view_next(&mut self) -> Option<&SessionHistoryEntry> {
        let current = self.view_index?;
        let target = current + 1;
        if target >= self.entries.len() {
            return None;
        }
        self.view_index = Some(target);
        self.entries.get(target)
    }

    /// First entry recorded for the given question.
    #[must_use]
    pub fn position_of(&self, chapter_id: &ChapterId, question_id: &QuestionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.matches(chapter_id, question_id))
    }

    pub fn jump_to(&mut self, index: usize) -> Option<&SessionHistoryEntry> {
        let entry = self.entries.get(index)?;
        self.view_index = Some(index);
        Some(entry)
    }

    pub fn return_to_live(&mut self) {
        self.view_index = None;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.view_index = None;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionOption;

    fn entry(question: &str, selected: &str) -> SessionHistoryEntry {
        let question = Question::new(
            QuestionId::new(question),
            "Prompt",
            vec![QuestionOption::new("a", "A"), QuestionOption::new("b", "B")],
            vec![OptionId::new("a")],
            "",
        );
        let selected = OptionId::new(selected);
        SessionHistoryEntry {
            chapter_id: ChapterId::new("c1"),
            is_correct: question.is_correct(&selected),
            question,
            selected_option_id: selected,
            displayed_option_ids: vec![OptionId::new("a"), OptionId::new("b")],
            is_review_session_question: false,
            attempt: 0,
        }
    }

    fn log_of(ids: &[&str]) -> SessionHistory {
        let mut log = SessionHistory::new();
        for id in ids {
            log.append(entry(id, "a"));
        }
        log
    }

    #[test]
    fn view_previous_enters_at_most_recent_entry() {
        let mut log = log_of(&["q1", "q2", "q3"]);
        let entry = log.view_previous().unwrap();
        assert_eq!(entry.question_id().as_str(), "q3");
        assert_eq!(log.view_index(), Some(2));
    }

    #[test]
    fn view_previous_stops_at_first_entry() {
        let mut log = log_of(&["q1", "q2"]);
        log.view_previous();
        log.view_previous();
        assert_eq!(log.view_index(), Some(0));
        assert!(log.view_previous().is_none());
        assert_eq!(log.view_index(), Some(0));
    }

    #[test]
    fn view_previous_on_empty_log_is_noop() {
        let mut log = SessionHistory::new();
        assert!(log.view_previous().is_none());
        assert!(!log.is_viewing());
    }

    #[test]
    fn view_next_does_not_leave_the_log() {
        let mut log = log_of(&["q1", "q2"]);
        assert!(log.view_next().is_none());

        log.jump_to(0);
        assert_eq!(log.view_next().unwrap().question_id().as_str(), "q2");
        assert!(log.view_next().is_none());
        assert_eq!(log.view_index(), Some(1));
    }

    #[test]
    fn repeated_question_gets_increasing_attempts() {
        let mut log = SessionHistory::new();
        log.append(entry("q1", "b"));
        log.append(entry("q2", "a"));
        log.append(entry("q1", "a"));

        let attempts: Vec<u32> = log.entries().iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![1, 1, 2]);
    }

    #[test]
    fn position_of_returns_first_match() {
        let mut log = SessionHistory::new();
        log.append(entry("q1", "b"));
        log.append(entry("q1", "a"));

        let pos = log.position_of(&ChapterId::new("c1"), &QuestionId::new("q1"));
        assert_eq!(pos, Some(0));
        assert_eq!(
            log.position_of(&ChapterId::new("other"), &QuestionId::new("q1")),
            None
        );
    }

    #[test]
    fn clear_resets_cursor() {
        let mut log = log_of(&["q1"]);
        log.view_previous();
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.view_index(), None);
    }
}
