use chrono::{DateTime, Utc};

use crate::model::{ChapterId, Module, Question, SrsLevel, SrsSettings};

//
// ─── DUE-NESS ──────────────────────────────────────────────────────────────────
//

/// True when a question should be reviewed at `now`.
///
/// A level-0 question without a due time is always due; any question with a due
/// time is due once that time has passed.
#[must_use]
pub fn is_due(question: &Question, now: DateTime<Utc>) -> bool {
    match question.next_review_at() {
        None => question.srs_level() == SrsLevel::New,
        Some(at) => at <= now,
    }
}

//
// ─── COUNTS ────────────────────────────────────────────────────────────────────
//

/// Progress counters shown while a review session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SrsProgressCounts {
    /// Level-0 questions that are due now.
    pub new_or_lapsing_due: usize,
    /// Level-1 questions, due or not: the learning pipeline.
    pub learning_review_due: usize,
    pub total_non_mastered: usize,
}

//
// ─── CANDIDATES ────────────────────────────────────────────────────────────────
//

/// A question eligible for review, with the fields it is ranked by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewCandidate<'a> {
    pub chapter_id: &'a ChapterId,
    pub question: &'a Question,
    pub priority: SrsLevel,
    /// `None` ranks ahead of every timestamp.
    pub due_time: Option<DateTime<Utc>>,
    pub is_recent_failure: bool,
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Pull-based SRS scheduler.
///
/// Nothing is cached: every query scans the module at the given instant.
///
/// # Examples
///
/// ```
/// # use quiz_core::model::{Chapter, ChapterId, Module, OptionId, Question, QuestionId, QuestionOption};
/// # use quiz_core::scheduler::Scheduler;
/// let question = Question::new(
///     QuestionId::new("q1"),
///     "2 + 2 = ?",
///     vec![QuestionOption::new("a", "3"), QuestionOption::new("b", "4")],
///     vec![OptionId::new("b")],
///     "",
/// );
/// let module = Module::new(
///     "Math",
///     "",
///     vec![Chapter::new(ChapterId::new("c1"), "Sums", "", vec![question])],
/// );
///
/// let scheduler = Scheduler::default();
/// let now = quiz_core::time::fixed_now();
/// let (chapter_id, next) = scheduler.select_next_review_question(&module, now).unwrap();
/// assert_eq!(chapter_id.as_str(), "c1");
/// assert_eq!(next.id().as_str(), "q1");
/// assert_eq!(scheduler.review_queue_count(&module, now), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    settings: SrsSettings,
}

impl Scheduler {
    #[must_use]
    pub fn new(settings: SrsSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SrsSettings {
        &self.settings
    }

    /// A lapsed question whose retry time is at most the recent-failure window
    /// away (or already past).
    #[must_use]
    pub fn is_recent_failure(&self, question: &Question, now: DateTime<Utc>) -> bool {
        question.srs_level() == SrsLevel::New
            && question
                .next_review_at()
                .is_some_and(|at| at - now <= self.settings.recent_failure_window())
    }

    /// Non-mastered questions due at `now`.
    #[must_use]
    pub fn review_queue_count(&self, module: &Module, now: DateTime<Utc>) -> usize {
        module
            .questions()
            .filter(|(_, q)| !q.is_mastered() && is_due(q, now))
            .count()
    }

    #[must_use]
    pub fn srs_progress_counts(&self, module: &Module, now: DateTime<Utc>) -> SrsProgressCounts {
        let mut counts = SrsProgressCounts::default();
        for (_, question) in module.questions().filter(|(_, q)| !q.is_mastered()) {
            counts.total_non_mastered += 1;
            match question.srs_level() {
                SrsLevel::New if is_due(question, now) => counts.new_or_lapsing_due += 1,
                SrsLevel::Learning => counts.learning_review_due += 1,
                _ => {}
            }
        }
        counts
    }

    /// Every eligible question, most urgent first.
    ///
    /// Eligible means not mastered and either due or a recent failure. Ranking:
    /// 1. when at most `sticky_queue_threshold` questions are eligible, recent
    ///    failures go first
    /// 2. lower SRS level first
    /// 3. earlier due time first, missing due time before any timestamp
    ///
    /// Ties keep module order.
    #[must_use]
    pub fn review_candidates<'a>(
        &self,
        module: &'a Module,
        now: DateTime<Utc>,
    ) -> Vec<ReviewCandidate<'a>> {
        let mut candidates: Vec<ReviewCandidate<'a>> = module
            .questions()
            .filter(|(_, q)| !q.is_mastered())
            .filter_map(|(chapter_id, question)| {
                let is_recent_failure = self.is_recent_failure(question, now);
                (is_due(question, now) || is_recent_failure).then_some(ReviewCandidate {
                    chapter_id,
                    question,
                    priority: question.srs_level(),
                    due_time: question.next_review_at(),
                    is_recent_failure,
                })
            })
            .collect();

        let sticky = candidates.len() <= self.settings.sticky_queue_threshold();
        candidates.sort_by_key(|c| (sticky && !c.is_recent_failure, c.priority, c.due_time));
        candidates
    }

    /// The single most urgent question, or `None` when nothing is eligible.
    #[must_use]
    pub fn select_next_review_question<'a>(
        &self,
        module: &'a Module,
        now: DateTime<Utc>,
    ) -> Option<(&'a ChapterId, &'a Question)> {
        self.review_candidates(module, now)
            .first()
            .map(|c| (c.chapter_id, c.question))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
