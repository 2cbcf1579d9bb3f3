use chrono::{DateTime, Utc};

use quiz_core::model::{ChapterId, Module, ModuleError, OptionId, QuestionId};
use quiz_core::scheduler::Scheduler;
use quiz_core::transition::TransitionEngine;

use super::answers::{AnswerBook, AnswerRecord};
use super::history::{SessionHistory, SessionHistoryEntry};
use crate::error::SessionError;

//
// ─── MODES ─────────────────────────────────────────────────────────────────────
//

/// A mode in which a question is being worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveMode {
    Quiz,
    ReviewSession,
}

impl From<ActiveMode> for SessionMode {
    fn from(mode: ActiveMode) -> Self {
        match mode {
            ActiveMode::Quiz => Self::Quiz,
            ActiveMode::ReviewSession => Self::ReviewSession,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Welcome,
    Dashboard,
    /// Sequential walk through one chapter.
    Quiz,
    /// Scheduler-driven walk across the whole module.
    ReviewSession,
    /// The quiz chapter ran out of questions.
    Complete,
    /// Question overview opened on top of a running quiz or review.
    AllQuestions(ActiveMode),
}

impl SessionMode {
    /// The quiz or review this mode belongs to, including the overview on top of it.
    #[must_use]
    pub fn active(self) -> Option<ActiveMode> {
        match self {
            Self::Quiz => Some(ActiveMode::Quiz),
            Self::ReviewSession => Some(ActiveMode::ReviewSession),
            Self::AllQuestions(mode) => Some(mode),
            Self::Welcome | Self::Dashboard | Self::Complete => None,
        }
    }

    #[must_use]
    pub fn is_review(self) -> bool {
        self.active() == Some(ActiveMode::ReviewSession)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Dashboard => "dashboard",
            Self::Quiz => "quiz",
            Self::ReviewSession => "review_session",
            Self::Complete => "complete",
            Self::AllQuestions(_) => "all_questions",
        }
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// The question the learner is currently answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveQuestion {
    pub chapter_id: ChapterId,
    pub question_id: QuestionId,
    /// Position inside the chapter.
    pub index: usize,
}

/// Selection state of whatever question is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub selected: Option<OptionId>,
    pub submitted: bool,
    pub is_correct: Option<bool>,
    /// Display order of the options; empty until the question is presented.
    pub displayed: Vec<OptionId>,
}

impl Selection {
    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            selected: Some(record.selected_option_id.clone()),
            submitted: true,
            is_correct: Some(record.is_correct),
            displayed: record.displayed_option_ids.clone(),
        }
    }

    fn from_entry(entry: &SessionHistoryEntry) -> Self {
        Self {
            selected: Some(entry.selected_option_id.clone()),
            submitted: true,
            is_correct: Some(entry.is_correct),
            displayed: entry.displayed_option_ids.clone(),
        }
    }
}

/// Everything the session controller tracks besides the module itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    mode: SessionMode,
    active_chapter: Option<ChapterId>,
    live: Option<LiveQuestion>,
    selection: Selection,
    answers: AnswerBook,
    history: SessionHistory,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Chapter of the running quiz. Stays set on the completion screen.
    #[must_use]
    pub fn active_chapter(&self) -> Option<&ChapterId> {
        self.active_chapter.as_ref()
    }

    #[must_use]
    pub fn live(&self) -> Option<&LiveQuestion> {
        self.live.as_ref()
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerBook {
        &self.answers
    }

    #[must_use]
    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// True when a live question is on screen without a display order yet.
    pub(crate) fn needs_display_order(&self) -> bool {
        self.mode.active().is_some()
            && self.live.is_some()
            && !self.history.is_viewing()
            && self.selection.displayed.is_empty()
    }

    pub(crate) fn set_displayed(&mut self, displayed: Vec<OptionId>) {
        self.selection.displayed = displayed;
    }

    /// Re-resolve the live question's position after the module was edited.
    ///
    /// Returns false when the live question no longer exists.
    pub(crate) fn relocate_live(&mut self, module: &Module) -> bool {
        let Some(live) = self.live.as_mut() else {
            return true;
        };
        match module
            .chapter(&live.chapter_id)
            .and_then(|chapter| chapter.position_of(&live.question_id))
        {
            Some(index) => {
                live.index = index;
                true
            }
            None => false,
        }
    }

    fn abandon(&mut self) {
        self.active_chapter = None;
        self.live = None;
        self.selection = Selection::default();
        self.answers.clear();
        self.history.clear();
    }

    /// Put the live cursor on a quiz question, restoring any answer already
    /// given to it this session.
    fn enter_quiz_question(&mut self, chapter_id: ChapterId, index: usize, question_id: QuestionId) {
        self.selection = self
            .answers
            .get(&chapter_id, &question_id)
            .map(Selection::from_record)
            .unwrap_or_default();
        self.live = Some(LiveQuestion {
            chapter_id,
            question_id,
            index,
        });
    }

    fn enter_review_question(&mut self, live: LiveQuestion) {
        self.selection = Selection::default();
        self.live = Some(live);
    }
}

//
// ─── EVENTS & OUTCOMES ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Leave whatever is running and show the dashboard.
    ShowDashboard,
    StartQuiz(ChapterId),
    StartReviewSession,
    SelectOption(OptionId),
    /// Submit the current selection. An empty list means the stored display order.
    Submit { displayed: Vec<OptionId> },
    Advance,
    RetryChapter(ChapterId),
    NavigateTo(usize),
    ViewPrevious,
    ViewNext,
    OpenAllQuestions,
    CloseAllQuestions,
}

impl SessionEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowDashboard => "show_dashboard",
            Self::StartQuiz(_) => "start_quiz",
            Self::StartReviewSession => "start_review_session",
            Self::SelectOption(_) => "select_option",
            Self::Submit { .. } => "submit",
            Self::Advance => "advance",
            Self::RetryChapter(_) => "retry_chapter",
            Self::NavigateTo(_) => "navigate_to",
            Self::ViewPrevious => "view_previous",
            Self::ViewNext => "view_next",
            Self::OpenAllQuestions => "open_all_questions",
            Self::CloseAllQuestions => "close_all_questions",
        }
    }
}

/// Why an event was dropped without changing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    WrongMode(SessionMode),
    NoActiveQuestion,
    NoSelection,
    AlreadySubmitted,
    UnknownOption,
    ViewingHistory,
    NotViewingHistory,
    HistoryEmpty,
    HistoryBoundary,
    IndexOutOfRange,
    EmptyChapter,
    ReviewSessionActive,
}

impl Precondition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WrongMode(_) => "not available in this mode",
            Self::NoActiveQuestion => "no active question",
            Self::NoSelection => "no option selected",
            Self::AlreadySubmitted => "already submitted",
            Self::UnknownOption => "option does not belong to the question",
            Self::ViewingHistory => "viewing history",
            Self::NotViewingHistory => "not viewing history",
            Self::HistoryEmpty => "history is empty",
            Self::HistoryBoundary => "no further history entry",
            Self::IndexOutOfRange => "question index out of range",
            Self::EmptyChapter => "chapter has no questions",
            Self::ReviewSessionActive => "not allowed during a review session",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    Updated,
    Ignored(Precondition),
    Answered { is_correct: bool },
    /// A review session was requested but nothing is eligible.
    NothingDue,
    /// The review queue drained; the learner is back on the dashboard.
    ReviewFinished,
    /// The quiz moved past the last question of its chapter.
    ChapterFinished,
}

impl Outcome {
    #[must_use]
    pub fn is_ignored(self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

//
// ─── TRANSITION ────────────────────────────────────────────────────────────────
//

/// Read-only inputs to a transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub module: &'a Module,
    pub now: DateTime<Utc>,
    pub engine: &'a TransitionEngine,
    pub scheduler: &'a Scheduler,
}

/// Result of a transition: the next state, the next module when it changed,
/// and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub state: SessionState,
    pub module: Option<Module>,
    pub outcome: Outcome,
}

/// Compute the next session state for an event.
///
/// Pure: neither input is touched. An ignored event returns the input state
/// unchanged.
///
/// # Errors
///
/// Returns `SessionError::Module` when the event refers to a chapter or question
/// the module does not contain.
pub fn transition(
    state: &SessionState,
    event: SessionEvent,
    ctx: &TransitionContext<'_>,
) -> Result<Step, SessionError> {
    let mut next = state.clone();
    let (outcome, module) = match event {
        SessionEvent::ShowDashboard => {
            next.abandon();
            next.mode = SessionMode::Dashboard;
            (Outcome::Updated, None)
        }
        SessionEvent::StartQuiz(chapter_id) => (start_quiz(&mut next, ctx, chapter_id)?, None),
        SessionEvent::StartReviewSession => (start_review(&mut next, ctx)?, None),
        SessionEvent::SelectOption(option_id) => (select_option(&mut next, ctx, option_id)?, None),
        SessionEvent::Submit { displayed } => submit(&mut next, ctx, displayed)?,
        SessionEvent::Advance => (advance(&mut next, ctx)?, None),
        SessionEvent::RetryChapter(chapter_id) => retry_chapter(&mut next, ctx, chapter_id)?,
        SessionEvent::NavigateTo(index) => (navigate_to(&mut next, ctx, index)?, None),
        SessionEvent::ViewPrevious => (view_previous(&mut next), None),
        SessionEvent::ViewNext => (view_next(&mut next), None),
        SessionEvent::OpenAllQuestions => (open_all_questions(&mut next), None),
        SessionEvent::CloseAllQuestions => (close_all_questions(&mut next), None),
    };

    if outcome.is_ignored() {
        return Ok(Step {
            state: state.clone(),
            module: None,
            outcome,
        });
    }
    Ok(Step {
        state: next,
        module,
        outcome,
    })
}

fn chapter_not_found(chapter_id: &ChapterId) -> SessionError {
    ModuleError::ChapterNotFound(chapter_id.clone()).into()
}

fn pick_review(ctx: &TransitionContext<'_>) -> Option<LiveQuestion> {
    let (chapter_id, question) = ctx
        .scheduler
        .select_next_review_question(ctx.module, ctx.now)?;
    let index = ctx
        .module
        .chapter(chapter_id)
        .and_then(|c| c.position_of(question.id()))
        .unwrap_or(0);
    Some(LiveQuestion {
        chapter_id: chapter_id.clone(),
        question_id: question.id().clone(),
        index,
    })
}

fn start_quiz(
    next: &mut SessionState,
    ctx: &TransitionContext<'_>,
    chapter_id: ChapterId,
) -> Result<Outcome, SessionError> {
    let chapter = ctx
        .module
        .chapter(&chapter_id)
        .ok_or_else(|| chapter_not_found(&chapter_id))?;
    let Some(first) = chapter.question_at(0) else {
        return Ok(Outcome::Ignored(Precondition::EmptyChapter));
    };
    let first_id = first.id().clone();

    next.abandon();
    next.mode = SessionMode::Quiz;
    next.active_chapter = Some(chapter_id.clone());
    next.enter_quiz_question(chapter_id, 0, first_id);
    Ok(Outcome::Updated)
}

fn start_review(
    next: &mut SessionState,
    ctx: &TransitionContext<'_>,
) -> Result<Outcome, SessionError> {
    next.abandon();
    match pick_review(ctx) {
        Some(live) => {
            next.mode = SessionMode::ReviewSession;
            next.enter_review_question(live);
            Ok(Outcome::Updated)
        }
        None => {
            next.mode = SessionMode::Dashboard;
            Ok(Outcome::NothingDue)
        }
    }
}

/// Shared checks for events that act on the live question.
fn answerable(next: &SessionState) -> Result<&LiveQuestion, Precondition> {
    if !matches!(next.mode, SessionMode::Quiz | SessionMode::ReviewSession) {
        return Err(Precondition::WrongMode(next.mode));
    }
    let live = next.live.as_ref().ok_or(Precondition::NoActiveQuestion)?;
    if next.history.is_viewing() {
        return Err(Precondition::ViewingHistory);
    }
    if next.selection.submitted {
        return Err(Precondition::AlreadySubmitted);
    }
    Ok(live)
}

fn select_option(
    next: &mut SessionState,
    ctx: &TransitionContext<'_>,
    option_id: OptionId,
) -> Result<Outcome, SessionError> {
    let live = match answerable(next) {
        Ok(live) => live,
        Err(reason) => return Ok(Outcome::Ignored(reason)),
    };
    let question = ctx.module.question(&live.chapter_id, &live.question_id)?;
    if question.option(&option_id).is_none() {
        return Ok(Outcome::Ignored(Precondition::UnknownOption));
    }
    next.selection.selected = Some(option_id);
    Ok(Outcome::Updated)
}

fn submit(
    next: &mut SessionState,
    ctx: &TransitionContext<'_>,
    displayed: Vec<OptionId>,
) -> Result<(Outcome, Option<Module>), SessionError> {
    let live = match answerable(next) {
        Ok(live) => live.clone(),
        Err(reason) => return Ok((Outcome::Ignored(reason), None)),
    };
    let Some(selected) = next.selection.selected.clone() else {
        return Ok((Outcome::Ignored(Precondition::NoSelection), None));
    };
    let displayed = if displayed.is_empty() {
        next.selection.displayed.clone()
    } else {
        displayed
    };

    let module = ctx.module.apply_answer(
        ctx.engine,
        &live.chapter_id,
        &live.question_id,
        &selected,
        &displayed,
        ctx.now,
    )?;
    let question = module.question(&live.chapter_id, &live.question_id)?.clone();
    let is_correct = question.is_correct(&selected);

    next.answers.record(
        live.chapter_id.clone(),
        live.question_id.clone(),
        AnswerRecord {
            selected_option_id: selected.clone(),
            is_correct,
            displayed_option_ids: displayed.clone(),
            answered_at: ctx.now,
        },
    );
    if next.mode == SessionMode::Quiz {
        next.history.append(SessionHistoryEntry {
            chapter_id: live.chapter_id,
            question,
            selected_option_id: selected.clone(),
            is_correct,
            displayed_option_ids: displayed.clone(),
            is_review_session_question: false,
            attempt: 0,
        });
    }
    next.selection = Selection {
        selected: Some(selected),
        submitted: true,
        is_correct: Some(is_correct),
        displayed,
    };
    Ok((Outcome::Answered { is_correct }, Some(module)))
}

fn advance(
    next: &mut SessionState,
    ctx: &TransitionContext<'_>,
) -> Result<Outcome, SessionError> {
    match next.mode {
        SessionMode::ReviewSession => match pick_review(ctx) {
            Some(live) => {
                next.enter_review_question(live);
                Ok(Outcome::Updated)
            }
            None => {
                next.abandon();
                next.mode = SessionMode::Dashboard;
                Ok(Outcome::ReviewFinished)
            }
        },
        SessionMode::Quiz => {
            let Some(live) = next.live.clone() else {
                return Ok(Outcome::Ignored(Precondition::NoActiveQuestion));
            };
            let chapter = ctx
                .module
                .chapter(&live.chapter_id)
                .ok_or_else(|| chapter_not_found(&live.chapter_id))?;
            next.history.return_to_live();
            let index = live.index + 1;
            match chapter.question_at(index) {
                Some(question) => {
                    next.enter_quiz_question(live.chapter_id, index, question.id().clone());
                    Ok(Outcome::Updated)
                }
                None => {
                    next.mode = SessionMode::Complete;
                    next.live = None;
                    next.selection = Selection::default();
                    Ok(Outcome::ChapterFinished)
                }
            }
        }
        mode => Ok(Outcome::Ignored(Precondition::WrongMode(mode))),
    }
}

fn retry_chapter(
    next: &mut SessionState,
    ctx: &TransitionContext<'_>,
    chapter_id: ChapterId,
) -> Result<(Outcome, Option<Module>), SessionError> {
    if next.mode.is_review() {
        return Ok((Outcome::Ignored(Precondition::ReviewSessionActive), None));
    }
    let module = ctx.module.reset_chapter(&chapter_id)?;
    next.answers.clear_chapter(&chapter_id);
    next.history.clear();

    let restarts = next.active_chapter.as_ref() == Some(&chapter_id)
        && matches!(
            next.mode,
            SessionMode::Quiz | SessionMode::Complete | SessionMode::AllQuestions(ActiveMode::Quiz)
        );
    if restarts {
        let first = module
            .chapter(&chapter_id)
            .and_then(|c| c.question_at(0))
            .map(|q| q.id().clone());
        match first {
            Some(question_id) => {
                next.mode = SessionMode::Quiz;
                next.enter_quiz_question(chapter_id, 0, question_id);
            }
            None => {
                next.mode = SessionMode::Complete;
                next.live = None;
                next.selection = Selection::default();
            }
        }
    }
    Ok((Outcome::Updated, Some(module)))
}

fn navigate_to(
    next: &mut SessionState,
    ctx: &TransitionContext<'_>,
    index: usize,
) -> Result<Outcome, SessionError> {
    let Some(origin) = next.mode.active() else {
        return Ok(Outcome::Ignored(Precondition::WrongMode(next.mode)));
    };
    let Some(live) = next.live.clone() else {
        return Ok(Outcome::Ignored(Precondition::NoActiveQuestion));
    };
    let chapter = ctx
        .module
        .chapter(&live.chapter_id)
        .ok_or_else(|| chapter_not_found(&live.chapter_id))?;
    let Some(target) = chapter.question_at(index) else {
        return Ok(Outcome::Ignored(Precondition::IndexOutOfRange));
    };
    let target_id = target.id().clone();

    next.mode = origin.into();
    if let Some(position) = next.history.position_of(&live.chapter_id, &target_id) {
        if let Some(entry) = next.history.jump_to(position) {
            next.selection = Selection::from_entry(entry);
        }
        return Ok(Outcome::Updated);
    }

    next.history.return_to_live();
    match origin {
        ActiveMode::Quiz => next.enter_quiz_question(live.chapter_id, index, target_id),
        ActiveMode::ReviewSession => next.enter_review_question(LiveQuestion {
            chapter_id: live.chapter_id,
            question_id: target_id,
            index,
        }),
    }
    Ok(Outcome::Updated)
}

fn view_previous(next: &mut SessionState) -> Outcome {
    if next.mode != SessionMode::Quiz {
        return Outcome::Ignored(Precondition::WrongMode(next.mode));
    }
    let empty = next.history.is_empty();
    match next.history.view_previous() {
        Some(entry) => {
            next.selection = Selection::from_entry(entry);
            Outcome::Updated
        }
        None if empty => Outcome::Ignored(Precondition::HistoryEmpty),
        None => Outcome::Ignored(Precondition::HistoryBoundary),
    }
}

fn view_next(next: &mut SessionState) -> Outcome {
    if next.mode != SessionMode::Quiz {
        return Outcome::Ignored(Precondition::WrongMode(next.mode));
    }
    if !next.history.is_viewing() {
        return Outcome::Ignored(Precondition::NotViewingHistory);
    }
    match next.history.view_next() {
        Some(entry) => {
            next.selection = Selection::from_entry(entry);
            Outcome::Updated
        }
        None => Outcome::Ignored(Precondition::HistoryBoundary),
    }
}

fn open_all_questions(next: &mut SessionState) -> Outcome {
    match next.mode {
        SessionMode::Quiz => next.mode = SessionMode::AllQuestions(ActiveMode::Quiz),
        SessionMode::ReviewSession => {
            next.mode = SessionMode::AllQuestions(ActiveMode::ReviewSession);
        }
        mode => return Outcome::Ignored(Precondition::WrongMode(mode)),
    }
    Outcome::Updated
}

fn close_all_questions(next: &mut SessionState) -> Outcome {
    match next.mode {
        SessionMode::AllQuestions(origin) => {
            next.mode = origin.into();
            Outcome::Updated
        }
        mode => Outcome::Ignored(Precondition::WrongMode(mode)),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
