use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use quiz_core::model::{ChapterId, Module, OptionId, Question, SrsSettings};
use quiz_core::scheduler::{Scheduler, SrsProgressCounts};
use quiz_core::transition::TransitionEngine;

use super::options::OptionOrder;
use super::state::{
    Outcome, Precondition, SessionEvent, SessionMode, SessionState, TransitionContext, transition,
};
use super::view::{DashboardView, QuestionView};
use crate::Clock;
use crate::error::SessionError;

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Owns the module and the session state and routes every learner action
/// through `transition`.
///
/// The module is replaced wholesale on each change; a failed event leaves both
/// the module and the state as they were.
pub struct SessionController {
    module: Module,
    state: SessionState,
    clock: Clock,
    engine: TransitionEngine,
    scheduler: Scheduler,
    option_order: OptionOrder,
    revision: u64,
}

impl SessionController {
    /// Create a controller on the welcome screen with default SRS settings.
    #[must_use]
    pub fn new(module: Module, clock: Clock) -> Self {
        Self {
            module,
            state: SessionState::new(),
            clock,
            engine: TransitionEngine::default(),
            scheduler: Scheduler::default(),
            option_order: OptionOrder::default(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SrsSettings) -> Self {
        self.engine = TransitionEngine::new(settings);
        self.scheduler = Scheduler::new(settings);
        self
    }

    #[must_use]
    pub fn with_option_order(mut self, order: OptionOrder) -> Self {
        self.option_order = order;
        self
    }

    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.state.mode()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Incremented every time the module is replaced.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Swap in an edited module (chapter or question edits made outside a session).
    ///
    /// The live question keeps its place by id. The running session is
    /// abandoned when that question no longer exists.
    pub fn replace_module(&mut self, module: Module) {
        self.module = module;
        self.revision += 1;
        if self.state.relocate_live(&self.module) {
            return;
        }
        info!("live question removed by edit; returning to dashboard");
        if let Err(err) = self.dispatch(SessionEvent::ShowDashboard) {
            warn!(error = %err, "failed to leave the abandoned session");
        }
    }

    //
    // ─── DISPATCH ──────────────────────────────────────────────────────────────
    //

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Module` when the event names a chapter or question
    /// the module does not contain. Nothing changes in that case.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<Outcome, SessionError> {
        let name = event.name();
        let ctx = TransitionContext {
            module: &self.module,
            now: self.clock.now(),
            engine: &self.engine,
            scheduler: &self.scheduler,
        };
        let step = match transition(&self.state, event, &ctx) {
            Ok(step) => step,
            Err(err) => {
                warn!(event = name, error = %err, "session event aborted");
                return Err(err);
            }
        };

        if let Some(module) = step.module {
            self.module = module;
            self.revision += 1;
        }
        self.state = step.state;
        self.present_live_question();

        match step.outcome {
            Outcome::Ignored(reason) => {
                debug!(event = name, reason = reason.as_str(), "session event ignored");
            }
            Outcome::Answered { is_correct } => {
                let answered = self.live_question();
                debug!(
                    question_id = ?answered.map(|q| q.id().as_str()),
                    srs_level = ?answered.map(|q| q.srs_level().value()),
                    status = ?answered.map(|q| q.status().as_str()),
                    is_correct,
                    "answer recorded"
                );
            }
            Outcome::NothingDue => info!("no questions due for review"),
            Outcome::ReviewFinished => info!("review session finished"),
            Outcome::ChapterFinished => {
                info!(chapter_id = ?self.state.active_chapter(), "chapter finished");
            }
            Outcome::Updated => {
                debug!(event = name, mode = self.state.mode().as_str(), "session updated");
            }
        }
        Ok(step.outcome)
    }

    fn present_live_question(&mut self) {
        if !self.state.needs_display_order() {
            return;
        }
        let order = self.live_question().map(|q| self.option_order.arrange(q));
        if let Some(order) = order {
            self.state.set_displayed(order);
        }
    }

    fn live_question(&self) -> Option<&Question> {
        let live = self.state.live()?;
        self.module.question(&live.chapter_id, &live.question_id).ok()
    }

    //
    // ─── ACTIONS ───────────────────────────────────────────────────────────────
    //

    /// Leave the welcome screen, or abandon whatever is running.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn show_dashboard(&mut self) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::ShowDashboard)
    }

    /// # Errors
    ///
    /// Returns `ChapterNotFound` for an unknown chapter.
    pub fn start_quiz(&mut self, chapter_id: &ChapterId) -> Result<Outcome, SessionError> {
        info!(chapter_id = %chapter_id, "starting quiz");
        self.dispatch(SessionEvent::StartQuiz(chapter_id.clone()))
    }

    /// Start a module-wide review. Returns `Outcome::NothingDue` and lands on the
    /// dashboard when no question is eligible.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn start_review_session(&mut self) -> Result<Outcome, SessionError> {
        info!(due = self.review_queue_count(), "starting review session");
        self.dispatch(SessionEvent::StartReviewSession)
    }

    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn select_option(&mut self, option_id: &OptionId) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::SelectOption(option_id.clone()))
    }

    /// Submit the current selection with the order the options were shown in.
    /// Pass an empty slice to use the order this controller presented.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn submit_answer(&mut self, displayed: &[OptionId]) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::Submit {
            displayed: displayed.to_vec(),
        })
    }

    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn advance(&mut self) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::Advance)
    }

    /// Reset a chapter's learning state and clear this session's answers for it.
    ///
    /// # Errors
    ///
    /// Returns `ChapterNotFound` for an unknown chapter.
    pub fn retry_chapter(&mut self, chapter_id: &ChapterId) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::RetryChapter(chapter_id.clone()))
    }

    /// Retry the chapter of the running (or just completed) quiz.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn retry_active_chapter(&mut self) -> Result<Outcome, SessionError> {
        match self.state.active_chapter().cloned() {
            Some(chapter_id) => self.retry_chapter(&chapter_id),
            None => Ok(Outcome::Ignored(Precondition::NoActiveQuestion)),
        }
    }

    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn navigate_to_question(&mut self, index: usize) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::NavigateTo(index))
    }

    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn view_previous(&mut self) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::ViewPrevious)
    }

    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn view_next(&mut self) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::ViewNext)
    }

    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn open_all_questions(&mut self) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::OpenAllQuestions)
    }

    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn close_all_questions(&mut self) -> Result<Outcome, SessionError> {
        self.dispatch(SessionEvent::CloseAllQuestions)
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn review_queue_count(&self) -> usize {
        self.scheduler.review_queue_count(&self.module, self.clock.now())
    }

    #[must_use]
    pub fn srs_progress_counts(&self) -> SrsProgressCounts {
        self.scheduler.srs_progress_counts(&self.module, self.clock.now())
    }

    /// The question on screen: a history entry while browsing, otherwise the
    /// live question.
    #[must_use]
    pub fn current_view(&self) -> Option<QuestionView> {
        self.state.mode().active()?;
        let selection = self.state.selection();

        if let Some(entry) = self.state.history().current() {
            let chapter = self.module.chapter(&entry.chapter_id);
            let position = chapter
                .and_then(|c| c.position_of(entry.question_id()))
                .unwrap_or(0);
            let total = chapter.map_or(0, |c| c.questions().len());
            return Some(QuestionView::build(
                &entry.chapter_id,
                &entry.question,
                selection,
                position,
                total,
                true,
            ));
        }

        let live = self.state.live()?;
        let question = self.live_question()?;
        let total = self
            .module
            .chapter(&live.chapter_id)
            .map_or(0, |c| c.questions().len());
        Some(QuestionView::build(
            &live.chapter_id,
            question,
            selection,
            live.index,
            total,
            false,
        ))
    }

    #[must_use]
    pub fn dashboard(&self) -> DashboardView {
        DashboardView::build(&self.module, &self.scheduler, self.clock.now())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
