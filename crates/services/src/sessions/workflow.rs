use std::sync::Arc;

use tracing::{info, warn};

use quiz_core::model::{ChapterId, OptionId, SrsSettings};
use storage::repository::ModuleRepository;

use super::controller::SessionController;
use super::options::OptionOrder;
use super::state::Outcome;
use crate::Clock;
use crate::error::SessionError;

/// Orchestrates loading the module and persisting it after learning changes.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    settings: SrsSettings,
    modules: Arc<dyn ModuleRepository>,
    option_order: OptionOrder,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, modules: Arc<dyn ModuleRepository>) -> Self {
        Self {
            clock,
            settings: SrsSettings::default(),
            modules,
            option_order: OptionOrder::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SrsSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_shuffle_options(mut self, shuffle: bool) -> Self {
        self.option_order = OptionOrder::from_shuffle_flag(shuffle);
        self
    }

    /// Load the module and open a controller on the welcome screen.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the module cannot be loaded.
    pub async fn start(&self) -> Result<SessionController, SessionError> {
        let module = self.modules.load_module().await?;
        info!(
            module = module.name(),
            chapters = module.chapters().len(),
            questions = module.total_questions(),
            "module loaded"
        );
        Ok(SessionController::new(module, self.clock)
            .with_settings(self.settings)
            .with_option_order(self.option_order))
    }

    /// Submit the current selection and save the module when it changed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for lookup or persistence failures. A failed save
    /// keeps the in-memory answer.
    pub async fn submit_and_persist(
        &self,
        session: &mut SessionController,
        displayed: &[OptionId],
    ) -> Result<Outcome, SessionError> {
        let before = session.revision();
        let outcome = session.submit_answer(displayed)?;
        self.persist_if_changed(session, before).await?;
        Ok(outcome)
    }

    /// Reset a chapter and save the module.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for lookup or persistence failures.
    pub async fn retry_and_persist(
        &self,
        session: &mut SessionController,
        chapter_id: &ChapterId,
    ) -> Result<Outcome, SessionError> {
        let before = session.revision();
        let outcome = session.retry_chapter(chapter_id)?;
        self.persist_if_changed(session, before).await?;
        Ok(outcome)
    }

    /// Save the controller's module unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on write failure.
    pub async fn persist(&self, session: &SessionController) -> Result<(), SessionError> {
        self.modules.save_module(session.module()).await.map_err(|err| {
            warn!(error = %err, "failed to save module");
            SessionError::from(err)
        })
    }

    async fn persist_if_changed(
        &self,
        session: &SessionController,
        before: u64,
    ) -> Result<(), SessionError> {
        if session.revision() == before {
            return Ok(());
        }
        self.persist(session).await
    }
}
