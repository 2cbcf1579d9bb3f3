use chrono::Duration;
use thiserror::Error;

use crate::model::SrsLevel;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("learning interval must be > 0 seconds")]
    InvalidLearningInterval,

    #[error("retry delay must be > 0 seconds")]
    InvalidRetryDelay,

    #[error("recent failure window must be > 0 seconds")]
    InvalidRecentFailureWindow,

    #[error("sticky queue threshold must be > 0")]
    InvalidStickyQueueThreshold,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Timing knobs shared by the transition engine and the scheduler.
///
/// The defaults are the production values:
/// - a first correct answer schedules the next review 10 minutes out
/// - a wrong answer makes the question due again after 30 seconds
/// - a lapsed question due within 60 seconds counts as a recent failure
/// - queues of up to 3 eligible questions put recent failures first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrsSettings {
    learning_interval_secs: u32,
    retry_delay_secs: u32,
    recent_failure_window_secs: u32,
    sticky_queue_threshold: usize,
}

impl SrsSettings {
    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is zero.
    pub fn new(
        learning_interval_secs: u32,
        retry_delay_secs: u32,
        recent_failure_window_secs: u32,
        sticky_queue_threshold: usize,
    ) -> Result<Self, SettingsError> {
        if learning_interval_secs == 0 {
            return Err(SettingsError::InvalidLearningInterval);
        }
        if retry_delay_secs == 0 {
            return Err(SettingsError::InvalidRetryDelay);
        }
        if recent_failure_window_secs == 0 {
            return Err(SettingsError::InvalidRecentFailureWindow);
        }
        if sticky_queue_threshold == 0 {
            return Err(SettingsError::InvalidStickyQueueThreshold);
        }

        Ok(Self {
            learning_interval_secs,
            retry_delay_secs,
            recent_failure_window_secs,
            sticky_queue_threshold,
        })
    }

    #[must_use]
    pub fn learning_interval_secs(&self) -> u32 {
        self.learning_interval_secs
    }

    #[must_use]
    pub fn retry_delay_secs(&self) -> u32 {
        self.retry_delay_secs
    }

    #[must_use]
    pub fn recent_failure_window_secs(&self) -> u32 {
        self.recent_failure_window_secs
    }

    #[must_use]
    pub fn sticky_queue_threshold(&self) -> usize {
        self.sticky_queue_threshold
    }

    /// Delay before a wrongly answered question becomes due again.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::seconds(i64::from(self.retry_delay_secs))
    }

    #[must_use]
    pub fn recent_failure_window(&self) -> Duration {
        Duration::seconds(i64::from(self.recent_failure_window_secs))
    }

    /// Review interval after a correct answer promoted a question to `level`.
    ///
    /// Only `Learning` carries a delay; `New` is never reached by a promotion and
    /// `Mastered` is terminal.
    #[must_use]
    pub fn interval_for(&self, level: SrsLevel) -> Duration {
        match level {
            SrsLevel::Learning => Duration::seconds(i64::from(self.learning_interval_secs)),
            SrsLevel::New | SrsLevel::Mastered => Duration::zero(),
        }
    }
}

impl Default for SrsSettings {
    fn default() -> Self {
        Self {
            learning_interval_secs: 600,
            retry_delay_secs: 30,
            recent_failure_window_secs: 60,
            sticky_queue_threshold: 3,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
