//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{ModuleError, SettingsError};
use storage::repository::StorageError;

/// Errors emitted by the session controller and quiz loop.
///
/// Precondition failures (no selection, already submitted, wrong mode) are not
/// errors; they surface as `Outcome::Ignored`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
