use async_trait::async_trait;
use quiz_core::model::{Module, ModuleError};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    InvalidModule(#[from] ModuleError),
}

/// Repository contract for the active quiz module.
///
/// The module is stored as one document; every save replaces the previous
/// snapshot as a whole.
#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Load and normalize the stored module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if nothing is stored yet,
    /// `StorageError::InvalidModule` if the stored module fails validation,
    /// or other storage errors.
    async fn load_module(&self) -> Result<Module, StorageError>;

    /// Replace the stored module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the module cannot be stored.
    async fn save_module(&self, module: &Module) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    module: Arc<Mutex<Option<Module>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module(module: Module) -> Self {
        Self {
            module: Arc::new(Mutex::new(Some(module))),
        }
    }
}

#[async_trait]
impl ModuleRepository for InMemoryRepository {
    async fn load_module(&self) -> Result<Module, StorageError> {
        let stored = {
            let guard = self
                .module
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.clone().ok_or(StorageError::NotFound)?
        };
        Ok(stored.normalized()?)
    }

    async fn save_module(&self, module: &Module) -> Result<(), StorageError> {
        let mut guard = self
            .module
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(module.clone());
        Ok(())
    }
}

/// Bundles the module repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub modules: Arc<dyn ModuleRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            modules: Arc::new(InMemoryRepository::new()),
        }
    }

    #[must_use]
    pub fn json_file(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            modules: Arc::new(crate::json::JsonFileRepository::new(path)),
        }
    }
}
