//! Module documents stored as camelCase JSON files.

use async_trait::async_trait;
use quiz_core::model::Module;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::repository::{ModuleRepository, StorageError};

/// Parse and normalize a module document.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON and
/// `StorageError::InvalidModule` when the module fails validation.
pub fn parse_module(json: &str) -> Result<Module, StorageError> {
    let module: Module =
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(module.normalized()?)
}

/// Render a module as pretty-printed JSON.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if serialization fails.
pub fn render_module(module: &Module) -> Result<String, StorageError> {
    serde_json::to_string_pretty(module).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// File-backed module repository.
///
/// Saves go to a sibling temp file first and are then renamed over the target,
/// so readers never observe a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ModuleRepository for JsonFileRepository {
    async fn load_module(&self) -> Result<Module, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };
        let module = parse_module(&raw)?;
        debug!(
            path = %self.path.display(),
            chapters = module.chapters().len(),
            questions = module.total_questions(),
            "loaded module"
        );
        Ok(module)
    }

    async fn save_module(&self, module: &Module) -> Result<(), StorageError> {
        let rendered = render_module(module)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, rendered).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), "saved module");
        Ok(())
    }
}
