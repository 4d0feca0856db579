//! Note persistence
//!
//! The reconciliation core only ever hands over a serialized document. The
//! JSON file store is the normal backend; the in-memory store stands in when
//! the data file location cannot be resolved.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

use crate::shared::error::{AppError, AppResult};

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// The stored document, or `None` when nothing was saved yet.
    async fn load(&self) -> AppResult<Option<String>>;

    async fn save(&self, data: &str) -> AppResult<()>;

    /// Set a corrupt document aside so a fresh one can be written.
    async fn set_aside(&self) -> AppResult<()> {
        Ok(())
    }

    /// Write the stored document to `dest`.
    async fn export_to(&self, dest: &Path) -> AppResult<()> {
        let data = self.load().await?.unwrap_or_default();
        fs::write(dest, data).await?;
        Ok(())
    }
}

/// JSON document on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }
}

#[async_trait]
impl NoteStore for JsonFileStore {
    async fn load(&self) -> AppResult<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), bytes = data.len(), "Notes saved");
        Ok(())
    }

    async fn export_to(&self, dest: &Path) -> AppResult<()> {
        fs::copy(&self.path, dest).await.map_err(|e| {
            AppError::Io(format!(
                "Failed to export {} to {}: {}",
                self.path.display(),
                dest.display(),
                e
            ))
        })?;
        Ok(())
    }

    async fn set_aside(&self) -> AppResult<()> {
        let backup = self.backup_path();
        fs::copy(&self.path, &backup).await?;
        tracing::warn!(backup = %backup.display(), "Unreadable notes file backed up");
        Ok(())
    }
}

/// In-memory fallback store; also records every save.
#[derive(Default)]
pub struct MemoryStore {
    saves: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(data: impl Into<String>) -> Self {
        Self {
            saves: Mutex::new(vec![data.into()]),
        }
    }

    pub fn saves(&self) -> Vec<String> {
        super::lock_recover(&self.saves).clone()
    }

    pub fn save_count(&self) -> usize {
        super::lock_recover(&self.saves).len()
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn load(&self) -> AppResult<Option<String>> {
        Ok(super::lock_recover(&self.saves).last().cloned())
    }

    async fn save(&self, data: &str) -> AppResult<()> {
        super::lock_recover(&self.saves).push(data.to_string());
        Ok(())
    }
}
