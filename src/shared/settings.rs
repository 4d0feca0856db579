use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::shared::error::{AppError, AppResult};

/// Notes data file, relative to the user's config directory.
pub const DATA_FILE_NAME: &str = "indicator-stickynotes";
/// Development data file, relative to the home directory.
pub const DEV_DATA_FILE_NAME: &str = ".stickynotes";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Overrides the notes data file location.
    pub data_file: Option<PathBuf>,
    pub timing: ReconcileTiming,
}

/// Delays driving window reconciliation and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileTiming {
    /// Wait after showing a window before matching and placing it.
    pub show_match_delay_ms: u64,
    /// Further handle assignment attempts after a show, each measured from the show.
    pub handle_retry_delays_ms: Vec<u64>,
    /// Wait after restoring all notes at startup before a batch assignment pass.
    pub startup_assign_delay_ms: u64,
    /// Quiet period before a geometry change is written to disk.
    pub save_debounce_ms: u64,
}

impl Default for ReconcileTiming {
    fn default() -> Self {
        Self {
            show_match_delay_ms: 300,
            handle_retry_delays_ms: vec![500, 1500],
            startup_assign_delay_ms: 1000,
            save_debounce_ms: 500,
        }
    }
}

impl ReconcileTiming {
    pub fn show_match_delay(&self) -> Duration {
        Duration::from_millis(self.show_match_delay_ms)
    }

    pub fn handle_retry_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.handle_retry_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
    }

    pub fn startup_assign_delay(&self) -> Duration {
        Duration::from_millis(self.startup_assign_delay_ms)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

impl AppSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        ProjectDirs::from("org", "stickynotes", "indicator-stickynotes")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or_else(|| AppError::Config("Failed to determine config directory".to_string()))
    }

    /// Load settings from the default location, falling back to defaults
    /// when the file does not exist.
    pub async fn load() -> AppResult<Self> {
        let path = Self::get_settings_path()?;
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> AppResult<Self> {
        if !fs::try_exists(path).await? {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Resolve the notes data file: explicit override first, then the dev or
    /// regular default.
    pub fn data_file_path(&self, dev: bool) -> AppResult<PathBuf> {
        if let Some(path) = &self.data_file {
            return Ok(path.clone());
        }

        let dirs = BaseDirs::new()
            .ok_or_else(|| AppError::Config("Failed to determine home directory".to_string()))?;

        if dev {
            Ok(dirs.home_dir().join(DEV_DATA_FILE_NAME))
        } else {
            Ok(dirs.config_dir().join(DATA_FILE_NAME))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = AppSettings::load_from(&dir.path().join("settings.json"))
            .await
            .unwrap();

        assert_eq!(settings.timing, ReconcileTiming::default());
        assert!(settings.data_file.is_none());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, r#"{"timing": {"save_debounce_ms": 250}}"#)
            .await
            .unwrap();

        let settings = AppSettings::load_from(&path).await.unwrap();
        assert_eq!(settings.timing.save_debounce_ms, 250);
        assert_eq!(settings.timing.show_match_delay_ms, 300);
        assert_eq!(settings.timing.handle_retry_delays_ms, vec![500, 1500]);
    }

    #[tokio::test]
    async fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, "{ nope").await.unwrap();

        let err = AppSettings::load_from(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_data_file_override_wins() {
        let settings = AppSettings {
            data_file: Some(PathBuf::from("/tmp/notes.json")),
            ..Default::default()
        };
        assert_eq!(
            settings.data_file_path(true).unwrap(),
            PathBuf::from("/tmp/notes.json")
        );
    }
}
