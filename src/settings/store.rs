//! Process-wide settings store.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};

use super::{SettingsError, DEFAULT_TIMEZONE_OFFSET, MAX_TIMEZONE_OFFSET, MIN_TIMEZONE_OFFSET};

/// User-adjustable panel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Hours added to log timestamps before display.
    #[serde(
        rename = "timezoneOffset",
        alias = "timezone",
        alias = "timezone_offset"
    )]
    pub timezone_offset: i32,
}

impl AppSettings {
    /// Check that every field is within its accepted range.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidTimezone` for an out-of-range offset.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if (MIN_TIMEZONE_OFFSET..=MAX_TIMEZONE_OFFSET).contains(&self.timezone_offset) {
            Ok(())
        } else {
            Err(SettingsError::InvalidTimezone(self.timezone_offset))
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timezone_offset: DEFAULT_TIMEZONE_OFFSET,
        }
    }
}

/// Settings singleton guarded by a reader/writer lock.
///
/// Log rendering reads the timezone offset on every operation, while writes
/// only happen from the settings endpoint, so reads share the lock.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<AppSettings>,
    write_gate: tokio::sync::Mutex<()>,
}

impl SettingsStore {
    /// Create a store holding `settings`, persisted to `path` on update.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, settings: AppSettings) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(settings),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Load settings from `path`, falling back to defaults.
    ///
    /// A missing file is created with default values; an unreadable or
    /// invalid file is reported and replaced by defaults in memory.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match Self::read_file(&path) {
            Ok(Some(settings)) => {
                tracing::info!(
                    path = %path.display(),
                    timezone_offset = settings.timezone_offset,
                    "Loaded panel settings"
                );
                settings
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "Settings file not found, creating defaults");
                let defaults = AppSettings::default();
                if let Err(e) = write_settings_sync(&path, &defaults) {
                    tracing::warn!(error = %e, "Failed to create settings file");
                }
                defaults
            }
            Err(e) => {
                tracing::warn!(error = %e, "Using default settings");
                AppSettings::default()
            }
        };
        Self::new(path, settings)
    }

    fn read_file(path: &Path) -> Result<Option<AppSettings>, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SettingsError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let settings: AppSettings =
            serde_json::from_str(&content).map_err(|e| SettingsError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        settings.validate()?;
        Ok(Some(settings))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn current(&self) -> AppSettings {
        *self.read()
    }

    /// Current timezone offset in hours.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn timezone_offset(&self) -> i32 {
        self.read().timezone_offset
    }

    /// Validate, persist and apply a new timezone offset.
    ///
    /// The in-memory value only changes once the file was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is out of range or the file cannot be
    /// written.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub async fn set_timezone_offset(&self, offset: i32) -> Result<AppSettings, SettingsError> {
        let _gate = self.write_gate.lock().await;

        let updated = AppSettings {
            timezone_offset: offset,
        };
        updated.validate()?;
        self.persist(&updated).await?;

        *self.current.write().expect("RwLock poisoned") = updated;
        tracing::info!(timezone_offset = offset, "Saved timezone offset");
        Ok(updated)
    }

    async fn persist(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let data = serde_json::to_string(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        let write_error = |source| SettingsError::WriteError {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
            }
        }
        tokio::fs::write(&tmp, data).await.map_err(write_error)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_error)
    }

    fn read(&self) -> RwLockReadGuard<'_, AppSettings> {
        self.current.read().expect("RwLock poisoned")
    }
}

fn write_settings_sync(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    let data = serde_json::to_string(settings)?;
    let write_error = |source| SettingsError::WriteError {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
    }
    std::fs::write(path, data).map_err(write_error)
}
