//! The two well-known proxy core log files.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default location of the core error log.
pub const DEFAULT_ERROR_LOG: &str = "/opt/var/log/xray/error.log";

/// Default location of the core access log.
pub const DEFAULT_ACCESS_LOG: &str = "/opt/var/log/xray/access.log";

/// Selector for one of the two log files the panel exposes.
///
/// Any selector other than `access.log` resolves to the error log, so
/// unknown values behave the same on every surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogFile {
    #[default]
    Error,
    Access,
}

impl LogFile {
    /// Resolve a client-supplied selector.
    #[must_use]
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim() {
            "access.log" => Self::Access,
            _ => Self::Error,
        }
    }

    /// Selector string as used by the browser UI.
    #[must_use]
    pub fn selector(self) -> &'static str {
        match self {
            Self::Error => "error.log",
            Self::Access => "access.log",
        }
    }
}

impl From<String> for LogFile {
    fn from(value: String) -> Self {
        Self::from_selector(&value)
    }
}

impl From<LogFile> for String {
    fn from(value: LogFile) -> Self {
        value.selector().to_string()
    }
}

impl fmt::Display for LogFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

/// On-disk locations of the two log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    error: PathBuf,
    access: PathBuf,
}

impl LogPaths {
    /// Create a path table from explicit locations.
    #[must_use]
    pub fn new(error: impl Into<PathBuf>, access: impl Into<PathBuf>) -> Self {
        Self {
            error: error.into(),
            access: access.into(),
        }
    }

    /// Path of the selected file.
    #[must_use]
    pub fn path(&self, file: LogFile) -> &Path {
        match file {
            LogFile::Error => &self.error,
            LogFile::Access => &self.access,
        }
    }
}

impl Default for LogPaths {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG, DEFAULT_ACCESS_LOG)
    }
}
