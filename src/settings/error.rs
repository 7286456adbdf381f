//! Settings error types.

use std::path::PathBuf;

/// Errors that can occur while validating or persisting panel settings.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    /// Timezone offset outside the supported range.
    #[error("Invalid timezone offset {0}: must be between -12 and 14")]
    InvalidTimezone(i32),

    /// Failed to read the settings file.
    #[error("Failed to read settings file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Settings file is not valid JSON.
    #[error("Failed to parse settings file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to write the settings file.
    #[error("Failed to write settings file {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to encode settings.
    #[error("Failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}
