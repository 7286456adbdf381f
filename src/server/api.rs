//! Request and response types for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;

/// Query parameters for GET /api/logs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    /// `error.log` or `access.log`.
    #[serde(default)]
    pub file: String,
    /// Optional `|`-separated keywords.
    #[serde(default)]
    pub filter: String,
}

/// Query parameters for GET /ws.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub file: String,
}

/// Response for GET /api/logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub success: bool,
    /// Rendered lines joined with `\n`.
    pub data: String,
    /// Whether the log file exists.
    pub exists: bool,
}

impl LogsResponse {
    /// Create a response from rendered lines.
    #[must_use]
    pub fn new(lines: &[String], exists: bool) -> Self {
        Self {
            success: true,
            data: lines.join("\n"),
            exists,
        }
    }
}

/// Body of POST /api/logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogAction {
    pub action: String,
    #[serde(default)]
    pub file: String,
}

/// Response for command endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    /// Message describing the result.
    pub data: String,
}

impl CommandResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: data.into(),
        }
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    /// Create an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Response for GET and POST /api/settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub success: bool,
    pub timezone_offset: i32,
}

/// Body of POST /api/settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(rename = "timezoneOffset", alias = "timezone")]
    pub timezone_offset: i32,
}

/// Response for GET /api/version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub success: bool,
    pub version: String,
    pub os: String,
    pub arch: String,
}

impl VersionResponse {
    /// Version of this build on this host.
    #[must_use]
    pub fn current() -> Self {
        Self {
            success: true,
            version: format!("v{}", env!("CARGO_PKG_VERSION")),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Response for GET /api/engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    pub success: bool,
    pub engine: EngineKind,
    pub config_dir: String,
    pub config_pattern: String,
    pub is_json: bool,
    pub running: bool,
    /// Engines with an installed binary.
    pub installed: Vec<EngineKind>,
}

impl EngineResponse {
    /// Describe `engine` together with its probe results.
    #[must_use]
    pub fn new(engine: EngineKind, running: bool, installed: Vec<EngineKind>) -> Self {
        let descriptor = engine.descriptor();
        Self {
            success: true,
            engine,
            config_dir: descriptor.config_dir.to_string(),
            config_pattern: descriptor.config_pattern.to_string(),
            is_json: descriptor.is_json,
            running,
            installed,
        }
    }
}
