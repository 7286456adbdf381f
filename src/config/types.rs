//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::live::{SessionOptions, SocketOptions};
use crate::logs::{
    LogPaths, ReaderLimits, DEFAULT_ACCESS_LOG, DEFAULT_ERROR_LOG, DEFAULT_FILTER_MAX_BYTES,
    DEFAULT_INITIAL_SCAN_BYTES, DEFAULT_MAX_CACHED_LINES, DEFAULT_SNAPSHOT_LINES,
};
use crate::settings::DEFAULT_SETTINGS_PATH;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 1000;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default directory of the browser UI.
pub const DEFAULT_STATIC_DIR: &str = "/opt/share/www/XKeen-UI";

/// Init scripts inspected to find the active proxy engine, in order.
pub const DEFAULT_INIT_SCRIPTS: [&str; 2] = ["/opt/etc/init.d/S24xray", "/opt/etc/init.d/S99xkeen"];

/// Complete panel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub server: ServerConfig,
    pub logs: LogsConfig,
    pub settings: SettingsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory served for paths not handled by the API.
    pub static_dir: PathBuf,
    /// Whether to enable permissive CORS.
    pub cors_permissive: bool,
}

impl ServerConfig {
    /// Address in `host:port` form.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            cors_permissive: true,
        }
    }
}

/// Log access and live streaming configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub error_log: PathBuf,
    pub access_log: PathBuf,
    pub poll_interval_ms: u64,
    pub max_cached_lines: usize,
    pub snapshot_lines: usize,
    pub filter_max_bytes: usize,
    pub initial_scan_bytes: u64,
    pub max_append_bytes: u64,
    pub cache_ttl_secs: u64,
    pub janitor_interval_secs: u64,
    pub idle_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub heartbeat_secs: u64,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            access_log: PathBuf::from(DEFAULT_ACCESS_LOG),
            poll_interval_ms: 500,
            max_cached_lines: DEFAULT_MAX_CACHED_LINES,
            snapshot_lines: DEFAULT_SNAPSHOT_LINES,
            filter_max_bytes: DEFAULT_FILTER_MAX_BYTES,
            initial_scan_bytes: DEFAULT_INITIAL_SCAN_BYTES,
            max_append_bytes: 256 * 1024,
            cache_ttl_secs: 600,
            janitor_interval_secs: 300,
            idle_timeout_secs: 120,
            write_timeout_secs: 5,
            heartbeat_secs: 30,
        }
    }
}

impl LogsConfig {
    /// Locations of the two log files.
    #[must_use]
    pub fn paths(&self) -> LogPaths {
        LogPaths::new(&self.error_log, &self.access_log)
    }

    /// Result bounds for snapshot and filter reads.
    #[must_use]
    pub fn reader_limits(&self) -> ReaderLimits {
        ReaderLimits {
            snapshot_lines: self.snapshot_lines,
            filter_max_bytes: self.filter_max_bytes,
        }
    }

    /// Tuning for live sessions.
    #[must_use]
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            session: SessionOptions {
                poll_interval: Duration::from_millis(self.poll_interval_ms.max(10)),
                max_append_bytes: self.max_append_bytes,
            },
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.max(1)),
            write_timeout: Duration::from_secs(self.write_timeout_secs.max(1)),
            heartbeat: Duration::from_secs(self.heartbeat_secs.max(1)),
        }
    }

    /// How long an unused cache entry is kept.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Interval between cache eviction sweeps.
    #[must_use]
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs.max(1))
    }
}

/// Persisted user settings and engine detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// JSON file holding user settings.
    pub path: PathBuf,
    /// Init scripts inspected to detect the active engine.
    pub init_scripts: Vec<PathBuf>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            init_scripts: DEFAULT_INIT_SCRIPTS.iter().map(PathBuf::from).collect(),
        }
    }
}
