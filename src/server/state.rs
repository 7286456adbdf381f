//! Shared application state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::PanelConfig;
use crate::logs::{LogCache, LogReader};
use crate::settings::{AppSettings, SettingsError, SettingsStore};

/// State shared across all handlers and live sessions.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Panel configuration.
    pub config: Arc<PanelConfig>,
    /// User settings.
    pub settings: Arc<SettingsStore>,
    /// Cached access to the log files.
    pub reader: Arc<LogReader>,
    /// Cancelled on shutdown; live sessions use child tokens.
    pub shutdown: CancellationToken,
    /// Number of live sessions currently open.
    pub open_sessions: Arc<AtomicUsize>,
}

impl AppState {
    /// Build the state for `config` around an already loaded settings store.
    #[must_use]
    pub fn new(config: PanelConfig, settings: Arc<SettingsStore>) -> Self {
        let cache = LogCache::new(config.logs.max_cached_lines, config.logs.initial_scan_bytes);
        let reader = LogReader::new(
            config.logs.paths(),
            cache,
            Arc::clone(&settings),
            config.logs.reader_limits(),
        );
        Self {
            config: Arc::new(config),
            settings,
            reader: Arc::new(reader),
            shutdown: CancellationToken::new(),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Use an externally owned shutdown token (builder pattern).
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Persist a new timezone offset and drop every rendered line that used
    /// the old one.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is invalid or cannot be persisted; the
    /// cache is left untouched in that case.
    pub async fn update_timezone(&self, offset: i32) -> Result<AppSettings, SettingsError> {
        let updated = self.settings.set_timezone_offset(offset).await?;
        self.reader.on_settings_changed();
        Ok(updated)
    }

    /// Number of live sessions currently open.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}
