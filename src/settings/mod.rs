//! Panel settings persisted next to the web UI.

mod error;
mod store;

pub use error::SettingsError;
pub use store::{AppSettings, SettingsStore};

/// Default settings file location.
pub const DEFAULT_SETTINGS_PATH: &str = "/opt/share/www/XKeen-UI/config.json";

/// Default timezone offset in hours.
pub const DEFAULT_TIMEZONE_OFFSET: i32 = 3;

/// Smallest accepted timezone offset in hours.
pub const MIN_TIMEZONE_OFFSET: i32 = -12;

/// Largest accepted timezone offset in hours.
pub const MAX_TIMEZONE_OFFSET: i32 = 14;
