//! HTTP and WebSocket surface of the panel.

mod api;
mod error;
mod handlers;
mod panel;
mod state;

pub use api::{
    CommandResponse, EngineResponse, ErrorResponse, LogAction, LogsQuery, LogsResponse,
    SettingsResponse, SettingsUpdate, StreamQuery, VersionResponse,
};
pub use error::{ApiError, ServerError};
pub use panel::PanelServer;
pub use state::AppState;
