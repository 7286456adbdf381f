//! HTTP handlers for the panel API.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;

use super::api::{
    CommandResponse, EngineResponse, LogAction, LogsQuery, LogsResponse, SettingsResponse,
    SettingsUpdate, StreamQuery, VersionResponse,
};
use super::error::ApiError;
use super::state::AppState;
use crate::engine;
use crate::live::serve_socket;
use crate::logs::LogFile;

/// GET /api/logs - Rendered snapshot of a log, optionally filtered.
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let file = LogFile::from_selector(&query.file);
    if query.filter.is_empty() {
        let snapshot = state.reader.snapshot(file).await?;
        return Ok(Json(LogsResponse::new(&snapshot.lines, snapshot.exists)));
    }

    let lines = state.reader.read_filtered(file, &query.filter).await?;
    let exists = tokio::fs::try_exists(state.reader.path(file))
        .await
        .unwrap_or(false);
    Ok(Json(LogsResponse::new(&lines, exists)))
}

/// POST /api/logs - Log maintenance actions.
pub async fn post_logs(
    State(state): State<AppState>,
    Json(request): Json<LogAction>,
) -> Result<Json<CommandResponse>, ApiError> {
    match request.action.as_str() {
        "clear" => {
            let file = LogFile::from_selector(&request.file);
            state.reader.clear(file).await?;
            Ok(Json(CommandResponse::success("Log cleared")))
        }
        _ => Err(ApiError::BadRequest("Unknown action".to_string())),
    }
}

/// GET /api/settings - Current user settings.
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        success: true,
        timezone_offset: state.settings.timezone_offset(),
    })
}

/// POST /api/settings - Update the timezone offset.
pub async fn post_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.update_timezone(update.timezone_offset).await?;
    Ok(Json(SettingsResponse {
        success: true,
        timezone_offset: settings.timezone_offset,
    }))
}

/// GET /api/version - Panel version and platform.
pub async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse::current())
}

/// GET /api/engine - Active proxy engine and its status.
pub async fn get_engine(State(state): State<AppState>) -> Json<EngineResponse> {
    let (kind, running) = engine::active(&state.config.settings.init_scripts).await;
    let installed = engine::installed().await;
    Json(EngineResponse::new(kind, running, installed))
}

/// GET /ws - Upgrade to a live tail session.
pub async fn get_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let file = LogFile::from_selector(&query.file);
    let options = state.config.logs.socket_options();
    ws.on_upgrade(move |socket| {
        serve_socket(
            socket,
            state.reader,
            file,
            options,
            state.shutdown,
            state.open_sessions,
        )
    })
}
