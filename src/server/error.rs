//! Server and HTTP API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::ErrorResponse;
use crate::logs::LogError;
use crate::settings::SettingsError;

/// Errors that stop the HTTP server.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Errors returned by API handlers.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Log(#[from] LogError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Settings(SettingsError::InvalidTimezone(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Settings(_) | Self::Log(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Rejected request");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_bind_error_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let error = ServerError::BindError {
            address: "0.0.0.0:1000".to_string(),
            source: io_error,
        };
        assert!(error.to_string().contains("Failed to bind to 0.0.0.0:1000"));
        assert!(error.to_string().contains("address in use"));
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError::BadRequest("Unknown action".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SettingsError::InvalidTimezone(20)).status(),
            StatusCode::BAD_REQUEST
        );
        let write_failure = SettingsError::WriteError {
            path: PathBuf::from("/opt/share/www/XKeen-UI/config.json"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(
            ApiError::from(write_failure).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(LogError::PermissionDenied(PathBuf::from("/x"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request_message_is_verbatim() {
        assert_eq!(
            ApiError::BadRequest("Unknown action".into()).to_string(),
            "Unknown action"
        );
    }
}
