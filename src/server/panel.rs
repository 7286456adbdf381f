//! Panel HTTP server with axum router and graceful shutdown.

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use super::handlers::{
    get_engine, get_logs, get_settings, get_stream, get_version, post_logs, post_settings,
};
use super::state::AppState;
use crate::logs::spawn_janitor;

/// Panel HTTP server: JSON API, live log channel and the static UI.
pub struct PanelServer {
    /// Application state shared across handlers.
    state: AppState,
}

impl PanelServer {
    /// Create a server around `state`.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        self.state.config.server.address()
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let server = &self.state.config.server;
        let router = Router::new()
            .route("/api/logs", get(get_logs).post(post_logs))
            .route("/api/settings", get(get_settings).post(post_settings))
            .route("/api/engine", get(get_engine))
            .route("/api/version", get(get_version))
            .route("/ws", get(get_stream))
            .fallback_service(ServeDir::new(&server.static_dir))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if server.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server, binding to the configured address.
    ///
    /// The cache janitor runs alongside. Everything stops when the shutdown
    /// token is cancelled; open live sessions are closed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::BindError {
                address: addr.clone(),
                source,
            })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the server loop fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let cancel = self.state.shutdown.clone();
        let logs = &self.state.config.logs;
        let janitor = spawn_janitor(
            std::sync::Arc::clone(&self.state.reader),
            logs.janitor_interval(),
            logs.cache_ttl(),
            cancel.child_token(),
        );
        let app = self.build_router();

        tracing::info!(
            address = %listener.local_addr().map_err(ServerError::Serve)?,
            static_dir = %self.state.config.server.static_dir.display(),
            "Starting panel server"
        );

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Panel server shutting down gracefully");
            })
            .await
            .map_err(ServerError::Serve);

        janitor.abort();
        result
    }
}
