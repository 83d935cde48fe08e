//! HTTP routes for the Videocall Controller.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::repositories::SessionStore;
use crate::services::{ChatService, SharedFileService, VideoCallService};
use axum::{
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
pub struct AppState {
    /// Session orchestrator.
    pub video_call: VideoCallService,

    /// Chat transcript archive.
    pub chat: ChatService,

    /// Shared file registry.
    pub files: SharedFileService,

    /// Session store handle for health checks.
    pub sessions: Arc<dyn SessionStore>,

    /// Prometheus handle; absent when no recorder was installed (tests).
    pub metrics_handle: Option<PrometheusHandle>,
}

/// Build the application routes.
///
/// Creates an Axum router with the `/v1` API surface plus
/// `/metrics`, a TraceLayer for request logging and a 30 second
/// request timeout.
pub fn build_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        // Health and configuration
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/config", get(handlers::session_config))
        // Session orchestration
        .route("/v1/sessions/quick-join", post(handlers::quick_join))
        .route("/v1/sessions/:session_id/join", post(handlers::join_session))
        .route(
            "/v1/connections/:connection_id/leave",
            post(handlers::leave_session),
        )
        .route(
            "/v1/sessions/:session_id/refresh-token",
            post(handlers::refresh_token),
        )
        .route(
            "/v1/sessions/:session_id/auto-reconnect",
            post(handlers::auto_reconnect),
        )
        .route(
            "/v1/sessions/:session_id/status",
            get(handlers::get_session_status),
        )
        .route("/v1/sessions/:session_id/end", post(handlers::end_session))
        // Chat transcript archive
        .route(
            "/v1/sessions/:session_id/chat/save",
            post(handlers::save_chat_history),
        )
        .route(
            "/v1/sessions/:session_id/chat/history",
            get(handlers::get_chat_history),
        )
        // Shared file registry
        .route(
            "/v1/sessions/:session_id/files",
            get(handlers::list_shared_files).post(handlers::register_shared_file),
        )
        .route(
            "/v1/sessions/:session_id/files/:image_key",
            delete(handlers::delete_shared_file),
        )
        // Observability
        .route("/metrics", get(handlers::render_metrics))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
