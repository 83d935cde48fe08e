//! Health check and metrics handlers.

use crate::errors::VcError;
use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Pings the session store to verify connectivity and returns the
/// service status. Always answers 200 so orchestrators see the body.
#[instrument(skip_all, name = "vc.health.check")]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, VcError> {
    let db_healthy = state.sessions.ping().await.is_ok();

    let response = if db_healthy {
        HealthResponse {
            status: "healthy".to_string(),
            database: Some("healthy".to_string()),
        }
    } else {
        HealthResponse {
            status: "unhealthy".to_string(),
            database: Some("unhealthy".to_string()),
        }
    };

    Ok(Json(response))
}

/// Prometheus metrics endpoint.
///
/// Renders the recorder handle when one was installed; an empty body
/// otherwise (tests run without a global recorder).
pub async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
