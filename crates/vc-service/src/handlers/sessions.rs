//! Session handlers.
//!
//! Implements the session orchestration endpoints:
//!
//! - `POST /v1/sessions/quick-join` - resolve-or-create + token + register
//! - `POST /v1/sessions/{session_id}/join` - join an existing session
//! - `POST /v1/connections/{connection_id}/leave` - leave transition
//! - `POST /v1/sessions/{session_id}/refresh-token` - fresh token
//! - `POST /v1/sessions/{session_id}/auto-reconnect` - reconnect protocol
//! - `GET  /v1/sessions/{session_id}/status` - read-only snapshot
//! - `POST /v1/sessions/{session_id}/end` - end the session
//! - `GET  /v1/config` - static frontend configuration

use crate::errors::VcError;
use crate::models::{
    AutoReconnectRequest, JoinBundle, JoinSessionRequest, QuickJoinRequest, RefreshTokenRequest,
    SessionConfigResponse, SessionStatusResponse,
};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/sessions/quick-join
///
/// One-call join: resolves the target session by id or name, creates it
/// when allowed, and returns a full connection bundle.
///
/// # Response
///
/// - 200 OK: Connection bundle returned
/// - 400 Bad Request: Invalid request body
/// - 404 Not Found: No active session and auto-create disabled
/// - 503 Service Unavailable: RTC provider unreachable
#[instrument(
    skip_all,
    name = "vc.handler.quick_join",
    fields(method = "POST", endpoint = "/v1/sessions/quick-join")
)]
pub async fn quick_join(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<JoinBundle>, VcError> {
    // Deserialize request body manually to return 400 (not Axum's default 422)
    let request: QuickJoinRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "vc.handlers.sessions", error = %e, "Invalid request body");
        VcError::BadRequest("Invalid request body".to_string())
    })?;

    request.validate().map_err(VcError::BadRequest)?;

    let bundle = state
        .video_call
        .quick_join(
            request.session_id.as_deref(),
            request.session_name.as_deref(),
            &request.username,
            request.auto_create_session,
        )
        .await?;

    Ok(Json(bundle))
}

/// Handler for POST /v1/sessions/{session_id}/join
///
/// Join an existing active session; never creates one.
#[instrument(
    skip_all,
    name = "vc.handler.join",
    fields(method = "POST", endpoint = "/v1/sessions/{session_id}/join")
)]
pub async fn join_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<JoinSessionRequest>,
) -> Result<Json<JoinBundle>, VcError> {
    request.validate().map_err(VcError::BadRequest)?;

    let bundle = state
        .video_call
        .join_session(&session_id, &request.username)
        .await?;

    Ok(Json(bundle))
}

/// Handler for POST /v1/connections/{connection_id}/leave
///
/// Performs the leave transition. Idempotent: repeating the call on an
/// already-left connection answers 204 again.
#[instrument(
    skip_all,
    name = "vc.handler.leave",
    fields(method = "POST", endpoint = "/v1/connections/{connection_id}/leave")
)]
pub async fn leave_session(
    State(state): State<Arc<AppState>>,
    Path(connection_id): Path<String>,
) -> Result<StatusCode, VcError> {
    state.video_call.leave_session(&connection_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /v1/sessions/{session_id}/refresh-token
///
/// Issues a fresh token for an active session as a new participant row.
#[instrument(
    skip_all,
    name = "vc.handler.refresh_token",
    fields(method = "POST", endpoint = "/v1/sessions/{session_id}/refresh-token")
)]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<JoinBundle>, VcError> {
    request.validate().map_err(VcError::BadRequest)?;

    let bundle = state
        .video_call
        .refresh_token(&session_id, &request.username)
        .await?;

    Ok(Json(bundle))
}

/// Handler for POST /v1/sessions/{session_id}/auto-reconnect
///
/// Reconnect after network loss: the previous connection (when known)
/// is marked left and a fresh bundle is returned.
#[instrument(
    skip_all,
    name = "vc.handler.auto_reconnect",
    fields(method = "POST", endpoint = "/v1/sessions/{session_id}/auto-reconnect")
)]
pub async fn auto_reconnect(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<AutoReconnectRequest>,
) -> Result<Json<JoinBundle>, VcError> {
    request.validate().map_err(VcError::BadRequest)?;

    let bundle = state
        .video_call
        .auto_reconnect(
            &session_id,
            &request.username,
            request.last_connection_id.as_deref(),
        )
        .await?;

    Ok(Json(bundle))
}

/// Handler for GET /v1/sessions/{session_id}/status
///
/// Read-only snapshot: lifecycle state and connected participants.
/// Works for ended sessions too; 404 only when no session with this id
/// ever existed.
#[instrument(
    skip_all,
    name = "vc.handler.session_status",
    fields(method = "GET", endpoint = "/v1/sessions/{session_id}/status")
)]
pub async fn get_session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, VcError> {
    let status = state.video_call.get_session_status(&session_id).await?;
    Ok(Json(status))
}

/// Handler for POST /v1/sessions/{session_id}/end
///
/// Ends the session. Idempotent on an already-ended session.
#[instrument(
    skip_all,
    name = "vc.handler.end_session",
    fields(method = "POST", endpoint = "/v1/sessions/{session_id}/end")
)]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, VcError> {
    state.video_call.end_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /v1/config
///
/// Static configuration the frontend needs to reach the RTC provider.
#[instrument(skip_all, name = "vc.handler.config", fields(method = "GET", endpoint = "/v1/config"))]
pub async fn session_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionConfigResponse>, VcError> {
    Ok(Json(state.video_call.session_config()))
}
