//! Chat transcript handlers.
//!
//! - `POST /v1/sessions/{session_id}/chat/save` - archive the transcript
//! - `GET  /v1/sessions/{session_id}/chat/history` - read it back

use crate::errors::VcError;
use crate::models::{ChatHistoryResponse, ChatHistorySaveRequest};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/sessions/{session_id}/chat/save
///
/// Saves or replaces the session transcript.
///
/// # Response
///
/// - 204 No Content: Transcript stored
/// - 400 Bad Request: Invalid payload
/// - 403 Forbidden: Saver never participated in the session
/// - 404 Not Found: Unknown session
/// - 409 Conflict: A racing writer committed first; re-read and retry
#[instrument(
    skip_all,
    name = "vc.handler.chat_save",
    fields(method = "POST", endpoint = "/v1/sessions/{session_id}/chat/save")
)]
pub async fn save_chat_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatHistorySaveRequest>,
) -> Result<StatusCode, VcError> {
    state.chat.save_or_update(&session_id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /v1/sessions/{session_id}/chat/history
///
/// Returns the archived transcript.
#[instrument(
    skip_all,
    name = "vc.handler.chat_history",
    fields(method = "GET", endpoint = "/v1/sessions/{session_id}/chat/history")
)]
pub async fn get_chat_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ChatHistoryResponse>, VcError> {
    let history = state.chat.get_history(&session_id).await?;
    Ok(Json(history))
}
