//! Shared file handlers.
//!
//! - `GET    /v1/sessions/{session_id}/files` - list registered files
//! - `POST   /v1/sessions/{session_id}/files` - register a stored object
//! - `DELETE /v1/sessions/{session_id}/files/{image_key}` - delete one

use crate::errors::VcError;
use crate::models::{
    DeleteSharedFileParams, SharedFileListResponse, SharedFileResponse, SharedFileUploadRequest,
};
use crate::routes::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /v1/sessions/{session_id}/files
///
/// Lists the session's shared files, newest upload first.
#[instrument(
    skip_all,
    name = "vc.handler.files_list",
    fields(method = "GET", endpoint = "/v1/sessions/{session_id}/files")
)]
pub async fn list_shared_files(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SharedFileListResponse>, VcError> {
    let files = state.files.list(&session_id).await?;
    Ok(Json(files))
}

/// Handler for POST /v1/sessions/{session_id}/files
///
/// Registers a file whose bytes the caller has already placed in
/// external storage.
///
/// # Response
///
/// - 201 Created: Registration stored
/// - 400 Bad Request: Invalid payload
/// - 404 Not Found: Unknown or inactive session
/// - 409 Conflict: The key is already registered for this session
#[instrument(
    skip_all,
    name = "vc.handler.files_register",
    fields(method = "POST", endpoint = "/v1/sessions/{session_id}/files")
)]
pub async fn register_shared_file(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SharedFileUploadRequest>,
) -> Result<(StatusCode, Json<SharedFileResponse>), VcError> {
    let file = state.files.register(&session_id, request).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// Handler for DELETE /v1/sessions/{session_id}/files/{image_key}
///
/// Deletes a registration after its storage object was removed. Only
/// the original uploader may delete.
#[instrument(
    skip_all,
    name = "vc.handler.files_delete",
    fields(method = "DELETE", endpoint = "/v1/sessions/{session_id}/files/{image_key}")
)]
pub async fn delete_shared_file(
    State(state): State<Arc<AppState>>,
    Path((session_id, image_key)): Path<(String, String)>,
    Query(params): Query<DeleteSharedFileParams>,
) -> Result<StatusCode, VcError> {
    state
        .files
        .delete_by_key(&session_id, &image_key, &params.requested_by)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
