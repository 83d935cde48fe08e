//! Videocall Controller error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse`
//! impl. Storage-level failures are translated into these domain errors
//! at the service boundary; callers never see raw storage error types.
//! Database messages returned to clients are intentionally generic;
//! actual errors are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Videocall Controller error type.
///
/// `ConcurrentModification` is the only error a caller is expected to
/// retry (after re-reading the transcript); all others are terminal for
/// that request.
#[derive(Debug, Error)]
pub enum VcError {
    /// No session matched the requested id/name (or it is inactive
    /// where an active session is required).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No participant row matched the connection id.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// A participant row already exists for this connection id.
    /// Connection ids are provider-unique, so this indicates a
    /// provider-level anomaly; fatal to the call, never retried.
    #[error("Duplicate connection: {0}")]
    DuplicateConnection(String),

    /// The (session, image key) pair is already registered.
    #[error("File already registered: {0}")]
    FileAlreadyExists(String),

    /// No shared file matched the storage key for this session.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// No archived transcript exists for this session.
    #[error("Chat history not found: {0}")]
    ChatNotFound(String),

    /// A racing writer committed the transcript first. Retryable by the
    /// caller with a freshly re-read row.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// RTC provider call failed or timed out. Never retried internally;
    /// the caller decides whether to retry the whole operation.
    #[error("RTC provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Transcript write failed after retries were exhausted.
    #[error("Chat history save failed: {0}")]
    ChatSaveFailed(String),

    /// Reconnection failed: session inactive or provider call failed.
    #[error("Auto reconnect failed: {0}")]
    AutoReconnectFailed(String),

    /// Storage-level uniqueness violation. Internal signal for the
    /// service layer; translated before reaching a caller.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal,
}

impl VcError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            VcError::SessionNotFound(_)
            | VcError::ParticipantNotFound(_)
            | VcError::FileNotFound(_)
            | VcError::ChatNotFound(_) => 404,
            VcError::DuplicateConnection(_)
            | VcError::FileAlreadyExists(_)
            | VcError::ConcurrentModification(_)
            | VcError::Conflict(_) => 409,
            VcError::ProviderUnavailable(_) | VcError::AutoReconnectFailed(_) => 503,
            VcError::BadRequest(_) => 400,
            VcError::Forbidden(_) => 403,
            VcError::ChatSaveFailed(_) | VcError::Database(_) | VcError::Internal => 500,
        }
    }

    /// Machine-readable error code for the response body.
    fn code(&self) -> &'static str {
        match self {
            VcError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            VcError::ParticipantNotFound(_) => "PARTICIPANT_NOT_FOUND",
            VcError::DuplicateConnection(_) => "DUPLICATE_CONNECTION",
            VcError::FileAlreadyExists(_) => "FILE_ALREADY_EXISTS",
            VcError::FileNotFound(_) => "FILE_NOT_FOUND",
            VcError::ChatNotFound(_) => "CHAT_NOT_FOUND",
            VcError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            VcError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            VcError::ChatSaveFailed(_) => "CHAT_SAVE_FAILED",
            VcError::AutoReconnectFailed(_) => "AUTO_RECONNECT_FAILED",
            VcError::Conflict(_) => "CONFLICT",
            VcError::Database(_) => "DATABASE_ERROR",
            VcError::BadRequest(_) => "BAD_REQUEST",
            VcError::Forbidden(_) => "FORBIDDEN",
            VcError::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for VcError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self {
            VcError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "vc.database", error = %err, "Database operation failed");
                "An internal database error occurred".to_string()
            }
            VcError::ChatSaveFailed(err) => {
                tracing::error!(target: "vc.chat", error = %err, "Chat history save failed");
                "Chat history could not be saved".to_string()
            }
            VcError::ProviderUnavailable(reason) => {
                tracing::warn!(target: "vc.provider", reason = %reason, "RTC provider unavailable");
                "RTC provider temporarily unavailable".to_string()
            }
            VcError::Internal => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to VcError
impl From<sqlx::Error> for VcError {
    fn from(err: sqlx::Error) -> Self {
        VcError::Database(err.to_string())
    }
}
