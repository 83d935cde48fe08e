//! Storage traits and their Postgres implementations.
//!
//! Each store is a narrow trait so services can be exercised against
//! the in-memory implementations in `vc-test-utils` exactly as they run
//! against Postgres. Uniqueness violations surface as
//! [`VcError::Conflict`]; the service layer translates them into domain
//! errors (or adopts the winning row, for the quick-join creation race).
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Race decisions are pushed into schema constraints, not read-then-write

mod chat_logs;
mod participants;
mod sessions;
mod shared_files;

pub use chat_logs::PgChatLogStore;
pub use participants::PgParticipantStore;
pub use sessions::PgSessionStore;
pub use shared_files::PgSharedFileStore;

use crate::errors::VcError;
use crate::models::{
    ChatLogRow, ChatLogUpdate, NewChatLog, NewParticipant, NewSession, NewSharedFile,
    ParticipantRow, SessionRow, SharedFileRow,
};
use async_trait::async_trait;

/// Durable record of meeting rooms and their lifecycle state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session in the active state.
    ///
    /// Fails with [`VcError::Conflict`] when another active session with
    /// the same name (or the same `session_id`) already exists.
    async fn insert_active(&self, new: NewSession) -> Result<SessionRow, VcError>;

    /// Find a session by its provider room id, regardless of state.
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<SessionRow>, VcError>;

    /// Find an active session by its provider room id.
    async fn find_active_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionRow>, VcError>;

    /// Find the active session with this name, if any.
    async fn find_active_by_name(&self, session_name: &str)
        -> Result<Option<SessionRow>, VcError>;

    /// End a session: `is_active = false`, `ended_at = now`, exactly once.
    ///
    /// Returns `true` if this call performed the transition, `false` if
    /// the session was already ended (idempotent no-op).
    async fn end_session(&self, session_id: &str) -> Result<bool, VcError>;

    /// Verify store connectivity (health checks).
    async fn ping(&self) -> Result<(), VcError>;
}

/// Durable record of who has joined which room.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Insert a new participant row in the connected state.
    ///
    /// Fails with [`VcError::Conflict`] when the connection id is
    /// already present.
    async fn register(&self, new: NewParticipant) -> Result<ParticipantRow, VcError>;

    /// Find a participant row by its connection id.
    async fn find_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<Option<ParticipantRow>, VcError>;

    /// Perform the leave transition for a still-connected row.
    ///
    /// Guarded update: returns the number of rows transitioned (0 when
    /// the row was already left or does not exist). The transition is
    /// irreversible for the row.
    async fn mark_left(&self, connection_id: &str) -> Result<u64, VcError>;

    /// List currently connected participants of a session, oldest join first.
    async fn list_connected(&self, session_id: &str) -> Result<Vec<ParticipantRow>, VcError>;

    /// Whether this username ever joined the session (connected or left).
    async fn has_joined(&self, session_id: &str, username: &str) -> Result<bool, VcError>;
}

/// Durable, at-most-one-row-per-session chat transcript archive.
#[async_trait]
pub trait ChatLogStore: Send + Sync {
    /// Find the archived transcript for a session.
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<ChatLogRow>, VcError>;

    /// Insert the first transcript for a session at version 1.
    ///
    /// Fails with [`VcError::Conflict`] when a transcript already exists.
    async fn insert(&self, new: NewChatLog) -> Result<ChatLogRow, VcError>;

    /// Replace the transcript contents, guarded by the version counter.
    ///
    /// Returns `true` when the row at `expected_version` was replaced
    /// (version incremented), `false` when a racing writer got there
    /// first.
    async fn update_versioned(
        &self,
        session_id: &str,
        expected_version: i64,
        update: ChatLogUpdate,
    ) -> Result<bool, VcError>;
}

/// Durable, deduplicated catalogue of files attached to a room.
#[async_trait]
pub trait SharedFileStore: Send + Sync {
    /// Register a file.
    ///
    /// Fails with [`VcError::Conflict`] when the (session, image key)
    /// pair is already registered.
    async fn insert(&self, new: NewSharedFile) -> Result<SharedFileRow, VcError>;

    /// List files of a session, newest upload first.
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<SharedFileRow>, VcError>;

    /// Whether a file with this storage key is registered for the session.
    async fn exists_by_key(&self, session_id: &str, image_key: &str) -> Result<bool, VcError>;

    /// Find a file by storage key within a session.
    async fn find_by_key(
        &self,
        session_id: &str,
        image_key: &str,
    ) -> Result<Option<SharedFileRow>, VcError>;

    /// Delete every registration of this storage key (the underlying
    /// object was deleted). Returns the number of rows removed.
    async fn delete_by_key(&self, image_key: &str) -> Result<u64, VcError>;
}

/// Translate an insert error, mapping unique violations to `Conflict`.
pub(crate) fn map_insert_err(err: sqlx::Error, what: &str) -> VcError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => VcError::Conflict(what.to_string()),
        _ => VcError::Database(err.to_string()),
    }
}
