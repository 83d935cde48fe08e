//! In-memory store implementations for isolated service testing.
//!
//! Each store guards its state with a mutex and enforces the same
//! uniqueness semantics as the Postgres schema (active-name partial
//! index, unique connection ids, one transcript per session, unique
//! (session, image key) pairs), so the services observe identical
//! conflict behavior under concurrent calls.
//!
//! The chat log store supports failure injection for exercising the
//! bounded-retry and lost-race paths without a real backend.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use vc_service::errors::VcError;
use vc_service::models::{
    ChatLogRow, ChatLogUpdate, NewChatLog, NewParticipant, NewSession, NewSharedFile,
    ParticipantRow, SessionRow, SharedFileRow,
};
use vc_service::repositories::{ChatLogStore, ParticipantStore, SessionStore, SharedFileStore};

fn lock_err() -> VcError {
    VcError::Internal
}

// ============================================================================
// Sessions
// ============================================================================

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    rows: Mutex<Vec<SessionRow>>,
    next_id: AtomicI64,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row (test assertions).
    pub fn all_rows(&self) -> Vec<SessionRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Number of active rows carrying this name (invariant checks).
    pub fn active_count_for_name(&self, session_name: &str) -> usize {
        self.all_rows()
            .iter()
            .filter(|row| row.is_active && row.session_name == session_name)
            .count()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert_active(&self, new: NewSession) -> Result<SessionRow, VcError> {
        let mut rows = self.rows.lock().map_err(|_| lock_err())?;

        // Same constraints the schema enforces: unique session_id and
        // at most one active row per name.
        if rows.iter().any(|row| row.session_id == new.session_id) {
            return Err(VcError::Conflict("session id".to_string()));
        }
        if rows
            .iter()
            .any(|row| row.is_active && row.session_name == new.session_name)
        {
            return Err(VcError::Conflict(
                "active session with this name".to_string(),
            ));
        }

        let row = SessionRow {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            session_id: new.session_id,
            session_name: new.session_name,
            is_active: true,
            created_at: Utc::now(),
            ended_at: None,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<SessionRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows.iter().find(|row| row.session_id == session_id).cloned())
    }

    async fn find_active_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows
            .iter()
            .find(|row| row.session_id == session_id && row.is_active)
            .cloned())
    }

    async fn find_active_by_name(
        &self,
        session_name: &str,
    ) -> Result<Option<SessionRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows
            .iter()
            .find(|row| row.session_name == session_name && row.is_active)
            .cloned())
    }

    async fn end_session(&self, session_id: &str) -> Result<bool, VcError> {
        let mut rows = self.rows.lock().map_err(|_| lock_err())?;
        match rows
            .iter_mut()
            .find(|row| row.session_id == session_id && row.is_active)
        {
            Some(row) => {
                row.is_active = false;
                row.ended_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), VcError> {
        Ok(())
    }
}

// ============================================================================
// Participants
// ============================================================================

/// In-memory participant store.
#[derive(Default)]
pub struct MemoryParticipantStore {
    rows: Mutex<Vec<ParticipantRow>>,
    next_id: AtomicI64,
}

impl MemoryParticipantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row (test assertions).
    pub fn all_rows(&self) -> Vec<ParticipantRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// All rows of one session, oldest first (test assertions).
    pub fn rows_for_session(&self, session_id: &str) -> Vec<ParticipantRow> {
        self.all_rows()
            .into_iter()
            .filter(|row| row.session_id == session_id)
            .collect()
    }
}

#[async_trait]
impl ParticipantStore for MemoryParticipantStore {
    async fn register(&self, new: NewParticipant) -> Result<ParticipantRow, VcError> {
        let mut rows = self.rows.lock().map_err(|_| lock_err())?;

        if rows.iter().any(|row| row.connection_id == new.connection_id) {
            return Err(VcError::Conflict(
                "participant with this connection id".to_string(),
            ));
        }

        let row = ParticipantRow {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            connection_id: new.connection_id,
            token: new.token,
            username: new.username,
            session_id: new.session_id,
            is_connected: true,
            joined_at: Utc::now(),
            left_at: None,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<Option<ParticipantRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows
            .iter()
            .find(|row| row.connection_id == connection_id)
            .cloned())
    }

    async fn mark_left(&self, connection_id: &str) -> Result<u64, VcError> {
        let mut rows = self.rows.lock().map_err(|_| lock_err())?;
        match rows
            .iter_mut()
            .find(|row| row.connection_id == connection_id && row.is_connected)
        {
            Some(row) => {
                row.is_connected = false;
                row.left_at = Some(Utc::now());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_connected(&self, session_id: &str) -> Result<Vec<ParticipantRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        let mut connected: Vec<ParticipantRow> = rows
            .iter()
            .filter(|row| row.session_id == session_id && row.is_connected)
            .cloned()
            .collect();
        connected.sort_by_key(|row| (row.joined_at, row.id));
        Ok(connected)
    }

    async fn has_joined(&self, session_id: &str, username: &str) -> Result<bool, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows
            .iter()
            .any(|row| row.session_id == session_id && row.username == username))
    }
}

// ============================================================================
// Chat logs
// ============================================================================

/// In-memory chat transcript store with failure injection.
#[derive(Default)]
pub struct MemoryChatLogStore {
    rows: Mutex<Vec<ChatLogRow>>,
    next_id: AtomicI64,
    fail_writes: AtomicBool,
    conflict_once: AtomicBool,
}

impl MemoryChatLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next versioned update report a lost race (returns
    /// `false` once), as if another writer committed in between.
    pub fn inject_conflict_once(&self) {
        self.conflict_once.store(true, Ordering::SeqCst);
    }

    /// Snapshot of every stored row (test assertions).
    pub fn all_rows(&self) -> Vec<ChatLogRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatLogStore for MemoryChatLogStore {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<ChatLogRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows.iter().find(|row| row.session_id == session_id).cloned())
    }

    async fn insert(&self, new: NewChatLog) -> Result<ChatLogRow, VcError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VcError::Database("injected write failure".to_string()));
        }

        let mut rows = self.rows.lock().map_err(|_| lock_err())?;

        if rows.iter().any(|row| row.session_id == new.session_id) {
            return Err(VcError::Conflict("transcript for this session".to_string()));
        }

        let total = i32::try_from(new.chat_messages.len())
            .map_err(|_| VcError::BadRequest("too many messages".to_string()))?;
        let now = Utc::now();
        let row = ChatLogRow {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            session_id: new.session_id,
            chat_messages: new.chat_messages,
            total_messages: total,
            session_start_time: new.session_start_time,
            session_end_time: new.session_end_time,
            saved_by: new.saved_by,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update_versioned(
        &self,
        session_id: &str,
        expected_version: i64,
        update: ChatLogUpdate,
    ) -> Result<bool, VcError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VcError::Database("injected write failure".to_string()));
        }
        if self.conflict_once.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let mut rows = self.rows.lock().map_err(|_| lock_err())?;
        match rows
            .iter_mut()
            .find(|row| row.session_id == session_id && row.version == expected_version)
        {
            Some(row) => {
                let total = i32::try_from(update.chat_messages.len())
                    .map_err(|_| VcError::BadRequest("too many messages".to_string()))?;
                row.chat_messages = update.chat_messages;
                row.total_messages = total;
                row.session_end_time = update.session_end_time;
                row.saved_by = update.saved_by;
                row.version += 1;
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Shared files
// ============================================================================

/// In-memory shared file store.
#[derive(Default)]
pub struct MemorySharedFileStore {
    rows: Mutex<Vec<SharedFileRow>>,
    next_id: AtomicI64,
}

impl MemorySharedFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row (test assertions).
    pub fn all_rows(&self) -> Vec<SharedFileRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SharedFileStore for MemorySharedFileStore {
    async fn insert(&self, new: NewSharedFile) -> Result<SharedFileRow, VcError> {
        let mut rows = self.rows.lock().map_err(|_| lock_err())?;

        if rows
            .iter()
            .any(|row| row.session_id == new.session_id && row.image_key == new.image_key)
        {
            return Err(VcError::Conflict("file with this storage key".to_string()));
        }

        let row = SharedFileRow {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            session_id: new.session_id,
            image_key: new.image_key,
            file_name: new.file_name,
            file_size: new.file_size,
            content_type: new.content_type,
            uploaded_by_user_id: new.uploaded_by_user_id,
            uploaded_by_name: new.uploaded_by_name,
            uploaded_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<SharedFileRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        let mut files: Vec<SharedFileRow> = rows
            .iter()
            .filter(|row| row.session_id == session_id)
            .cloned()
            .collect();
        // Newest upload first; id breaks ties within one timestamp.
        files.sort_by(|a, b| (b.uploaded_at, b.id).cmp(&(a.uploaded_at, a.id)));
        Ok(files)
    }

    async fn exists_by_key(&self, session_id: &str, image_key: &str) -> Result<bool, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows
            .iter()
            .any(|row| row.session_id == session_id && row.image_key == image_key))
    }

    async fn find_by_key(
        &self,
        session_id: &str,
        image_key: &str,
    ) -> Result<Option<SharedFileRow>, VcError> {
        let rows = self.rows.lock().map_err(|_| lock_err())?;
        Ok(rows
            .iter()
            .find(|row| row.session_id == session_id && row.image_key == image_key)
            .cloned())
    }

    async fn delete_by_key(&self, image_key: &str) -> Result<u64, VcError> {
        let mut rows = self.rows.lock().map_err(|_| lock_err())?;
        let before = rows.len();
        rows.retain(|row| row.image_key != image_key);
        Ok((before - rows.len()) as u64)
    }
}
