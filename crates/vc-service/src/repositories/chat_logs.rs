//! Postgres chat transcript store.
//!
//! The UNIQUE constraint on `session_id` enforces the one-transcript
//! invariant; the `version` column implements optimistic concurrency.
//! Updates replace the whole message payload and match only the
//! expected version, so a racing writer observes zero affected rows
//! instead of silently interleaving.

use crate::errors::VcError;
use crate::models::{ChatLogRow, ChatLogUpdate, ChatMessage, NewChatLog};
use crate::observability::metrics;
use crate::repositories::{map_insert_err, ChatLogStore};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// SQL fragment selecting all transcript columns.
const CHAT_LOG_SELECT_QUERY: &str = r#"
    SELECT id, session_id, chat_messages, total_messages,
           session_start_time, session_end_time, saved_by,
           version, created_at, updated_at
    FROM session_chat_logs
"#;

/// Chat transcript store backed by Postgres.
#[derive(Clone)]
pub struct PgChatLogStore {
    pool: PgPool,
}

impl PgChatLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatLogStore for PgChatLogStore {
    #[instrument(skip_all, name = "vc.repo.find_chat_log", fields(session_id = %session_id))]
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<ChatLogRow>, VcError> {
        let query = format!("{} WHERE session_id = $1", CHAT_LOG_SELECT_QUERY);

        let row = sqlx::query(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_chat_log).transpose()
    }

    #[instrument(skip_all, name = "vc.repo.insert_chat_log", fields(session_id = %new.session_id))]
    async fn insert(&self, new: NewChatLog) -> Result<ChatLogRow, VcError> {
        let start = Instant::now();

        let messages_json = serde_json::to_value(&new.chat_messages)
            .map_err(|e| VcError::ChatSaveFailed(format!("message serialization failed: {e}")))?;
        let total = i32::try_from(new.chat_messages.len())
            .map_err(|_| VcError::BadRequest("too many messages".to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO session_chat_logs
                (session_id, chat_messages, total_messages,
                 session_start_time, session_end_time, saved_by, version)
            VALUES ($1, $2, $3, $4, $5, $6, 1)
            RETURNING id, session_id, chat_messages, total_messages,
                      session_start_time, session_end_time, saved_by,
                      version, created_at, updated_at
            "#,
        )
        .bind(&new.session_id)
        .bind(messages_json)
        .bind(total)
        .bind(new.session_start_time)
        .bind(new.session_end_time)
        .bind(&new.saved_by)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                metrics::record_db_query("insert_chat_log", "success", start.elapsed());
                map_row_to_chat_log(&row)
            }
            Err(e) => {
                metrics::record_db_query("insert_chat_log", "error", start.elapsed());
                Err(map_insert_err(e, "transcript for this session"))
            }
        }
    }

    #[instrument(
        skip_all,
        name = "vc.repo.update_chat_log",
        fields(session_id = %session_id, expected_version = expected_version)
    )]
    async fn update_versioned(
        &self,
        session_id: &str,
        expected_version: i64,
        update: ChatLogUpdate,
    ) -> Result<bool, VcError> {
        let start = Instant::now();

        let messages_json = serde_json::to_value(&update.chat_messages)
            .map_err(|e| VcError::ChatSaveFailed(format!("message serialization failed: {e}")))?;
        let total = i32::try_from(update.chat_messages.len())
            .map_err(|_| VcError::BadRequest("too many messages".to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE session_chat_logs
            SET chat_messages = $3,
                total_messages = $4,
                session_end_time = $5,
                saved_by = $6,
                version = version + 1,
                updated_at = NOW()
            WHERE session_id = $1 AND version = $2
            "#,
        )
        .bind(session_id)
        .bind(expected_version)
        .bind(messages_json)
        .bind(total)
        .bind(update.session_end_time)
        .bind(&update.saved_by)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("update_chat_log", "error", start.elapsed());
            VcError::Database(e.to_string())
        })?;

        metrics::record_db_query("update_chat_log", "success", start.elapsed());

        Ok(result.rows_affected() > 0)
    }
}

/// Map a database row to a ChatLogRow struct.
///
/// Fallible because the JSONB payload is deserialized back into typed
/// messages.
fn map_row_to_chat_log(row: &sqlx::postgres::PgRow) -> Result<ChatLogRow, VcError> {
    let messages_json: serde_json::Value = row.get("chat_messages");
    let chat_messages: Vec<ChatMessage> = serde_json::from_value(messages_json)
        .map_err(|e| VcError::Database(format!("stored transcript is malformed: {e}")))?;

    Ok(ChatLogRow {
        id: row.get("id"),
        session_id: row.get("session_id"),
        chat_messages,
        total_messages: row.get("total_messages"),
        session_start_time: row.get("session_start_time"),
        session_end_time: row.get("session_end_time"),
        saved_by: row.get("saved_by"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
