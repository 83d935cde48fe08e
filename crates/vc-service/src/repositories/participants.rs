//! Postgres participant store.
//!
//! Connection ids are provider-unique; the UNIQUE constraint turns a
//! provider anomaly into a loud failure instead of a silent overwrite.
//! The leave transition is a guarded update so repeated leaves and
//! leave/reconnect races stay idempotent.

use crate::errors::VcError;
use crate::models::{NewParticipant, ParticipantRow};
use crate::observability::metrics;
use crate::repositories::{map_insert_err, ParticipantStore};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// SQL fragment selecting all participant columns.
const PARTICIPANT_SELECT_QUERY: &str = r#"
    SELECT id, connection_id, token, username, session_id,
           is_connected, joined_at, left_at
    FROM participants
"#;

/// Participant store backed by Postgres.
#[derive(Clone)]
pub struct PgParticipantStore {
    pool: PgPool,
}

impl PgParticipantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantStore for PgParticipantStore {
    #[instrument(skip_all, name = "vc.repo.register_participant", fields(session_id = %new.session_id, username = %new.username))]
    async fn register(&self, new: NewParticipant) -> Result<ParticipantRow, VcError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO participants (connection_id, token, username, session_id, is_connected)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING id, connection_id, token, username, session_id,
                      is_connected, joined_at, left_at
            "#,
        )
        .bind(&new.connection_id)
        .bind(&new.token)
        .bind(&new.username)
        .bind(&new.session_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                metrics::record_db_query("register_participant", "success", start.elapsed());
                Ok(map_row_to_participant(&row))
            }
            Err(e) => {
                metrics::record_db_query("register_participant", "error", start.elapsed());
                Err(map_insert_err(e, "participant with this connection id"))
            }
        }
    }

    #[instrument(skip_all, name = "vc.repo.find_participant", fields(connection_id = %connection_id))]
    async fn find_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<Option<ParticipantRow>, VcError> {
        let query = format!("{} WHERE connection_id = $1", PARTICIPANT_SELECT_QUERY);

        let row = sqlx::query(&query)
            .bind(connection_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_row_to_participant))
    }

    #[instrument(skip_all, name = "vc.repo.mark_left", fields(connection_id = %connection_id))]
    async fn mark_left(&self, connection_id: &str) -> Result<u64, VcError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE participants
            SET is_connected = FALSE, left_at = NOW()
            WHERE connection_id = $1 AND is_connected
            "#,
        )
        .bind(connection_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_left", "error", start.elapsed());
            VcError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_left", "success", start.elapsed());

        Ok(result.rows_affected())
    }

    #[instrument(skip_all, name = "vc.repo.list_connected", fields(session_id = %session_id))]
    async fn list_connected(&self, session_id: &str) -> Result<Vec<ParticipantRow>, VcError> {
        let query = format!(
            "{} WHERE session_id = $1 AND is_connected ORDER BY joined_at ASC",
            PARTICIPANT_SELECT_QUERY
        );

        let rows = sqlx::query(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_row_to_participant).collect())
    }

    #[instrument(skip_all, name = "vc.repo.has_joined", fields(session_id = %session_id, username = %username))]
    async fn has_joined(&self, session_id: &str, username: &str) -> Result<bool, VcError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM participants
                WHERE session_id = $1 AND username = $2
            ) AS joined
            "#,
        )
        .bind(session_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("joined"))
    }
}

/// Map a database row to a ParticipantRow struct.
fn map_row_to_participant(row: &sqlx::postgres::PgRow) -> ParticipantRow {
    ParticipantRow {
        id: row.get("id"),
        connection_id: row.get("connection_id"),
        token: row.get("token"),
        username: row.get("username"),
        session_id: row.get("session_id"),
        is_connected: row.get("is_connected"),
        joined_at: row.get("joined_at"),
        left_at: row.get("left_at"),
    }
}
