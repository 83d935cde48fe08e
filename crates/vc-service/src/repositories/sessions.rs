//! Postgres session store.
//!
//! The active-name uniqueness invariant lives in the schema (partial
//! unique index on `session_name WHERE is_active`), so concurrent
//! creators race on the index instead of on application reads. The
//! `end_session` transition is a guarded update that fires at most once
//! per row.

use crate::errors::VcError;
use crate::models::{NewSession, SessionRow};
use crate::observability::metrics;
use crate::repositories::{map_insert_err, SessionStore};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// SQL fragment selecting all session columns.
const SESSION_SELECT_QUERY: &str = r#"
    SELECT id, session_id, session_name, is_active, created_at, ended_at
    FROM video_sessions
"#;

/// Session store backed by Postgres.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip_all, name = "vc.repo.insert_session", fields(session_name = %new.session_name))]
    async fn insert_active(&self, new: NewSession) -> Result<SessionRow, VcError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO video_sessions (session_id, session_name, is_active)
            VALUES ($1, $2, TRUE)
            RETURNING id, session_id, session_name, is_active, created_at, ended_at
            "#,
        )
        .bind(&new.session_id)
        .bind(&new.session_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                metrics::record_db_query("insert_session", "success", start.elapsed());
                Ok(map_row_to_session(&row))
            }
            Err(e) => {
                metrics::record_db_query("insert_session", "error", start.elapsed());
                Err(map_insert_err(e, "active session with this name"))
            }
        }
    }

    #[instrument(skip_all, name = "vc.repo.find_session", fields(session_id = %session_id))]
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<SessionRow>, VcError> {
        let query = format!("{} WHERE session_id = $1", SESSION_SELECT_QUERY);

        let row = sqlx::query(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_row_to_session))
    }

    #[instrument(skip_all, name = "vc.repo.find_active_session", fields(session_id = %session_id))]
    async fn find_active_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionRow>, VcError> {
        let query = format!(
            "{} WHERE session_id = $1 AND is_active",
            SESSION_SELECT_QUERY
        );

        let row = sqlx::query(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_row_to_session))
    }

    #[instrument(skip_all, name = "vc.repo.find_active_by_name", fields(session_name = %session_name))]
    async fn find_active_by_name(
        &self,
        session_name: &str,
    ) -> Result<Option<SessionRow>, VcError> {
        let query = format!(
            "{} WHERE session_name = $1 AND is_active",
            SESSION_SELECT_QUERY
        );

        let row = sqlx::query(&query)
            .bind(session_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_row_to_session))
    }

    #[instrument(skip_all, name = "vc.repo.end_session", fields(session_id = %session_id))]
    async fn end_session(&self, session_id: &str) -> Result<bool, VcError> {
        let start = Instant::now();

        // Guarded update: ended_at is written exactly once, when
        // is_active flips. A second call matches no rows.
        let result = sqlx::query(
            r#"
            UPDATE video_sessions
            SET is_active = FALSE, ended_at = NOW()
            WHERE session_id = $1 AND is_active
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("end_session", "error", start.elapsed());
            VcError::Database(e.to_string())
        })?;

        metrics::record_db_query("end_session", "success", start.elapsed());

        let ended = result.rows_affected() > 0;
        if ended {
            tracing::info!(
                target: "vc.repository.sessions",
                session_id = %session_id,
                "Session ended"
            );
        }

        Ok(ended)
    }

    async fn ping(&self) -> Result<(), VcError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// Map a database row to a SessionRow struct.
fn map_row_to_session(row: &sqlx::postgres::PgRow) -> SessionRow {
    SessionRow {
        id: row.get("id"),
        session_id: row.get("session_id"),
        session_name: row.get("session_name"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        ended_at: row.get("ended_at"),
    }
}
