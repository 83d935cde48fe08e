//! Postgres shared file store.
//!
//! The UNIQUE (session_id, image_key) constraint deduplicates
//! registrations; deletion cascades by storage key because the
//! underlying object is gone for every session that referenced it.

use crate::errors::VcError;
use crate::models::{NewSharedFile, SharedFileRow};
use crate::observability::metrics;
use crate::repositories::{map_insert_err, SharedFileStore};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// SQL fragment selecting all shared file columns.
const SHARED_FILE_SELECT_QUERY: &str = r#"
    SELECT id, session_id, image_key, file_name, file_size, content_type,
           uploaded_by_user_id, uploaded_by_name, uploaded_at
    FROM video_call_shared_files
"#;

/// Shared file store backed by Postgres.
#[derive(Clone)]
pub struct PgSharedFileStore {
    pool: PgPool,
}

impl PgSharedFileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SharedFileStore for PgSharedFileStore {
    #[instrument(skip_all, name = "vc.repo.insert_shared_file", fields(session_id = %new.session_id, image_key = %new.image_key))]
    async fn insert(&self, new: NewSharedFile) -> Result<SharedFileRow, VcError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO video_call_shared_files
                (session_id, image_key, file_name, file_size, content_type,
                 uploaded_by_user_id, uploaded_by_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, session_id, image_key, file_name, file_size, content_type,
                      uploaded_by_user_id, uploaded_by_name, uploaded_at
            "#,
        )
        .bind(&new.session_id)
        .bind(&new.image_key)
        .bind(&new.file_name)
        .bind(new.file_size)
        .bind(&new.content_type)
        .bind(&new.uploaded_by_user_id)
        .bind(&new.uploaded_by_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                metrics::record_db_query("insert_shared_file", "success", start.elapsed());
                Ok(map_row_to_shared_file(&row))
            }
            Err(e) => {
                metrics::record_db_query("insert_shared_file", "error", start.elapsed());
                Err(map_insert_err(e, "file with this storage key"))
            }
        }
    }

    #[instrument(skip_all, name = "vc.repo.list_shared_files", fields(session_id = %session_id))]
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<SharedFileRow>, VcError> {
        let query = format!(
            "{} WHERE session_id = $1 ORDER BY uploaded_at DESC",
            SHARED_FILE_SELECT_QUERY
        );

        let rows = sqlx::query(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_row_to_shared_file).collect())
    }

    #[instrument(skip_all, name = "vc.repo.shared_file_exists", fields(session_id = %session_id, image_key = %image_key))]
    async fn exists_by_key(&self, session_id: &str, image_key: &str) -> Result<bool, VcError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM video_call_shared_files
                WHERE session_id = $1 AND image_key = $2
            ) AS present
            "#,
        )
        .bind(session_id)
        .bind(image_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("present"))
    }

    #[instrument(skip_all, name = "vc.repo.find_shared_file", fields(session_id = %session_id, image_key = %image_key))]
    async fn find_by_key(
        &self,
        session_id: &str,
        image_key: &str,
    ) -> Result<Option<SharedFileRow>, VcError> {
        let query = format!(
            "{} WHERE session_id = $1 AND image_key = $2",
            SHARED_FILE_SELECT_QUERY
        );

        let row = sqlx::query(&query)
            .bind(session_id)
            .bind(image_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_row_to_shared_file))
    }

    #[instrument(skip_all, name = "vc.repo.delete_shared_file", fields(image_key = %image_key))]
    async fn delete_by_key(&self, image_key: &str) -> Result<u64, VcError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            DELETE FROM video_call_shared_files
            WHERE image_key = $1
            "#,
        )
        .bind(image_key)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("delete_shared_file", "error", start.elapsed());
            VcError::Database(e.to_string())
        })?;

        metrics::record_db_query("delete_shared_file", "success", start.elapsed());

        let count = result.rows_affected();
        if count > 0 {
            tracing::info!(
                target: "vc.repository.shared_files",
                image_key = %image_key,
                count = count,
                "Deleted shared file registration(s)"
            );
        }

        Ok(count)
    }
}

/// Map a database row to a SharedFileRow struct.
fn map_row_to_shared_file(row: &sqlx::postgres::PgRow) -> SharedFileRow {
    SharedFileRow {
        id: row.get("id"),
        session_id: row.get("session_id"),
        image_key: row.get("image_key"),
        file_name: row.get("file_name"),
        file_size: row.get("file_size"),
        content_type: row.get("content_type"),
        uploaded_by_user_id: row.get("uploaded_by_user_id"),
        uploaded_by_name: row.get("uploaded_by_name"),
        uploaded_at: row.get("uploaded_at"),
    }
}
