//! Shared file registry service.
//!
//! Callers upload bytes to object storage first and register the
//! returned key here afterwards (store-then-register), so the registry
//! never blocks the storage write path; it only guards metadata
//! duplication. Deleting cascades by storage key because the underlying
//! object is gone for every registration that referenced it.

use crate::errors::VcError;
use crate::models::{
    NewSharedFile, SessionRow, SharedFileListResponse, SharedFileResponse, SharedFileUploadRequest,
};
use crate::repositories::{SessionStore, SharedFileStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Shared file registry.
#[derive(Clone)]
pub struct SharedFileService {
    shared_files: Arc<dyn SharedFileStore>,
    sessions: Arc<dyn SessionStore>,
}

impl SharedFileService {
    pub fn new(shared_files: Arc<dyn SharedFileStore>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            shared_files,
            sessions,
        }
    }

    /// Register a file already placed in external storage.
    ///
    /// The (session, image key) pair is unique; re-registering the same
    /// key fails with `FileAlreadyExists` whether it is caught by the
    /// pre-check or by the insert racing another registration.
    #[instrument(
        skip_all,
        name = "vc.files.register",
        fields(session_id = %session_id, image_key = %request.image_key)
    )]
    pub async fn register(
        &self,
        session_id: &str,
        request: SharedFileUploadRequest,
    ) -> Result<SharedFileResponse, VcError> {
        request.validate().map_err(VcError::BadRequest)?;

        let session = self.require_active(session_id).await?;

        if self
            .shared_files
            .exists_by_key(&session.session_id, &request.image_key)
            .await?
        {
            return Err(VcError::FileAlreadyExists(request.image_key));
        }

        let result = self
            .shared_files
            .insert(NewSharedFile {
                session_id: session.session_id.clone(),
                image_key: request.image_key.clone(),
                file_name: request.file_name,
                file_size: request.file_size,
                content_type: request.content_type,
                uploaded_by_user_id: request.uploaded_by_user_id,
                uploaded_by_name: request.uploaded_by_name,
            })
            .await;

        match result {
            Ok(row) => {
                info!(
                    target: "vc.services.shared_files",
                    session_id = %session_id,
                    image_key = %row.image_key,
                    file_name = %row.file_name,
                    "Shared file registered"
                );
                Ok(SharedFileResponse::from(row))
            }
            Err(VcError::Conflict(_)) => Err(VcError::FileAlreadyExists(request.image_key)),
            Err(e) => Err(e),
        }
    }

    /// List the files of a session, newest upload first.
    #[instrument(skip_all, name = "vc.files.list", fields(session_id = %session_id))]
    pub async fn list(&self, session_id: &str) -> Result<SharedFileListResponse, VcError> {
        let session = self.require_active(session_id).await?;

        let rows = self.shared_files.list_by_session(&session.session_id).await?;

        Ok(SharedFileListResponse {
            session_id: session.session_id,
            total_count: rows.len(),
            files: rows.into_iter().map(SharedFileResponse::from).collect(),
        })
    }

    /// Delete a file registration after its storage object was deleted.
    ///
    /// Only the original uploader may delete. The deletion cascades by
    /// key across sessions.
    #[instrument(
        skip_all,
        name = "vc.files.delete",
        fields(session_id = %session_id, image_key = %image_key, requested_by = %requested_by)
    )]
    pub async fn delete_by_key(
        &self,
        session_id: &str,
        image_key: &str,
        requested_by: &str,
    ) -> Result<(), VcError> {
        let session = self.require_active(session_id).await?;

        let file = self
            .shared_files
            .find_by_key(&session.session_id, image_key)
            .await?
            .ok_or_else(|| VcError::FileNotFound(image_key.to_string()))?;

        if file.uploaded_by_user_id != requested_by {
            return Err(VcError::Forbidden(
                "only the uploader may delete a shared file".to_string(),
            ));
        }

        let count = self.shared_files.delete_by_key(image_key).await?;
        info!(
            target: "vc.services.shared_files",
            session_id = %session_id,
            image_key = %image_key,
            count = count,
            "Shared file deleted"
        );

        Ok(())
    }

    /// Registry operations are scoped to live sessions.
    async fn require_active(&self, session_id: &str) -> Result<SessionRow, VcError> {
        self.sessions
            .find_active_by_session_id(session_id)
            .await?
            .ok_or_else(|| VcError::SessionNotFound(session_id.to_string()))
    }
}
