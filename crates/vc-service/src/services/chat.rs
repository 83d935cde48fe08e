//! Chat transcript archive service.
//!
//! A session has exactly one transcript row, ever. Saves are
//! read-modify-write guarded by the optimistic version counter; the two
//! expected writers (periodic autosave and the final save at session
//! end) race routinely, and exactly one of them wins each round. The
//! loser receives `ConcurrentModification` and retries with a re-read.
//! Backend write failures are retried a bounded number of times before
//! surfacing as `ChatSaveFailed`.

use crate::errors::VcError;
use crate::models::{ChatHistoryResponse, ChatHistorySaveRequest, ChatLogUpdate, NewChatLog};
use crate::observability::metrics;
use crate::repositories::{ChatLogStore, ParticipantStore, SessionStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Attempts against backend write failures before giving up.
const MAX_BACKEND_ATTEMPTS: u32 = 3;

/// Chat transcript archive.
#[derive(Clone)]
pub struct ChatService {
    chat_logs: Arc<dyn ChatLogStore>,
    sessions: Arc<dyn SessionStore>,
    participants: Arc<dyn ParticipantStore>,
}

impl ChatService {
    pub fn new(
        chat_logs: Arc<dyn ChatLogStore>,
        sessions: Arc<dyn SessionStore>,
        participants: Arc<dyn ParticipantStore>,
    ) -> Self {
        Self {
            chat_logs,
            sessions,
            participants,
        }
    }

    /// Archive the transcript for a session: insert on first save,
    /// full-replace on every later one.
    ///
    /// The saver must have been a participant of the session. Saving an
    /// identical payload again is a no-op (idempotent re-save from a
    /// retrying client).
    #[instrument(
        skip_all,
        name = "vc.chat.save",
        fields(session_id = %session_id, saved_by = %request.saved_by, message_count = request.messages.len())
    )]
    pub async fn save_or_update(
        &self,
        session_id: &str,
        request: ChatHistorySaveRequest,
    ) -> Result<(), VcError> {
        request.validate().map_err(VcError::BadRequest)?;

        // The session may already be ended (the final save usually runs
        // after end-session), but it must exist.
        self.sessions
            .find_by_session_id(session_id)
            .await?
            .ok_or_else(|| VcError::SessionNotFound(session_id.to_string()))?;

        if !self
            .participants
            .has_joined(session_id, &request.saved_by)
            .await?
        {
            metrics::record_chat_save("forbidden");
            return Err(VcError::Forbidden(format!(
                "{} did not participate in this session",
                request.saved_by
            )));
        }

        let mut attempts = 0;
        loop {
            match self.try_save(session_id, &request).await {
                Ok(()) => {
                    metrics::record_chat_save("success");
                    info!(
                        target: "vc.services.chat",
                        session_id = %session_id,
                        message_count = request.messages.len(),
                        saved_by = %request.saved_by,
                        "Chat history saved"
                    );
                    return Ok(());
                }
                Err(VcError::ConcurrentModification(reason)) => {
                    // A racing writer committed first. The caller holds
                    // the authoritative client-side transcript, so the
                    // retry decision is theirs, not ours.
                    metrics::record_chat_save("conflict");
                    return Err(VcError::ConcurrentModification(reason));
                }
                Err(VcError::Database(reason)) => {
                    attempts += 1;
                    if attempts >= MAX_BACKEND_ATTEMPTS {
                        metrics::record_chat_save("error");
                        return Err(VcError::ChatSaveFailed(reason));
                    }
                    tracing::warn!(
                        target: "vc.services.chat",
                        session_id = %session_id,
                        attempt = attempts,
                        error = %reason,
                        "Transcript write failed, retrying"
                    );
                }
                Err(e) => {
                    metrics::record_chat_save("error");
                    return Err(e);
                }
            }
        }
    }

    /// Read the archived transcript for a session.
    #[instrument(skip_all, name = "vc.chat.history", fields(session_id = %session_id))]
    pub async fn get_history(&self, session_id: &str) -> Result<ChatHistoryResponse, VcError> {
        let row = self
            .chat_logs
            .find_by_session_id(session_id)
            .await?
            .ok_or_else(|| VcError::ChatNotFound(session_id.to_string()))?;

        Ok(ChatHistoryResponse::from(row))
    }

    /// One read-modify-write round.
    async fn try_save(
        &self,
        session_id: &str,
        request: &ChatHistorySaveRequest,
    ) -> Result<(), VcError> {
        match self.chat_logs.find_by_session_id(session_id).await? {
            None => {
                let result = self
                    .chat_logs
                    .insert(NewChatLog {
                        session_id: session_id.to_string(),
                        chat_messages: request.messages.clone(),
                        session_start_time: request.session_start_time,
                        session_end_time: request.session_end_time,
                        saved_by: request.saved_by.clone(),
                    })
                    .await;

                match result {
                    Ok(_) => Ok(()),
                    // A racing first save inserted before us.
                    Err(VcError::Conflict(_)) => Err(VcError::ConcurrentModification(
                        session_id.to_string(),
                    )),
                    Err(e) => Err(e),
                }
            }
            Some(existing) => {
                // Idempotent re-save: identical payload, nothing to do.
                if existing.chat_messages == request.messages {
                    tracing::debug!(
                        target: "vc.services.chat",
                        session_id = %session_id,
                        message_count = request.messages.len(),
                        "Identical transcript already stored, skipping"
                    );
                    return Ok(());
                }

                let updated = self
                    .chat_logs
                    .update_versioned(
                        session_id,
                        existing.version,
                        ChatLogUpdate {
                            chat_messages: request.messages.clone(),
                            session_end_time: request.session_end_time,
                            saved_by: request.saved_by.clone(),
                        },
                    )
                    .await?;

                if updated {
                    Ok(())
                } else {
                    Err(VcError::ConcurrentModification(session_id.to_string()))
                }
            }
        }
    }
}
