//! Session orchestration service.
//!
//! Implements quick-join, explicit join, leave, token refresh,
//! auto-reconnect, status queries and session end by composing the
//! session/participant stores with the RTC provider client.
//!
//! Sequencing invariant: a Participant row is inserted only after the
//! provider has issued its token, so a failed provider call never
//! strands a half-joined participant. A Session row created before a
//! failed token call stays active and is reused by the next caller.

use crate::errors::VcError;
use crate::models::{
    ConfigInfo, FeatureFlags, JoinBundle, NewParticipant, NewSession, ParticipantInfo,
    ParticipantState, SessionConfigResponse, SessionRow, SessionState, SessionStatusResponse,
    VideoConfig,
};
use crate::observability::metrics;
use crate::repositories::{ParticipantStore, SessionStore};
use crate::services::rtc_client::RtcClient;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// URLs handed to clients so they can reach the RTC provider directly.
#[derive(Debug, Clone)]
pub struct RtcUrls {
    /// Provider HTTP endpoint for client SDKs.
    pub server_url: String,
    /// Provider WebSocket endpoint.
    pub web_socket_url: String,
}

/// Session orchestrator.
#[derive(Clone)]
pub struct VideoCallService {
    sessions: Arc<dyn SessionStore>,
    participants: Arc<dyn ParticipantStore>,
    rtc: Arc<dyn RtcClient>,
    rtc_urls: RtcUrls,
}

impl VideoCallService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        participants: Arc<dyn ParticipantStore>,
        rtc: Arc<dyn RtcClient>,
        rtc_urls: RtcUrls,
    ) -> Self {
        Self {
            sessions,
            participants,
            rtc,
            rtc_urls,
        }
    }

    /// One-call join: resolve or create the target session, request a
    /// connection token, record the participant and return the bundle.
    ///
    /// Resolution order: explicit session id (must be active), then
    /// active session name, then creation when `auto_create` is set.
    #[instrument(skip_all, name = "vc.session.quick_join", fields(username = %username))]
    pub async fn quick_join(
        &self,
        session_id: Option<&str>,
        session_name: Option<&str>,
        username: &str,
        auto_create: bool,
    ) -> Result<JoinBundle, VcError> {
        let (session, is_new) = match self
            .resolve_or_create(session_id, session_name, auto_create)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                metrics::record_join("quick_join", "error", Some(join_error_type(&e)));
                return Err(e);
            }
        };

        let mut bundle = match self.connect(&session, username).await {
            Ok(bundle) => bundle,
            Err(e) => {
                metrics::record_join("quick_join", "error", Some(join_error_type(&e)));
                return Err(e);
            }
        };
        bundle.is_new_session = Some(is_new);

        metrics::record_join("quick_join", "success", None);
        info!(
            target: "vc.services.video_call",
            session_id = %bundle.session_id,
            username = %username,
            is_new_session = is_new,
            "Quick join completed"
        );

        Ok(bundle)
    }

    /// Join an existing active session; never creates one.
    #[instrument(skip_all, name = "vc.session.join", fields(session_id = %session_id, username = %username))]
    pub async fn join_session(
        &self,
        session_id: &str,
        username: &str,
    ) -> Result<JoinBundle, VcError> {
        let session = match self.require_active(session_id).await {
            Ok(session) => session,
            Err(e) => {
                metrics::record_join("join", "error", Some(join_error_type(&e)));
                return Err(e);
            }
        };

        match self.connect(&session, username).await {
            Ok(bundle) => {
                metrics::record_join("join", "success", None);
                Ok(bundle)
            }
            Err(e) => {
                metrics::record_join("join", "error", Some(join_error_type(&e)));
                Err(e)
            }
        }
    }

    /// Perform the leave transition for a connection.
    ///
    /// Idempotent: leaving an already-left participant is a no-op. An
    /// unknown connection id is an error.
    #[instrument(skip_all, name = "vc.session.leave", fields(connection_id = %connection_id))]
    pub async fn leave_session(&self, connection_id: &str) -> Result<(), VcError> {
        let participant = self
            .participants
            .find_by_connection_id(connection_id)
            .await?
            .ok_or_else(|| VcError::ParticipantNotFound(connection_id.to_string()))?;

        if participant.state() == ParticipantState::Connected {
            // Guarded update; a concurrent leave winning the race still
            // leaves the row in the same terminal state.
            self.participants.mark_left(connection_id).await?;
            info!(
                target: "vc.services.video_call",
                session_id = %participant.session_id,
                connection_id = %connection_id,
                username = %participant.username,
                "Participant left session"
            );
        }

        Ok(())
    }

    /// Issue a fresh token for an existing active session.
    ///
    /// Creates a new Participant row; prior rows are left untouched.
    #[instrument(skip_all, name = "vc.session.refresh_token", fields(session_id = %session_id, username = %username))]
    pub async fn refresh_token(
        &self,
        session_id: &str,
        username: &str,
    ) -> Result<JoinBundle, VcError> {
        let session = match self.require_active(session_id).await {
            Ok(session) => session,
            Err(e) => {
                metrics::record_join("refresh", "error", Some(join_error_type(&e)));
                return Err(e);
            }
        };

        match self.connect(&session, username).await {
            Ok(mut bundle) => {
                bundle.is_token_refresh = Some(true);
                metrics::record_join("refresh", "success", None);
                Ok(bundle)
            }
            Err(e) => {
                metrics::record_join("refresh", "error", Some(join_error_type(&e)));
                Err(e)
            }
        }
    }

    /// Reconnect after a dropped socket.
    ///
    /// Connection ids are provider-issued and single-use, so identity
    /// continuity is tracked by username + session: the old row (when
    /// it resolves and belongs to this session) is marked left and a
    /// new row is appended. A stale or foreign `last_connection_id` is
    /// ignored, never an error.
    #[instrument(
        skip_all,
        name = "vc.session.auto_reconnect",
        fields(session_id = %session_id, username = %username)
    )]
    pub async fn auto_reconnect(
        &self,
        session_id: &str,
        username: &str,
        last_connection_id: Option<&str>,
    ) -> Result<JoinBundle, VcError> {
        let session = self
            .sessions
            .find_active_by_session_id(session_id)
            .await?
            .ok_or_else(|| {
                metrics::record_join("reconnect", "error", Some("session_not_found"));
                VcError::AutoReconnectFailed(format!("session {} is not active", session_id))
            })?;

        // Best-effort cleanup of the previous connection.
        if let Some(last) = last_connection_id {
            match self.participants.find_by_connection_id(last).await {
                Ok(Some(previous)) if previous.session_id == session.session_id => {
                    if previous.state() == ParticipantState::Connected {
                        if let Err(e) = self.participants.mark_left(last).await {
                            warn!(
                                target: "vc.services.video_call",
                                connection_id = %last,
                                error = %e,
                                "Failed to mark previous connection left (ignored)"
                            );
                        }
                    }
                }
                Ok(_) => {
                    // Unknown or foreign connection id: nothing to clean up.
                }
                Err(e) => {
                    warn!(
                        target: "vc.services.video_call",
                        connection_id = %last,
                        error = %e,
                        "Lookup of previous connection failed (ignored)"
                    );
                }
            }
        }

        match self.connect(&session, username).await {
            Ok(mut bundle) => {
                bundle.is_reconnection = Some(true);
                metrics::record_join("reconnect", "success", None);
                info!(
                    target: "vc.services.video_call",
                    session_id = %session_id,
                    username = %username,
                    "Participant reconnected"
                );
                Ok(bundle)
            }
            Err(VcError::ProviderUnavailable(reason)) => {
                metrics::record_join("reconnect", "error", Some("provider_unavailable"));
                Err(VcError::AutoReconnectFailed(reason))
            }
            Err(e) => {
                metrics::record_join("reconnect", "error", Some(join_error_type(&e)));
                Err(e)
            }
        }
    }

    /// Read-only session snapshot: lifecycle state plus the currently
    /// connected participants.
    #[instrument(skip_all, name = "vc.session.status", fields(session_id = %session_id))]
    pub async fn get_session_status(
        &self,
        session_id: &str,
    ) -> Result<SessionStatusResponse, VcError> {
        let session = self
            .sessions
            .find_by_session_id(session_id)
            .await?
            .ok_or_else(|| VcError::SessionNotFound(session_id.to_string()))?;

        let connected = self.participants.list_connected(session_id).await?;

        Ok(SessionStatusResponse {
            session_id: session.session_id,
            session_name: session.session_name,
            is_active: session.is_active,
            participant_count: connected.len(),
            participants: connected.iter().map(ParticipantInfo::from).collect(),
            created_at: session.created_at,
            ended_at: session.ended_at,
        })
    }

    /// End a session: durable state transition first, then best-effort
    /// room close at the provider. Idempotent on an ended session.
    #[instrument(skip_all, name = "vc.session.end", fields(session_id = %session_id))]
    pub async fn end_session(&self, session_id: &str) -> Result<(), VcError> {
        let session = self
            .sessions
            .find_by_session_id(session_id)
            .await?
            .ok_or_else(|| VcError::SessionNotFound(session_id.to_string()))?;

        if let SessionState::Ended { .. } = session.state() {
            return Ok(());
        }

        let ended = self.sessions.end_session(session_id).await?;
        if ended {
            info!(
                target: "vc.services.video_call",
                session_id = %session_id,
                "Session ended"
            );
        }

        // The durable transition is already committed; a provider
        // failure here must not resurrect the session.
        if let Err(e) = self.rtc.close_room(session_id).await {
            warn!(
                target: "vc.services.video_call",
                session_id = %session_id,
                error = %e,
                "Provider room close failed (ignored)"
            );
        }

        Ok(())
    }

    /// Static frontend configuration.
    pub fn session_config(&self) -> SessionConfigResponse {
        SessionConfigResponse {
            rtc_server_url: self.rtc_urls.server_url.clone(),
            web_socket_url: self.rtc_urls.web_socket_url.clone(),
            default_video_config: VideoConfig {
                resolution: "640x480".to_string(),
                frame_rate: 30,
                publish_audio: true,
                publish_video: true,
            },
            supported_browsers: vec![
                "Chrome".to_string(),
                "Firefox".to_string(),
                "Safari".to_string(),
                "Edge".to_string(),
            ],
            features: FeatureFlags {
                chat_enabled: true,
                screen_share_enabled: true,
                recording_enabled: false,
                virtual_background_enabled: false,
            },
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Resolve the target session, creating it when permitted.
    ///
    /// Returns the session and whether this call created it.
    async fn resolve_or_create(
        &self,
        session_id: Option<&str>,
        session_name: Option<&str>,
        auto_create: bool,
    ) -> Result<(SessionRow, bool), VcError> {
        if let Some(sid) = session_id.filter(|s| !s.trim().is_empty()) {
            let session = self.require_active(sid).await?;
            return Ok((session, false));
        }

        let name = session_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| VcError::BadRequest("session name is required".to_string()))?;

        if let Some(session) = self.sessions.find_active_by_name(name).await? {
            return Ok((session, false));
        }

        if !auto_create {
            return Err(VcError::SessionNotFound(name.to_string()));
        }

        // Provider room first, then the row. A row created here stays
        // valid for the next caller even if the subsequent token call
        // fails (it is already active).
        let requested_id =
            common::id::generate_prefixed_id("session").map_err(|_| VcError::Internal)?;
        let room_id = self.rtc.create_room(&requested_id).await?;

        match self
            .sessions
            .insert_active(NewSession {
                session_id: room_id,
                session_name: name.to_string(),
            })
            .await
        {
            Ok(session) => {
                metrics::record_session_created();
                info!(
                    target: "vc.services.video_call",
                    session_id = %session.session_id,
                    session_name = %name,
                    "Session created"
                );
                Ok((session, true))
            }
            Err(VcError::Conflict(_)) => {
                // Another caller created the session first; adopt the
                // winning row instead of surfacing the constraint hit.
                tracing::debug!(
                    target: "vc.services.video_call",
                    session_name = %name,
                    "Lost session creation race, adopting winner"
                );
                let session = self
                    .sessions
                    .find_active_by_name(name)
                    .await?
                    .ok_or_else(|| VcError::SessionNotFound(name.to_string()))?;
                Ok((session, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Look up an active session by id.
    async fn require_active(&self, session_id: &str) -> Result<SessionRow, VcError> {
        self.sessions
            .find_active_by_session_id(session_id)
            .await?
            .ok_or_else(|| VcError::SessionNotFound(session_id.to_string()))
    }

    /// Request a token and record the participant.
    async fn connect(&self, session: &SessionRow, username: &str) -> Result<JoinBundle, VcError> {
        let connection = self
            .rtc
            .create_connection(&session.session_id, username)
            .await?;
        let connection_id = connection.connection_id.clone();

        let participant = match self
            .participants
            .register(NewParticipant {
                connection_id: connection.connection_id,
                token: connection.token,
                username: username.to_string(),
                session_id: session.session_id.clone(),
            })
            .await
        {
            Ok(participant) => participant,
            Err(VcError::Conflict(_)) => {
                // Provider-unique ids colliding is an anomaly upstream;
                // fail loudly rather than overwrite.
                return Err(VcError::DuplicateConnection(connection_id));
            }
            Err(e) => return Err(e),
        };

        Ok(JoinBundle {
            session_id: session.session_id.clone(),
            session_name: session.session_name.clone(),
            username: username.to_string(),
            connection_id: participant.connection_id,
            token: participant.token,
            rtc_server_url: self.rtc_urls.server_url.clone(),
            web_socket_url: self.rtc_urls.web_socket_url.clone(),
            is_new_session: None,
            is_token_refresh: None,
            is_reconnection: None,
            config_info: ConfigInfo::default(),
        })
    }
}

/// Bounded error-type label for join metrics.
fn join_error_type(error: &VcError) -> &'static str {
    match error {
        VcError::SessionNotFound(_) => "session_not_found",
        VcError::ProviderUnavailable(_) => "provider_unavailable",
        VcError::DuplicateConnection(_) => "duplicate_connection",
        VcError::AutoReconnectFailed(_) => "reconnect_failed",
        VcError::BadRequest(_) => "bad_request",
        VcError::Database(_) => "db_error",
        _ => "other",
    }
}
