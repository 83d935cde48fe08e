//! Videocall Controller models.
//!
//! Row types mirror the storage schema; request/response types form the
//! HTTP surface. Lifecycle booleans on rows are storage representation
//! only; code should reason through the tagged [`SessionState`] and
//! [`ParticipantState`] accessors, whose transitions happen exclusively
//! inside store operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of chat messages accepted in one transcript save.
pub const MAX_CHAT_MESSAGES: usize = 1000;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum storage key length for shared files.
pub const MAX_IMAGE_KEY_LENGTH: usize = 500;

/// Maximum file name length for shared files.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

// ============================================================================
// Tagged lifecycle states
// ============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session is live; participants may join.
    Active,
    /// Session has ended. `ended_at` is set exactly once and never reset.
    Ended { ended_at: DateTime<Utc> },
}

/// Lifecycle state of a participant row.
///
/// `Left` is terminal for the row: a reconnect appends a new row rather
/// than reviving this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Participant currently holds a live connection.
    Connected,
    /// Participant has left (or was superseded by a reconnect).
    Left { left_at: DateTime<Utc> },
}

// ============================================================================
// Storage rows
// ============================================================================

/// Session row as stored in `video_sessions`.
#[derive(Debug, Clone)]
pub struct SessionRow {
    /// Surrogate primary key.
    pub id: i64,

    /// Provider room identifier, unique.
    pub session_id: String,

    /// Human label; unique only among active rows.
    pub session_name: String,

    /// Whether the session is live.
    pub is_active: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// End timestamp; set exactly once when `is_active` flips to false.
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    /// Tagged lifecycle state.
    ///
    /// An inactive row without `ended_at` cannot be produced by the
    /// stores; it is reported as ended at `created_at` rather than
    /// panicking.
    pub fn state(&self) -> SessionState {
        if self.is_active {
            SessionState::Active
        } else {
            SessionState::Ended {
                ended_at: self.ended_at.unwrap_or(self.created_at),
            }
        }
    }
}

/// New session for insertion; always inserted active.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub session_name: String,
}

/// Participant row as stored in `participants`.
#[derive(Debug, Clone)]
pub struct ParticipantRow {
    /// Surrogate primary key.
    pub id: i64,

    /// Provider-issued, single-use connection identifier.
    pub connection_id: String,

    /// Provider-issued connection credential.
    pub token: String,

    /// Username of the joining participant.
    pub username: String,

    /// Owning session (provider room identifier).
    pub session_id: String,

    /// Whether this connection is still live.
    pub is_connected: bool,

    /// Join timestamp.
    pub joined_at: DateTime<Utc>,

    /// Leave timestamp; set exactly once by the leave transition.
    pub left_at: Option<DateTime<Utc>>,
}

impl ParticipantRow {
    /// Tagged lifecycle state.
    pub fn state(&self) -> ParticipantState {
        if self.is_connected {
            ParticipantState::Connected
        } else {
            ParticipantState::Left {
                left_at: self.left_at.unwrap_or(self.joined_at),
            }
        }
    }
}

/// New participant for insertion; always inserted connected.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub connection_id: String,
    pub token: String,
    pub username: String,
    pub session_id: String,
}

/// One chat message as exchanged during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-side timestamp string as sent by the frontend.
    pub timestamp: String,

    /// Connection identifier of the sender.
    pub participant_id: String,

    /// Display name of the sender.
    pub participant_name: String,

    /// Message body.
    pub message: String,

    /// Message kind (chat/system/...), free-form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
}

/// Archived transcript row as stored in `session_chat_logs`.
#[derive(Debug, Clone)]
pub struct ChatLogRow {
    /// Surrogate primary key.
    pub id: i64,

    /// Owning session; unique: at most one transcript per session, ever.
    pub session_id: String,

    /// Full message list; every save replaces it wholesale.
    pub chat_messages: Vec<ChatMessage>,

    /// Number of messages in `chat_messages`.
    pub total_messages: i32,

    /// When the session started.
    pub session_start_time: DateTime<Utc>,

    /// When the session ended (None while autosaving mid-session).
    pub session_end_time: Option<DateTime<Utc>>,

    /// Identity of the actor who triggered the last save.
    pub saved_by: String,

    /// Optimistic concurrency counter, incremented on every update.
    pub version: i64,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// New transcript for first-save insertion.
#[derive(Debug, Clone)]
pub struct NewChatLog {
    pub session_id: String,
    pub chat_messages: Vec<ChatMessage>,
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: Option<DateTime<Utc>>,
    pub saved_by: String,
}

/// Replacement payload for a versioned transcript update.
#[derive(Debug, Clone)]
pub struct ChatLogUpdate {
    pub chat_messages: Vec<ChatMessage>,
    pub session_end_time: Option<DateTime<Utc>>,
    pub saved_by: String,
}

/// Shared file row as stored in `video_call_shared_files`.
#[derive(Debug, Clone)]
pub struct SharedFileRow {
    /// Surrogate primary key.
    pub id: i64,

    /// Owning session.
    pub session_id: String,

    /// Storage-backend object key; unique per session.
    pub image_key: String,

    /// Original file name.
    pub file_name: String,

    /// File size in bytes.
    pub file_size: i64,

    /// MIME type, when known.
    pub content_type: Option<String>,

    /// User id of the uploader.
    pub uploaded_by_user_id: String,

    /// Display name of the uploader.
    pub uploaded_by_name: String,

    /// Registration timestamp.
    pub uploaded_at: DateTime<Utc>,
}

/// New shared file for registration.
#[derive(Debug, Clone)]
pub struct NewSharedFile {
    pub session_id: String,
    pub image_key: String,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub uploaded_by_user_id: String,
    pub uploaded_by_name: String,
}

// ============================================================================
// Request types
// ============================================================================

/// Request for `POST /v1/sessions/quick-join`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickJoinRequest {
    /// Session name to resolve or create.
    #[serde(default)]
    pub session_name: Option<String>,

    /// Explicit session id for direct joins.
    #[serde(default)]
    pub session_id: Option<String>,

    /// Username of the joining participant.
    pub username: String,

    /// Whether to create the session when no active match exists.
    #[serde(default = "default_auto_create")]
    pub auto_create_session: bool,
}

fn default_auto_create() -> bool {
    true
}

impl QuickJoinRequest {
    /// Validate the request, returning a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)?;
        if self.session_name.as_deref().map_or(true, |n| n.trim().is_empty())
            && self.session_id.as_deref().map_or(true, |i| i.trim().is_empty())
        {
            return Err("either sessionName or sessionId is required".to_string());
        }
        Ok(())
    }
}

/// Request for `POST /v1/sessions/{session_id}/join`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    pub username: String,
}

impl JoinSessionRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)
    }
}

/// Request for `POST /v1/sessions/{session_id}/refresh-token`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub username: String,
}

impl RefreshTokenRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)
    }
}

/// Request for `POST /v1/sessions/{session_id}/auto-reconnect`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoReconnectRequest {
    pub username: String,

    /// Connection id of the dropped connection, when the client still
    /// knows it. Stale or foreign values are ignored.
    #[serde(default)]
    pub last_connection_id: Option<String>,
}

impl AutoReconnectRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)
    }
}

/// Request for `POST /v1/sessions/{session_id}/chat/save`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistorySaveRequest {
    pub messages: Vec<ChatMessage>,
    pub session_start_time: DateTime<Utc>,
    #[serde(default)]
    pub session_end_time: Option<DateTime<Utc>>,
    /// Identity of the saver, resolved by the upstream gateway.
    pub saved_by: String,
}

impl ChatHistorySaveRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_string());
        }
        if self.messages.len() > MAX_CHAT_MESSAGES {
            return Err(format!(
                "at most {} messages may be saved at once",
                MAX_CHAT_MESSAGES
            ));
        }
        if self.saved_by.trim().is_empty() {
            return Err("savedBy is required".to_string());
        }
        Ok(())
    }
}

/// Request for `POST /v1/sessions/{session_id}/files`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFileUploadRequest {
    /// Storage key returned by the object-storage collaborator. The
    /// bytes are already stored when this request arrives.
    pub image_key: String,
    pub file_name: String,
    pub file_size: i64,
    #[serde(default)]
    pub content_type: Option<String>,
    pub uploaded_by_user_id: String,
    pub uploaded_by_name: String,
}

impl SharedFileUploadRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.image_key.trim().is_empty() {
            return Err("imageKey is required".to_string());
        }
        if self.image_key.len() > MAX_IMAGE_KEY_LENGTH {
            return Err(format!(
                "imageKey must not exceed {} characters",
                MAX_IMAGE_KEY_LENGTH
            ));
        }
        if self.file_name.trim().is_empty() {
            return Err("fileName is required".to_string());
        }
        if self.file_name.len() > MAX_FILE_NAME_LENGTH {
            return Err(format!(
                "fileName must not exceed {} characters",
                MAX_FILE_NAME_LENGTH
            ));
        }
        if self.file_size <= 0 {
            return Err("fileSize must be positive".to_string());
        }
        if self.uploaded_by_user_id.trim().is_empty() {
            return Err("uploadedByUserId is required".to_string());
        }
        Ok(())
    }
}

/// Query parameters for `DELETE /v1/sessions/{session_id}/files/{image_key}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSharedFileParams {
    /// Identity of the requester, resolved upstream. Only the original
    /// uploader may delete a file.
    pub requested_by: String,
}

fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("username is required".to_string());
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "username must not exceed {} characters",
            MAX_USERNAME_LENGTH
        ));
    }
    Ok(())
}

// ============================================================================
// Response types
// ============================================================================

/// Connection bundle returned by quick-join, join, refresh and reconnect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBundle {
    pub session_id: String,
    pub session_name: String,
    pub username: String,
    pub connection_id: String,
    pub token: String,

    /// RTC provider URL for the client connection.
    pub rtc_server_url: String,

    /// WebSocket URL for the client connection.
    pub web_socket_url: String,

    /// Set on quick-join: whether this call created the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_session: Option<bool>,

    /// Set on token refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_token_refresh: Option<bool>,

    /// Set on reconnection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_reconnection: Option<bool>,

    pub config_info: ConfigInfo,
}

/// Frontend defaults included in every join bundle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfo {
    pub default_resolution: String,
    pub default_frame_rate: u32,
    pub auto_enable_audio: bool,
    pub auto_enable_video: bool,
    pub chat_enabled: bool,
}

impl Default for ConfigInfo {
    fn default() -> Self {
        Self {
            default_resolution: "640x480".to_string(),
            default_frame_rate: 30,
            auto_enable_audio: true,
            auto_enable_video: true,
            chat_enabled: true,
        }
    }
}

/// Response for `GET /v1/config`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigResponse {
    pub rtc_server_url: String,
    pub web_socket_url: String,
    pub default_video_config: VideoConfig,
    pub supported_browsers: Vec<String>,
    pub features: FeatureFlags,
}

/// Default client video settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    pub resolution: String,
    pub frame_rate: u32,
    pub publish_audio: bool,
    pub publish_video: bool,
}

/// Feature switches surfaced to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub chat_enabled: bool,
    pub screen_share_enabled: bool,
    pub recording_enabled: bool,
    pub virtual_background_enabled: bool,
}

/// Response for `GET /v1/sessions/{session_id}/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub session_name: String,
    pub is_active: bool,
    pub participant_count: usize,
    pub participants: Vec<ParticipantInfo>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Connected-participant snapshot inside a status response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub username: String,
    pub connection_id: String,
    pub joined_at: DateTime<Utc>,
    pub is_connected: bool,
}

impl From<&ParticipantRow> for ParticipantInfo {
    fn from(row: &ParticipantRow) -> Self {
        Self {
            username: row.username.clone(),
            connection_id: row.connection_id.clone(),
            joined_at: row.joined_at,
            is_connected: row.is_connected,
        }
    }
}

/// Response for `GET /v1/sessions/{session_id}/chat/history`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub total_messages: i32,
    pub session_start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_end_time: Option<DateTime<Utc>>,
    pub saved_by: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ChatLogRow> for ChatHistoryResponse {
    fn from(row: ChatLogRow) -> Self {
        Self {
            session_id: row.session_id,
            total_messages: row.total_messages,
            messages: row.chat_messages,
            session_start_time: row.session_start_time,
            session_end_time: row.session_end_time,
            saved_by: row.saved_by,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

/// One shared file in API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFileResponse {
    pub image_key: String,
    pub file_name: String,
    pub file_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub uploaded_by_user_id: String,
    pub uploaded_by_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<SharedFileRow> for SharedFileResponse {
    fn from(row: SharedFileRow) -> Self {
        Self {
            image_key: row.image_key,
            file_name: row.file_name,
            file_size: row.file_size,
            content_type: row.content_type,
            uploaded_by_user_id: row.uploaded_by_user_id,
            uploaded_by_name: row.uploaded_by_name,
            uploaded_at: row.uploaded_at,
        }
    }
}

/// Response for `GET /v1/sessions/{session_id}/files`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFileListResponse {
    pub session_id: String,
    pub total_count: usize,
    pub files: Vec<SharedFileResponse>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Store connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_session(is_active: bool) -> SessionRow {
        SessionRow {
            id: 1,
            session_id: "session_abc123".to_string(),
            session_name: "mentoring-42".to_string(),
            is_active,
            created_at: Utc::now(),
            ended_at: if is_active { None } else { Some(Utc::now()) },
        }
    }

    #[test]
    fn test_session_state_active() {
        let session = sample_session(true);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_session_state_ended_carries_timestamp() {
        let session = sample_session(false);
        assert_eq!(
            session.state(),
            SessionState::Ended {
                ended_at: session.ended_at.unwrap()
            }
        );
    }

    #[test]
    fn test_participant_state_transitions() {
        let mut row = ParticipantRow {
            id: 1,
            connection_id: "con_1".to_string(),
            token: "tok".to_string(),
            username: "alice".to_string(),
            session_id: "session_abc123".to_string(),
            is_connected: true,
            joined_at: Utc::now(),
            left_at: None,
        };
        assert_eq!(row.state(), ParticipantState::Connected);

        let left_at = Utc::now();
        row.is_connected = false;
        row.left_at = Some(left_at);
        assert_eq!(row.state(), ParticipantState::Left { left_at });
    }

    #[test]
    fn test_quick_join_request_requires_target() {
        let request = QuickJoinRequest {
            session_name: None,
            session_id: None,
            username: "alice".to_string(),
            auto_create_session: true,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_quick_join_request_accepts_name_only() {
        let request = QuickJoinRequest {
            session_name: Some("room-A".to_string()),
            session_id: None,
            username: "alice".to_string(),
            auto_create_session: true,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_quick_join_request_rejects_blank_username() {
        let request = QuickJoinRequest {
            session_name: Some("room-A".to_string()),
            session_id: None,
            username: "   ".to_string(),
            auto_create_session: true,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_quick_join_request_defaults_auto_create() {
        let request: QuickJoinRequest =
            serde_json::from_str(r#"{"sessionName": "room-A", "username": "alice"}"#).unwrap();
        assert!(request.auto_create_session);
    }

    #[test]
    fn test_username_length_limit() {
        let request = JoinSessionRequest {
            username: "x".repeat(MAX_USERNAME_LENGTH + 1),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_chat_save_request_rejects_empty_messages() {
        let request = ChatHistorySaveRequest {
            messages: vec![],
            session_start_time: Utc::now(),
            session_end_time: None,
            saved_by: "alice".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_chat_save_request_rejects_too_many_messages() {
        let message = ChatMessage {
            timestamp: "12:00:00".to_string(),
            participant_id: "con_1".to_string(),
            participant_name: "alice".to_string(),
            message: "hi".to_string(),
            message_type: None,
        };
        let request = ChatHistorySaveRequest {
            messages: vec![message; MAX_CHAT_MESSAGES + 1],
            session_start_time: Utc::now(),
            session_end_time: None,
            saved_by: "alice".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_shared_file_request_validation() {
        let mut request = SharedFileUploadRequest {
            image_key: "shared-materials/abc.pdf".to_string(),
            file_name: "abc.pdf".to_string(),
            file_size: 1024,
            content_type: Some("application/pdf".to_string()),
            uploaded_by_user_id: "user-1".to_string(),
            uploaded_by_name: "Alice".to_string(),
        };
        assert!(request.validate().is_ok());

        request.file_size = 0;
        assert!(request.validate().is_err());

        request.file_size = 10;
        request.image_key = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_chat_message_serde_roundtrip_field_names() {
        let json = r#"{
            "timestamp": "12:00:01",
            "participantId": "con_1",
            "participantName": "Alice",
            "message": "hello",
            "messageType": "chat"
        }"#;
        let message: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.participant_name, "Alice");

        let out = serde_json::to_value(&message).unwrap();
        assert_eq!(out["participantId"], "con_1");
        assert_eq!(out["messageType"], "chat");
    }

    #[test]
    fn test_join_bundle_omits_unset_flags() {
        let bundle = JoinBundle {
            session_id: "session_abc".to_string(),
            session_name: "room-A".to_string(),
            username: "alice".to_string(),
            connection_id: "con_1".to_string(),
            token: "tok".to_string(),
            rtc_server_url: "https://rtc.example.com".to_string(),
            web_socket_url: "wss://rtc.example.com".to_string(),
            is_new_session: Some(true),
            is_token_refresh: None,
            is_reconnection: None,
            config_info: ConfigInfo::default(),
        };
        let out = serde_json::to_value(&bundle).unwrap();
        assert_eq!(out["isNewSession"], true);
        assert!(out.get("isTokenRefresh").is_none());
        assert!(out.get("isReconnection").is_none());
    }
}
