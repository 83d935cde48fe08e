//! RTC provider HTTP client.
//!
//! Talks to the external real-time communication provider (an
//! OpenVidu-compatible REST API) to create rooms and issue
//! per-participant connection tokens. Media itself never flows through
//! this service; only control-plane calls do.
//!
//! # Security
//!
//! - Provider secret is held in a `SecretString` and sent via basic auth
//! - All requests carry an explicit timeout; a timeout surfaces as
//!   `ProviderUnavailable`, never hangs the request path
//! - Errors returned to callers are generic; details are logged

use crate::errors::VcError;
use crate::observability::metrics;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{instrument, warn};

/// Basic-auth username expected by OpenVidu-compatible providers.
const PROVIDER_API_USER: &str = "OPENVIDUAPP";

/// A provider-issued connection: single-use id plus credential.
#[derive(Debug, Clone)]
pub struct RtcConnection {
    /// Opaque, single-use connection identifier.
    pub connection_id: String,
    /// Opaque credential the client uses to attach to the room.
    pub token: String,
}

/// Trait for RTC provider operations (enables mocking).
///
/// Implementations must be safe to call repeatedly for the same room;
/// idempotent room reuse is the orchestrator's job, not the provider's.
#[async_trait]
pub trait RtcClient: Send + Sync {
    /// Create (or reuse) a room, returning its canonical identifier.
    async fn create_room(&self, requested_id: &str) -> Result<String, VcError>;

    /// Issue a connection token for one participant of a room.
    async fn create_connection(
        &self,
        session_id: &str,
        username: &str,
    ) -> Result<RtcConnection, VcError>;

    /// Close a room on the provider side.
    async fn close_room(&self, session_id: &str) -> Result<(), VcError>;
}

// ============================================================================
// OpenVidu-compatible HTTP implementation
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomBody<'a> {
    custom_session_id: &'a str,
}

#[derive(Deserialize)]
struct CreateRoomResponse {
    id: String,
}

#[derive(Serialize)]
struct CreateConnectionBody {
    #[serde(rename = "type")]
    connection_type: &'static str,
    data: String,
    role: &'static str,
}

#[derive(Deserialize)]
struct CreateConnectionResponse {
    id: String,
    token: String,
}

/// RTC provider client over the provider's REST API.
#[derive(Clone)]
pub struct OpenViduClient {
    http: Client,
    base_url: String,
    secret: SecretString,
}

impl OpenViduClient {
    /// Create a new provider client with a bounded request timeout.
    pub fn new(base_url: String, secret: SecretString, timeout: Duration) -> Result<Self, VcError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "vc.services.rtc_client", error = %e, "Failed to build HTTP client");
                VcError::Internal
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
        })
    }

    fn sessions_url(&self) -> String {
        format!("{}/openvidu/api/sessions", self.base_url)
    }
}

#[async_trait]
impl RtcClient for OpenViduClient {
    #[instrument(skip_all, name = "vc.rtc.create_room", fields(requested_id = %requested_id))]
    async fn create_room(&self, requested_id: &str) -> Result<String, VcError> {
        let start = Instant::now();

        let response = self
            .http
            .post(self.sessions_url())
            .basic_auth(PROVIDER_API_USER, Some(self.secret.expose_secret()))
            .json(&CreateRoomBody {
                custom_session_id: requested_id,
            })
            .send()
            .await
            .map_err(|e| {
                metrics::record_provider_call("create_room", "error", start.elapsed());
                warn!(target: "vc.services.rtc_client", error = %e, "Room creation request failed");
                VcError::ProviderUnavailable("room creation failed".to_string())
            })?;

        // 409: the room already exists at the provider, so reuse it.
        if response.status() == StatusCode::CONFLICT {
            metrics::record_provider_call("create_room", "success", start.elapsed());
            return Ok(requested_id.to_string());
        }

        if !response.status().is_success() {
            metrics::record_provider_call("create_room", "error", start.elapsed());
            warn!(
                target: "vc.services.rtc_client",
                status = %response.status(),
                "Provider rejected room creation"
            );
            return Err(VcError::ProviderUnavailable(
                "room creation rejected".to_string(),
            ));
        }

        let body: CreateRoomResponse = response.json().await.map_err(|e| {
            metrics::record_provider_call("create_room", "error", start.elapsed());
            warn!(target: "vc.services.rtc_client", error = %e, "Malformed room creation response");
            VcError::ProviderUnavailable("malformed provider response".to_string())
        })?;

        metrics::record_provider_call("create_room", "success", start.elapsed());
        Ok(body.id)
    }

    #[instrument(skip_all, name = "vc.rtc.create_connection", fields(session_id = %session_id, username = %username))]
    async fn create_connection(
        &self,
        session_id: &str,
        username: &str,
    ) -> Result<RtcConnection, VcError> {
        let start = Instant::now();

        let data = serde_json::json!({ "username": username }).to_string();
        let response = self
            .http
            .post(format!("{}/{}/connection", self.sessions_url(), session_id))
            .basic_auth(PROVIDER_API_USER, Some(self.secret.expose_secret()))
            .json(&CreateConnectionBody {
                connection_type: "WEBRTC",
                data,
                role: "PUBLISHER",
            })
            .send()
            .await
            .map_err(|e| {
                metrics::record_provider_call("create_connection", "error", start.elapsed());
                warn!(target: "vc.services.rtc_client", error = %e, "Connection token request failed");
                VcError::ProviderUnavailable("connection token request failed".to_string())
            })?;

        if !response.status().is_success() {
            metrics::record_provider_call("create_connection", "error", start.elapsed());
            warn!(
                target: "vc.services.rtc_client",
                status = %response.status(),
                "Provider rejected connection token request"
            );
            return Err(VcError::ProviderUnavailable(
                "connection token rejected".to_string(),
            ));
        }

        let body: CreateConnectionResponse = response.json().await.map_err(|e| {
            metrics::record_provider_call("create_connection", "error", start.elapsed());
            warn!(target: "vc.services.rtc_client", error = %e, "Malformed connection response");
            VcError::ProviderUnavailable("malformed provider response".to_string())
        })?;

        metrics::record_provider_call("create_connection", "success", start.elapsed());
        Ok(RtcConnection {
            connection_id: body.id,
            token: body.token,
        })
    }

    #[instrument(skip_all, name = "vc.rtc.close_room", fields(session_id = %session_id))]
    async fn close_room(&self, session_id: &str) -> Result<(), VcError> {
        let start = Instant::now();

        let response = self
            .http
            .delete(format!("{}/{}", self.sessions_url(), session_id))
            .basic_auth(PROVIDER_API_USER, Some(self.secret.expose_secret()))
            .send()
            .await
            .map_err(|e| {
                metrics::record_provider_call("close_room", "error", start.elapsed());
                warn!(target: "vc.services.rtc_client", error = %e, "Room close request failed");
                VcError::ProviderUnavailable("room close failed".to_string())
            })?;

        // 404: already closed on the provider side, nothing to do.
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            metrics::record_provider_call("close_room", "success", start.elapsed());
            return Ok(());
        }

        metrics::record_provider_call("close_room", "error", start.elapsed());
        Err(VcError::ProviderUnavailable(
            "room close rejected".to_string(),
        ))
    }
}

// ============================================================================
// Mock implementation for tests
// ============================================================================

/// Mock RTC client module for testing.
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock RTC client for unit and integration testing.
    ///
    /// Issues deterministic-format connection ids (`con_<base62>`) and
    /// tracks calls for assertions.
    pub struct MockRtcClient {
        rooms: Mutex<HashSet<String>>,
        fail_rooms: bool,
        fail_connections: bool,
        create_room_calls: AtomicUsize,
        create_connection_calls: AtomicUsize,
        close_room_calls: AtomicUsize,
    }

    impl MockRtcClient {
        /// Create a mock that accepts every call.
        pub fn healthy() -> Self {
            Self {
                rooms: Mutex::new(HashSet::new()),
                fail_rooms: false,
                fail_connections: false,
                create_room_calls: AtomicUsize::new(0),
                create_connection_calls: AtomicUsize::new(0),
                close_room_calls: AtomicUsize::new(0),
            }
        }

        /// Create a mock whose room creation fails.
        pub fn failing_rooms() -> Self {
            Self {
                fail_rooms: true,
                ..Self::healthy()
            }
        }

        /// Create a mock whose connection token issuance fails.
        pub fn failing_connections() -> Self {
            Self {
                fail_connections: true,
                ..Self::healthy()
            }
        }

        /// Number of create_room calls made.
        pub fn create_room_calls(&self) -> usize {
            self.create_room_calls.load(Ordering::SeqCst)
        }

        /// Number of create_connection calls made.
        pub fn create_connection_calls(&self) -> usize {
            self.create_connection_calls.load(Ordering::SeqCst)
        }

        /// Number of close_room calls made.
        pub fn close_room_calls(&self) -> usize {
            self.close_room_calls.load(Ordering::SeqCst)
        }

        /// Whether the mock currently tracks this room as open.
        pub fn has_room(&self, session_id: &str) -> bool {
            self.rooms
                .lock()
                .map(|rooms| rooms.contains(session_id))
                .unwrap_or(false)
        }
    }

    #[async_trait]
    impl RtcClient for MockRtcClient {
        async fn create_room(&self, requested_id: &str) -> Result<String, VcError> {
            self.create_room_calls.fetch_add(1, Ordering::SeqCst);

            if self.fail_rooms {
                return Err(VcError::ProviderUnavailable(
                    "mock provider error".to_string(),
                ));
            }

            if let Ok(mut rooms) = self.rooms.lock() {
                rooms.insert(requested_id.to_string());
            }
            Ok(requested_id.to_string())
        }

        async fn create_connection(
            &self,
            session_id: &str,
            username: &str,
        ) -> Result<RtcConnection, VcError> {
            self.create_connection_calls.fetch_add(1, Ordering::SeqCst);

            if self.fail_connections {
                return Err(VcError::ProviderUnavailable(
                    "mock provider error".to_string(),
                ));
            }

            let connection_id =
                common::id::generate_prefixed_id("con").map_err(|_| VcError::Internal)?;
            let token = format!(
                "wss://mock.rtc?sessionId={}&token=tok_{}&user={}",
                session_id, connection_id, username
            );

            Ok(RtcConnection {
                connection_id,
                token,
            })
        }

        async fn close_room(&self, session_id: &str) -> Result<(), VcError> {
            self.close_room_calls.fetch_add(1, Ordering::SeqCst);

            if let Ok(mut rooms) = self.rooms.lock() {
                rooms.remove(session_id);
            }
            Ok(())
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_healthy_issues_unique_connections() {
            let mock = MockRtcClient::healthy();

            let room = mock.create_room("session_test1").await.unwrap();
            assert_eq!(room, "session_test1");
            assert!(mock.has_room("session_test1"));

            let c1 = mock.create_connection(&room, "alice").await.unwrap();
            let c2 = mock.create_connection(&room, "alice").await.unwrap();
            assert_ne!(c1.connection_id, c2.connection_id);
            assert!(c1.connection_id.starts_with("con_"));
            assert_eq!(mock.create_connection_calls(), 2);
        }

        #[tokio::test]
        async fn test_mock_failing_rooms() {
            let mock = MockRtcClient::failing_rooms();
            let result = mock.create_room("session_test1").await;
            assert!(matches!(result, Err(VcError::ProviderUnavailable(_))));
        }

        #[tokio::test]
        async fn test_mock_failing_connections() {
            let mock = MockRtcClient::failing_connections();

            // Rooms still work; only token issuance fails
            mock.create_room("session_test1").await.unwrap();
            let result = mock.create_connection("session_test1", "alice").await;
            assert!(matches!(result, Err(VcError::ProviderUnavailable(_))));
        }

        #[tokio::test]
        async fn test_mock_close_room_removes_tracking() {
            let mock = MockRtcClient::healthy();
            mock.create_room("session_test1").await.unwrap();
            mock.close_room("session_test1").await.unwrap();
            assert!(!mock.has_room("session_test1"));
            assert_eq!(mock.close_room_calls(), 1);
        }
    }
}
