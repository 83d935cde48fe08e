//! Pre-wired service fixtures.
//!
//! `TestContext` bundles the in-memory stores, a mock RTC client and
//! the three services exactly as `main` wires their production
//! counterparts, while keeping the concrete handles around for state
//! assertions.

use crate::memory_stores::{
    MemoryChatLogStore, MemoryParticipantStore, MemorySessionStore, MemorySharedFileStore,
};
use std::sync::Arc;
use vc_service::routes::AppState;
use vc_service::services::{
    ChatService, MockRtcClient, RtcUrls, SharedFileService, VideoCallService,
};

/// RTC URLs used by test bundles.
pub const TEST_RTC_SERVER_URL: &str = "https://rtc.test.crema.dev";

/// Everything a service-level test needs, pre-wired.
pub struct TestContext {
    pub sessions: Arc<MemorySessionStore>,
    pub participants: Arc<MemoryParticipantStore>,
    pub chat_logs: Arc<MemoryChatLogStore>,
    pub shared_files: Arc<MemorySharedFileStore>,
    pub rtc: Arc<MockRtcClient>,
    pub video_call: VideoCallService,
    pub chat: ChatService,
    pub files: SharedFileService,
}

impl TestContext {
    /// Context with a healthy mock provider.
    pub fn new() -> Self {
        Self::with_rtc(Arc::new(MockRtcClient::healthy()))
    }

    /// Context with a caller-configured mock provider.
    pub fn with_rtc(rtc: Arc<MockRtcClient>) -> Self {
        let sessions = Arc::new(MemorySessionStore::new());
        let participants = Arc::new(MemoryParticipantStore::new());
        let chat_logs = Arc::new(MemoryChatLogStore::new());
        let shared_files = Arc::new(MemorySharedFileStore::new());

        let rtc_urls = RtcUrls {
            server_url: TEST_RTC_SERVER_URL.to_string(),
            web_socket_url: TEST_RTC_SERVER_URL.replacen("https://", "wss://", 1),
        };

        let video_call = VideoCallService::new(
            sessions.clone(),
            participants.clone(),
            rtc.clone(),
            rtc_urls,
        );
        let chat = ChatService::new(chat_logs.clone(), sessions.clone(), participants.clone());
        let files = SharedFileService::new(shared_files.clone(), sessions.clone());

        Self {
            sessions,
            participants,
            chat_logs,
            shared_files,
            rtc,
            video_call,
            chat,
            files,
        }
    }

    /// Application state for router-level tests, sharing this context's
    /// stores and services.
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            video_call: self.video_call.clone(),
            chat: self.chat.clone(),
            files: self.files.clone(),
            sessions: self.sessions.clone(),
            metrics_handle: None,
        })
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
