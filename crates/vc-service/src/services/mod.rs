//! Service layer: session orchestration, transcript archive, shared
//! file registry, and the RTC provider client.

pub mod chat;
pub mod rtc_client;
pub mod shared_files;
pub mod video_call;

pub use chat::ChatService;
pub use rtc_client::mock::MockRtcClient;
pub use rtc_client::{OpenViduClient, RtcClient, RtcConnection};
pub use shared_files::SharedFileService;
pub use video_call::{RtcUrls, VideoCallService};
