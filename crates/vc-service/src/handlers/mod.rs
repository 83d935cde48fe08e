//! HTTP request handlers.

pub mod chat;
pub mod files;
pub mod health;
pub mod sessions;

pub use chat::{get_chat_history, save_chat_history};
pub use files::{delete_shared_file, list_shared_files, register_shared_file};
pub use health::{health_check, render_metrics};
pub use sessions::{
    auto_reconnect, end_session, get_session_status, join_session, leave_session, quick_join,
    refresh_token, session_config,
};
