//! Integration tests for join, leave, status, token refresh and end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use vc_service::errors::VcError;
use vc_service::repositories::SessionStore;
use vc_test_utils::TestContext;

#[tokio::test]
async fn test_join_session_requires_existing_session() {
    let ctx = TestContext::new();

    let result = ctx.video_call.join_session("session_missing", "alice").await;
    assert!(matches!(result, Err(VcError::SessionNotFound(_))));

    // join never creates
    assert!(ctx.sessions.all_rows().is_empty());
}

#[tokio::test]
async fn test_join_session_joins_active_session() {
    let ctx = TestContext::new();

    let created = ctx
        .video_call
        .quick_join(None, Some("room-A"), "alice", true)
        .await
        .unwrap();

    let joined = ctx
        .video_call
        .join_session(&created.session_id, "bob")
        .await
        .unwrap();

    assert_eq!(joined.session_id, created.session_id);
    assert_eq!(joined.username, "bob");
    assert_eq!(ctx.participants.rows_for_session(&created.session_id).len(), 2);
}

#[tokio::test]
async fn test_leave_session_is_idempotent() {
    let ctx = TestContext::new();

    let bundle = ctx
        .video_call
        .quick_join(None, Some("room-A"), "alice", true)
        .await
        .unwrap();

    ctx.video_call
        .leave_session(&bundle.connection_id)
        .await
        .unwrap();
    let after_first: Vec<_> = ctx.participants.rows_for_session(&bundle.session_id);

    // Second leave is a no-op, not an error, and changes nothing.
    ctx.video_call
        .leave_session(&bundle.connection_id)
        .await
        .unwrap();
    let after_second: Vec<_> = ctx.participants.rows_for_session(&bundle.session_id);

    assert_eq!(after_first.len(), 1);
    let row_first = after_first.first().unwrap();
    let row_second = after_second.first().unwrap();
    assert!(!row_first.is_connected);
    assert!(row_first.left_at.is_some());
    assert_eq!(row_first.left_at, row_second.left_at);
}

#[tokio::test]
async fn test_leave_unknown_connection_fails() {
    let ctx = TestContext::new();

    let result = ctx.video_call.leave_session("con_missing").await;
    assert!(matches!(result, Err(VcError::ParticipantNotFound(_))));
}

#[tokio::test]
async fn test_status_counts_only_connected_participants() {
    let ctx = TestContext::new();

    let alice = ctx
        .video_call
        .quick_join(None, Some("room-A"), "alice", true)
        .await
        .unwrap();
    let bob = ctx
        .video_call
        .quick_join(None, Some("room-A"), "bob", true)
        .await
        .unwrap();

    ctx.video_call.leave_session(&alice.connection_id).await.unwrap();

    let status = ctx
        .video_call
        .get_session_status(&bob.session_id)
        .await
        .unwrap();

    // Two joins, one leave: exactly one connected participant.
    assert_eq!(status.participant_count, 1);
    assert_eq!(status.participants.len(), 1);
    assert_eq!(status.participants.first().unwrap().username, "bob");
    assert!(status.is_active);
    assert!(status.ended_at.is_none());
}

#[tokio::test]
async fn test_status_unknown_session_fails() {
    let ctx = TestContext::new();

    let result = ctx.video_call.get_session_status("session_missing").await;
    assert!(matches!(result, Err(VcError::SessionNotFound(_))));
}

#[tokio::test]
async fn test_status_works_for_ended_session() {
    let ctx = TestContext::new();

    let bundle = ctx
        .video_call
        .quick_join(None, Some("room-A"), "alice", true)
        .await
        .unwrap();
    ctx.video_call.end_session(&bundle.session_id).await.unwrap();

    let status = ctx
        .video_call
        .get_session_status(&bundle.session_id)
        .await
        .unwrap();

    assert!(!status.is_active);
    assert!(status.ended_at.is_some());
}

#[tokio::test]
async fn test_end_session_is_idempotent_and_sets_ended_at_once() {
    let ctx = TestContext::new();

    let bundle = ctx
        .video_call
        .quick_join(None, Some("room-A"), "alice", true)
        .await
        .unwrap();

    ctx.video_call.end_session(&bundle.session_id).await.unwrap();
    let first = ctx
        .sessions
        .find_by_session_id(&bundle.session_id)
        .await
        .unwrap()
        .unwrap();

    ctx.video_call.end_session(&bundle.session_id).await.unwrap();
    let second = ctx
        .sessions
        .find_by_session_id(&bundle.session_id)
        .await
        .unwrap()
        .unwrap();

    assert!(!first.is_active);
    assert_eq!(first.ended_at, second.ended_at);

    // Provider room close only happens on the actual transition.
    assert_eq!(ctx.rtc.close_room_calls(), 1);
    assert!(!ctx.rtc.has_room(&bundle.session_id));
}

#[tokio::test]
async fn test_end_unknown_session_fails() {
    let ctx = TestContext::new();

    let result = ctx.video_call.end_session("session_missing").await;
    assert!(matches!(result, Err(VcError::SessionNotFound(_))));
}

#[tokio::test]
async fn test_refresh_token_appends_row_and_leaves_old_untouched() {
    let ctx = TestContext::new();

    let original = ctx
        .video_call
        .quick_join(None, Some("room-A"), "alice", true)
        .await
        .unwrap();

    let refreshed = ctx
        .video_call
        .refresh_token(&original.session_id, "alice")
        .await
        .unwrap();

    assert_eq!(refreshed.is_token_refresh, Some(true));
    assert_ne!(refreshed.connection_id, original.connection_id);
    assert_ne!(refreshed.token, original.token);

    // The old row is not automatically marked left.
    let rows = ctx.participants.rows_for_session(&original.session_id);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.is_connected));
}

#[tokio::test]
async fn test_refresh_token_requires_active_session() {
    let ctx = TestContext::new();

    let bundle = ctx
        .video_call
        .quick_join(None, Some("room-A"), "alice", true)
        .await
        .unwrap();
    ctx.video_call.end_session(&bundle.session_id).await.unwrap();

    let result = ctx
        .video_call
        .refresh_token(&bundle.session_id, "alice")
        .await;
    assert!(matches!(result, Err(VcError::SessionNotFound(_))));
}
