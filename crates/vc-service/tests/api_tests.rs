//! End-to-end HTTP tests against a spawned server.
//!
//! Drives the real router over TCP with reqwest; state assertions go
//! through the harness's context handles.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use serde_json::json;
use vc_test_utils::TestVcServer;

#[tokio::test]
async fn test_health_and_config_endpoints() -> Result<()> {
    let server = TestVcServer::spawn().await?;
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{}/v1/health", server.url()))
        .send()
        .await?;
    assert_eq!(health.status(), 200);
    let body: serde_json::Value = health.json().await?;
    assert_eq!(body["status"], "healthy");

    let config = client
        .get(format!("{}/v1/config", server.url()))
        .send()
        .await?;
    assert_eq!(config.status(), 200);
    let body: serde_json::Value = config.json().await?;
    assert_eq!(body["rtcServerUrl"], vc_test_utils::TEST_RTC_SERVER_URL);
    assert_eq!(body["features"]["chatEnabled"], true);

    // Metrics endpoint answers even without an installed recorder.
    let metrics = client
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;
    assert_eq!(metrics.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_quick_join_leave_end_flow() -> Result<()> {
    let server = TestVcServer::spawn().await?;
    let client = reqwest::Client::new();

    // Quick join creates the session
    let join = client
        .post(format!("{}/v1/sessions/quick-join", server.url()))
        .json(&json!({"sessionName": "room-A", "username": "alice"}))
        .send()
        .await?;
    assert_eq!(join.status(), 200);
    let bundle: serde_json::Value = join.json().await?;
    assert_eq!(bundle["isNewSession"], true);
    let session_id = bundle["sessionId"].as_str().unwrap().to_string();
    let connection_id = bundle["connectionId"].as_str().unwrap().to_string();

    // Status shows one connected participant
    let status = client
        .get(format!("{}/v1/sessions/{}/status", server.url(), session_id))
        .send()
        .await?;
    assert_eq!(status.status(), 200);
    let body: serde_json::Value = status.json().await?;
    assert_eq!(body["participantCount"], 1);
    assert_eq!(body["isActive"], true);

    // Leave is a 204, twice (idempotent)
    for _ in 0..2 {
        let leave = client
            .post(format!(
                "{}/v1/connections/{}/leave",
                server.url(),
                connection_id
            ))
            .send()
            .await?;
        assert_eq!(leave.status(), 204);
    }

    let status: serde_json::Value = client
        .get(format!("{}/v1/sessions/{}/status", server.url(), session_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(status["participantCount"], 0);

    // End the session; status flips
    let end = client
        .post(format!("{}/v1/sessions/{}/end", server.url(), session_id))
        .send()
        .await?;
    assert_eq!(end.status(), 204);

    let status: serde_json::Value = client
        .get(format!("{}/v1/sessions/{}/status", server.url(), session_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(status["isActive"], false);
    assert!(status["endedAt"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_quick_join_error_mapping() -> Result<()> {
    let server = TestVcServer::spawn().await?;
    let client = reqwest::Client::new();

    // Malformed body: 400, not Axum's default 422
    let malformed = client
        .post(format!("{}/v1/sessions/quick-join", server.url()))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(malformed.status(), 400);

    // Unknown session without auto-create: 404 with the domain code
    let missing = client
        .post(format!("{}/v1/sessions/quick-join", server.url()))
        .json(&json!({
            "sessionName": "room-A",
            "username": "alice",
            "autoCreateSession": false
        }))
        .send()
        .await?;
    assert_eq!(missing.status(), 404);
    let body: serde_json::Value = missing.json().await?;
    assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");

    // Unknown connection id on leave: 404
    let leave = client
        .post(format!("{}/v1/connections/con_missing/leave", server.url()))
        .send()
        .await?;
    assert_eq!(leave.status(), 404);
    let body: serde_json::Value = leave.json().await?;
    assert_eq!(body["error"]["code"], "PARTICIPANT_NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_auto_reconnect_over_http() -> Result<()> {
    let server = TestVcServer::spawn().await?;
    let client = reqwest::Client::new();

    let bundle: serde_json::Value = client
        .post(format!("{}/v1/sessions/quick-join", server.url()))
        .json(&json!({"sessionName": "room-A", "username": "alice"}))
        .send()
        .await?
        .json()
        .await?;
    let session_id = bundle["sessionId"].as_str().unwrap();
    let connection_id = bundle["connectionId"].as_str().unwrap();

    let reconnect: serde_json::Value = client
        .post(format!(
            "{}/v1/sessions/{}/auto-reconnect",
            server.url(),
            session_id
        ))
        .json(&json!({"username": "alice", "lastConnectionId": connection_id}))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(reconnect["isReconnection"], true);
    assert_ne!(reconnect["connectionId"], bundle["connectionId"]);

    // Two participant rows on the server: old (left) and new (connected)
    let rows = server.context().participants.rows_for_session(session_id);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|row| row.is_connected).count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_chat_save_and_history_over_http() -> Result<()> {
    let server = TestVcServer::spawn().await?;
    let client = reqwest::Client::new();

    let bundle: serde_json::Value = client
        .post(format!("{}/v1/sessions/quick-join", server.url()))
        .json(&json!({"sessionName": "room-A", "username": "alice"}))
        .send()
        .await?
        .json()
        .await?;
    let session_id = bundle["sessionId"].as_str().unwrap();

    let save_body = json!({
        "messages": [{
            "timestamp": "12:00:01",
            "participantId": bundle["connectionId"],
            "participantName": "alice",
            "message": "hello",
            "messageType": "chat"
        }],
        "sessionStartTime": "2026-08-06T10:00:00Z",
        "sessionEndTime": "2026-08-06T11:00:00Z",
        "savedBy": "alice"
    });

    let save = client
        .post(format!(
            "{}/v1/sessions/{}/chat/save",
            server.url(),
            session_id
        ))
        .json(&save_body)
        .send()
        .await?;
    assert_eq!(save.status(), 204);

    let history: serde_json::Value = client
        .get(format!(
            "{}/v1/sessions/{}/chat/history",
            server.url(),
            session_id
        ))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(history["totalMessages"], 1);
    assert_eq!(history["messages"][0]["message"], "hello");
    assert_eq!(history["savedBy"], "alice");

    // A lost save race maps to 409 CONCURRENT_MODIFICATION
    server.context().chat_logs.inject_conflict_once();
    let conflicted_body = json!({
        "messages": [
            save_body["messages"][0],
            {
                "timestamp": "12:00:02",
                "participantId": bundle["connectionId"],
                "participantName": "alice",
                "message": "bye",
                "messageType": "chat"
            }
        ],
        "sessionStartTime": "2026-08-06T10:00:00Z",
        "sessionEndTime": "2026-08-06T11:00:00Z",
        "savedBy": "alice"
    });
    let conflicted = client
        .post(format!(
            "{}/v1/sessions/{}/chat/save",
            server.url(),
            session_id
        ))
        .json(&conflicted_body)
        .send()
        .await?;
    assert_eq!(conflicted.status(), 409);
    let body: serde_json::Value = conflicted.json().await?;
    assert_eq!(body["error"]["code"], "CONCURRENT_MODIFICATION");

    Ok(())
}

#[tokio::test]
async fn test_shared_files_over_http() -> Result<()> {
    let server = TestVcServer::spawn().await?;
    let client = reqwest::Client::new();

    let bundle: serde_json::Value = client
        .post(format!("{}/v1/sessions/quick-join", server.url()))
        .json(&json!({"sessionName": "room-A", "username": "alice"}))
        .send()
        .await?
        .json()
        .await?;
    let session_id = bundle["sessionId"].as_str().unwrap();

    let upload = json!({
        "imageKey": "shared-materials/notes.pdf",
        "fileName": "notes.pdf",
        "fileSize": 2048,
        "contentType": "application/pdf",
        "uploadedByUserId": "user-1",
        "uploadedByName": "Alice"
    });

    let register = client
        .post(format!("{}/v1/sessions/{}/files", server.url(), session_id))
        .json(&upload)
        .send()
        .await?;
    assert_eq!(register.status(), 201);

    let duplicate = client
        .post(format!("{}/v1/sessions/{}/files", server.url(), session_id))
        .json(&upload)
        .send()
        .await?;
    assert_eq!(duplicate.status(), 409);
    let body: serde_json::Value = duplicate.json().await?;
    assert_eq!(body["error"]["code"], "FILE_ALREADY_EXISTS");

    let listing: serde_json::Value = client
        .get(format!("{}/v1/sessions/{}/files", server.url(), session_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listing["totalCount"], 1);

    // Only the uploader may delete
    let forbidden = client
        .delete(format!(
            "{}/v1/sessions/{}/files/{}?requestedBy=user-2",
            server.url(),
            session_id,
            "shared-materials%2Fnotes.pdf"
        ))
        .send()
        .await?;
    assert_eq!(forbidden.status(), 403);

    let deleted = client
        .delete(format!(
            "{}/v1/sessions/{}/files/{}?requestedBy=user-1",
            server.url(),
            session_id,
            "shared-materials%2Fnotes.pdf"
        ))
        .send()
        .await?;
    assert_eq!(deleted.status(), 204);

    assert!(server.context().shared_files.all_rows().is_empty());

    Ok(())
}
