use axum::http::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use crate::common::fake_remote::FakeRemote;
use crate::common::test_server;

/// GET the session until `predicate` holds or five seconds pass
async fn wait_for(
    server: &axum_test::TestServer,
    path: &str,
    predicate: impl Fn(&Value) -> bool,
) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let body: Value = server.get(path).await.json();
        if predicate(&body) || tokio::time::Instant::now() >= deadline {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// =============================================================================
// INTEGRATION TESTS - SERVICE
// =============================================================================

#[tokio::test]
async fn test_health_and_root() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    let health = server.get("/health").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());

    server.get("/").await.assert_text("Site Builder Integration Poller");
}

// =============================================================================
// INTEGRATION TESTS - START / STATUS
// =============================================================================

#[tokio::test]
async fn test_start_polls_until_configured() {
    let remote = FakeRemote::spawn(2).await;
    let (server, state) = test_server(&remote.base_url);

    let response = server
        .post("/polls/domain/site_1/start")
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let started: Value = response.json();
    assert_eq!(started["kind"], "domain");
    assert_eq!(started["subject_id"], "site_1");
    assert_eq!(started["phase"], "polling");
    assert_eq!(started["is_polling"], true);
    assert_eq!(started["latest_status"]["message"], "pending");

    let done = wait_for(&server, "/polls/domain/site_1", |body| body["completed"] == true).await;
    assert_eq!(done["phase"], "completed");
    assert_eq!(done["timed_out"], false);
    assert_eq!(done["retry_count"], 2);
    assert_eq!(done["latest_status"]["kind"], "domain");
    assert_eq!(done["latest_status"]["misconfigured"], false);
    assert_eq!(done["latest_status"]["domain"], "site_1.example.com");
    assert_eq!(remote.hits(), 2);
    assert_eq!(state.polls.active_sessions(), 0);
}

#[tokio::test]
async fn test_start_with_overrides_exhausts() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    let response = server
        .post("/polls/search-console/prop_9/start")
        .json(&json!({ "refresh_interval_ms": 100, "max_retries": 2 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let started: Value = response.json();
    assert_eq!(started["max_retries"], 2);
    assert_eq!(started["interval_ms"], 100);

    let done = wait_for(&server, "/polls/search-console/prop_9", |body| {
        body["is_polling"] == false
    })
    .await;
    assert_eq!(done["phase"], "exhausted");
    assert_eq!(done["timed_out"], true);
    assert_eq!(done["retry_count"], 2);
    assert!(done["error"].as_str().unwrap_or_default().contains("500"));
    assert_eq!(remote.hits(), 2);
}

#[tokio::test]
async fn test_start_without_body_uses_defaults() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    let response = server.post("/polls/search-console/prop_1/start").await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let started: Value = response.json();
    assert_eq!(started["kind"], "search-console");
    assert_eq!(started["is_polling"], true);
    // Configured search-console policy, no per-start overrides
    assert_eq!(started["max_retries"], 3);
    assert_eq!(started["interval_ms"], 100);
}

#[tokio::test]
async fn test_subject_with_slashes_stays_one_segment() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    // Decodes to `../../oauth/x`, which must not reach the oauth route
    server
        .post("/polls/domain/..%2F..%2Foauth%2Fx/start")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let done = wait_for(&server, "/polls/domain/..%2F..%2Foauth%2Fx", |body| {
        body["completed"] == true
    })
    .await;
    assert!(done["error"].is_null(), "got {}", done["error"]);
    assert_eq!(done["latest_status"]["kind"], "domain");
    assert_eq!(done["latest_status"]["domain"], "../../oauth/x.example.com");
    assert_eq!(remote.hits(), 1);
}

#[tokio::test]
async fn test_oauth_token_forwarded() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    server
        .post("/polls/oauth/acct_1/start")
        .json(&json!({ "token": "tok" }))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let done = wait_for(&server, "/polls/oauth/acct_1", |body| body["completed"] == true).await;
    assert_eq!(done["latest_status"]["authenticated"], true);
    assert_eq!(done["latest_status"]["message"], "Connected");
}

#[tokio::test]
async fn test_restart_replaces_session() {
    let remote = FakeRemote::spawn(1_000).await;
    let (server, state) = test_server(&remote.base_url);

    let first: Value = server
        .post("/polls/domain/site_1/start")
        .json(&json!({}))
        .await
        .json();
    let second: Value = server
        .post("/polls/domain/site_1/start")
        .json(&json!({}))
        .await
        .json();

    assert_ne!(first["session_id"], second["session_id"]);
    assert_eq!(state.polls.active_sessions(), 1);
}

// =============================================================================
// INTEGRATION TESTS - STOP
// =============================================================================

#[tokio::test]
async fn test_stop_session() {
    let remote = FakeRemote::spawn(1_000).await;
    let (server, state) = test_server(&remote.base_url);

    server
        .post("/polls/domain/site_1/start")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let stopped = server.post("/polls/domain/site_1/stop").await;
    stopped.assert_status_ok();
    let body: Value = stopped.json();
    assert_eq!(body["phase"], "stopped");
    assert_eq!(body["is_polling"], false);
    assert_eq!(body["interval_ms"], 0);

    // Stopping twice is harmless
    server.post("/polls/domain/site_1/stop").await.assert_status_ok();

    let hits = remote.hits();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(remote.hits() <= hits + 1, "at most one in-flight request after stop");
    assert_eq!(state.polls.active_sessions(), 0);
}

#[tokio::test]
async fn test_unknown_session_not_found() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    let response = server.get("/polls/domain/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("domain/nope"));

    server
        .post("/polls/domain/nope/stop")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// INTEGRATION TESTS - VALIDATION
// =============================================================================

#[tokio::test]
async fn test_unknown_kind_rejected() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    let response = server
        .post("/polls/billing/site_1/start")
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Unknown poll kind"));
}

#[tokio::test]
async fn test_blank_subject_rejected() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    let response = server
        .post("/polls/domain/%20%20/start")
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(remote.hits(), 0);
}

#[tokio::test]
async fn test_invalid_overrides_rejected() {
    let remote = FakeRemote::spawn(1).await;
    let (server, _) = test_server(&remote.base_url);

    server
        .post("/polls/domain/site_1/start")
        .json(&json!({ "max_retries": 0 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/polls/domain/site_1/start")
        .json(&json!({ "refresh_interval_ms": 10 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get("/polls/domain/site_1")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// INTEGRATION TESTS - VISIBILITY
// =============================================================================

#[tokio::test]
async fn test_hidden_dashboard_pauses_sessions() {
    let remote = FakeRemote::spawn(1_000).await;
    let (server, _) = test_server(&remote.base_url);

    let hidden = server
        .put("/polls/visibility")
        .json(&json!({ "visible": false }))
        .await;
    hidden.assert_status_ok();
    let body: Value = hidden.json();
    assert_eq!(body["visible"], false);
    assert_eq!(body["active_sessions"], 0);

    server
        .post("/polls/domain/site_1/start")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::ACCEPTED);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(remote.hits(), 0);

    let status: Value = server.get("/polls/domain/site_1").await.json();
    assert_eq!(status["is_polling"], true);
    assert_eq!(status["retry_count"], 0);

    let visible: Value = server
        .put("/polls/visibility")
        .json(&json!({ "visible": true }))
        .await
        .json();
    assert_eq!(visible["visible"], true);
    assert_eq!(visible["active_sessions"], 1);

    let resumed = wait_for(&server, "/polls/domain/site_1", |body| body["retry_count"] != 0).await;
    assert_ne!(resumed["retry_count"], 0);
    assert!(remote.hits() >= 1);
}
