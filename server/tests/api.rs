//! HTTP contract tests for ingestion, query, and stats.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use pulsefeed_server::auth::sign_payload;
use pulsefeed_server::{AppState, EventBus, ServerConfig, router};
use pulsefeed_store::{EventLogStore, StoreConfig};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &[u8] = b"api-test-secret";

fn test_server(dedup_window: Duration, enable_injector: bool) -> TestServer {
    let store = Arc::new(EventLogStore::new(
        StoreConfig::builder()
            .dedup_window(dedup_window)
            .data_dir("/nonexistent/never-started-in-these-tests")
            .build(),
    ));
    let config = ServerConfig::builder()
        .signing_secret(SECRET.to_vec())
        .allowed_actors(["claude", "deploy-bot"])
        .enable_test_injector(enable_injector)
        .build();
    let bus = EventBus::new(config.subscriber_queue);
    let state = AppState::new(store, bus, config);
    TestServer::new(router(state)).expect("test server should build")
}

fn event_payload(action: &str) -> Value {
    json!({
        "author": {"name": "claude", "type": "ai"},
        "actionType": action,
        "summary": format!("performed {action}"),
        "details": {"file": "src/booking.tsx"},
        "timestamp": Utc::now().to_rfc3339(),
    })
}

fn signed(mut payload: Value) -> Value {
    let sig = sign_payload(SECRET, &payload);
    payload["sig"] = json!(sig);
    payload
}

#[tokio::test]
async fn signed_event_is_accepted_and_queryable() {
    let server = test_server(Duration::ZERO, false);

    let response = server
        .post("/api/activity")
        .json(&signed(event_payload("file_edit")))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["verified"], true);
    assert!(body["id"].as_str().is_some());

    let query: Value = server.get("/api/activity").await.json();
    assert_eq!(query["ok"], true);
    let data = query["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["actionType"], "file_edit");
    assert_eq!(data[0]["id"], body["id"]);
    assert_eq!(data[0]["verified"], true);
}

#[tokio::test]
async fn header_signature_is_equivalent_to_body_field() {
    let server = test_server(Duration::ZERO, false);

    let payload = event_payload("deploy");
    let sig = sign_payload(SECRET, &payload);
    let response = server
        .post("/api/activity")
        .add_header(
            HeaderName::from_static("x-activity-signature"),
            HeaderValue::from_str(&sig).unwrap(),
        )
        .json(&payload)
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn missing_signature_is_forbidden() {
    let server = test_server(Duration::ZERO, false);
    let response = server.post("/api/activity").json(&event_payload("x")).await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Nothing reached the store.
    let query: Value = server.get("/api/activity").await.json();
    assert!(query["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn tampered_signature_is_forbidden() {
    let server = test_server(Duration::ZERO, false);
    let mut payload = signed(event_payload("deploy"));
    payload["summary"] = json!("altered after signing");
    let response = server.post("/api/activity").json(&payload).await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_actor_is_rejected_with_400() {
    let server = test_server(Duration::ZERO, false);
    let mut payload = event_payload("deploy");
    payload["author"]["name"] = json!("intruder");
    let response = server.post("/api/activity").json(&signed(payload)).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_fields_are_rejected_with_400() {
    let server = test_server(Duration::ZERO, false);
    let mut payload = event_payload("deploy");
    payload.as_object_mut().unwrap().remove("timestamp");
    let response = server.post("/api/activity").json(&signed(payload)).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let mut payload = event_payload("deploy");
    payload["summary"] = json!("");
    let response = server.post("/api/activity").json(&signed(payload)).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_within_window_coalesces_without_id() {
    let server = test_server(Duration::from_secs(3), false);

    let first: Value = server
        .post("/api/activity")
        .json(&signed(event_payload("file_edit")))
        .await
        .json();
    assert!(first["id"].as_str().is_some());

    let second: Value = server
        .post("/api/activity")
        .json(&signed(event_payload("file_edit")))
        .await
        .json();
    assert_eq!(second["ok"], true);
    assert!(second.get("id").is_none());

    let query: Value = server.get("/api/activity").await.json();
    assert_eq!(query["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn query_filters_and_stats_aggregate() {
    let server = test_server(Duration::ZERO, false);
    for (actor, action) in [
        ("claude", "file_edit"),
        ("claude", "test_run"),
        ("deploy-bot", "deploy"),
    ] {
        let mut payload = event_payload(action);
        payload["author"]["name"] = json!(actor);
        server
            .post("/api/activity")
            .json(&signed(payload))
            .await
            .assert_status_ok();
    }

    let filtered: Value = server
        .get("/api/activity")
        .add_query_param("author", "claude")
        .await
        .json();
    assert_eq!(filtered["data"].as_array().unwrap().len(), 2);

    let limited: Value = server
        .get("/api/activity")
        .add_query_param("limit", "1")
        .await
        .json();
    assert_eq!(limited["data"].as_array().unwrap().len(), 1);
    // Most recent first.
    assert_eq!(limited["data"][0]["actionType"], "deploy");

    let stats: Value = server.get("/api/activity/stats").await.json();
    assert_eq!(stats["ok"], true);
    assert_eq!(stats["count"], 3);
    assert_eq!(stats["byActor"]["claude"], 2);
    assert_eq!(stats["byActor"]["deploy-bot"], 1);
    assert_eq!(stats["byType"]["deploy"], 1);
}

#[tokio::test]
async fn injector_refuses_when_disabled() {
    let server = test_server(Duration::ZERO, false);
    let response = server.post("/api/activity/test").await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn injector_works_when_enabled() {
    let server = test_server(Duration::ZERO, true);
    let response = server
        .post("/api/activity/test")
        .json(&json!({"actionType": "smoke_test"}))
        .await;
    response.assert_status_ok();

    let query: Value = server.get("/api/activity").await.json();
    let data = query["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["actionType"], "smoke_test");
    assert_eq!(data[0]["author"]["name"], "test-harness");
    assert_eq!(data[0]["verified"], false);
}

#[tokio::test]
async fn health_is_alive() {
    let server = test_server(Duration::ZERO, false);
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}
