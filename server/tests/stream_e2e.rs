//! End-to-end pipeline test: signed ingest → query → SSE catch-up → live
//! delivery → resume replay, over a real socket with the real client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use futures::StreamExt;
use pulsefeed_client::sse::FrameParser;
use pulsefeed_client::{StreamHandlers, StreamManager, SubscribeOptions};
use pulsefeed_server::auth::sign_payload;
use pulsefeed_server::{AppState, EventBus, ServerConfig, router, spawn_heartbeat};
use pulsefeed_store::{EventLogStore, StoreConfig};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const SECRET: &[u8] = b"e2e-secret";
const WAIT: Duration = Duration::from_secs(10);

async fn spawn_server(data_dir: &Path) -> String {
    let store = Arc::new(EventLogStore::new(
        StoreConfig::builder()
            .dedup_window(Duration::ZERO)
            .data_dir(data_dir)
            .build(),
    ));
    store.start();

    let config = ServerConfig::builder()
        .signing_secret(SECRET.to_vec())
        .allowed_actors(["claude"])
        .heartbeat_interval(Duration::from_millis(200))
        .build();
    let bus = EventBus::new(config.subscriber_queue);
    let _heartbeat = spawn_heartbeat(bus.clone(), config.heartbeat_interval);

    let state = AppState::new(store, bus, config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn signed_event(action: &str) -> Value {
    let mut payload = json!({
        "author": {"name": "claude", "type": "ai"},
        "actionType": action,
        "summary": format!("performed {action}"),
        "details": {"file": format!("src/{action}.rs")},
        "timestamp": Utc::now().to_rfc3339(),
    });
    let sig = sign_payload(SECRET, &payload);
    payload["sig"] = json!(sig);
    payload
}

async fn ingest(http: &reqwest::Client, base: &str, action: &str) -> String {
    let response = http
        .post(format!("{base}/api/activity"))
        .json(&signed_event(action))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn ingest_stream_and_resume_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let http = reqwest::Client::new();

    // Ingest signed event A; query sees it.
    let id_a = ingest(&http, &base, "event_a").await;
    let query: Value = http
        .get(format!("{base}/api/activity"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(query["data"].as_array().unwrap().len(), 1);
    assert_eq!(query["data"][0]["id"], json!(id_a));

    // Fresh subscription (no resume token): the catch-up burst carries A.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let manager = StreamManager::new();
    let subscription = manager.subscribe(
        format!("{base}/api/activity/stream"),
        StreamHandlers::new().on_event(move |event| {
            let _ = event_tx.send(event);
        }),
        SubscribeOptions::default(),
    );

    let caught_up = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert_eq!(caught_up.id.to_string(), id_a);
    assert_eq!(caught_up.action_type, "event_a");

    // Ingest B while connected: delivered live, in order.
    let id_b = ingest(&http, &base, "event_b").await;
    let live = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert_eq!(live.id.to_string(), id_b);
    assert_eq!(live.verified, Some(true));

    subscription.unsubscribe();
    assert_eq!(manager.active_transports(), 0);

    // Reconnect with resume token = A's id: replay is exactly [B].
    let response = http
        .get(format!("{base}/api/activity/stream"))
        .header("Last-Event-ID", &id_a)
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"))
    );

    let mut byte_stream = response.bytes_stream();
    let mut parser = FrameParser::new();
    let mut frames = Vec::new();
    'read: loop {
        let chunk = timeout(WAIT, byte_stream.next())
            .await
            .expect("stream should produce frames before the deadline")
            .unwrap()
            .unwrap();
        for frame in parser.push(&String::from_utf8_lossy(&chunk)) {
            // The shared heartbeat timer marks the end of the replay burst.
            if frame.event == "heartbeat" {
                break 'read;
            }
            frames.push(frame);
        }
    }

    assert_eq!(frames[0].event, "connected");
    let activities: Vec<_> = frames.iter().filter(|f| f.event == "activity").collect();
    assert_eq!(activities.len(), 1, "resume must replay exactly [B]");
    assert_eq!(activities[0].id.as_deref(), Some(id_b.as_str()));
    let replayed: Value = serde_json::from_str(&activities[0].data).unwrap();
    assert_eq!(replayed["actionType"], "event_b");
}

#[tokio::test]
async fn resume_with_latest_id_replays_nothing_but_stays_live() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let http = reqwest::Client::new();

    let _ = ingest(&http, &base, "event_a").await;
    let id_b = ingest(&http, &base, "event_b").await;

    let response = http
        .get(format!("{base}/api/activity/stream?lastEventId={id_b}"))
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let mut byte_stream = response.bytes_stream();
    let mut parser = FrameParser::new();
    let mut frames = Vec::new();
    'read: loop {
        let chunk = timeout(WAIT, byte_stream.next())
            .await
            .expect("stream should produce frames before the deadline")
            .unwrap()
            .unwrap();
        for frame in parser.push(&String::from_utf8_lossy(&chunk)) {
            if frame.event == "heartbeat" {
                break 'read;
            }
            frames.push(frame);
        }
    }

    // Caught-up subscriber: connected frame, no activity replay.
    assert_eq!(frames[0].event, "connected");
    assert!(frames.iter().all(|f| f.event != "activity"));
}
