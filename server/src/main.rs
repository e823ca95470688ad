//! Pulsefeed server binary.
//!
//! Configuration comes from environment variables:
//!
//! - `PULSEFEED_ADDR`: bind address (default `0.0.0.0:8787`)
//! - `PULSEFEED_DATA_DIR`: activity log directory (default `./data/activity`)
//! - `PULSEFEED_SIGNING_SECRET`: HMAC key for ingest signatures (required)
//! - `PULSEFEED_ALLOWED_ACTORS`: comma-separated actor allow-list (required)
//! - `PULSEFEED_ENABLE_TEST_INJECTOR`: set to `true` to enable the
//!   synthetic-event endpoint (never in production)
//! - `RUST_LOG`: tracing filter (default `info`)

use anyhow::Context;
use pulsefeed_server::{AppState, EventBus, ServerConfig, router, spawn_heartbeat};
use pulsefeed_store::{EventLogStore, StoreConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("PULSEFEED_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());
    let data_dir =
        std::env::var("PULSEFEED_DATA_DIR").unwrap_or_else(|_| "./data/activity".to_string());
    let signing_secret = std::env::var("PULSEFEED_SIGNING_SECRET")
        .context("PULSEFEED_SIGNING_SECRET must be set")?;
    let allowed_actors: Vec<String> = std::env::var("PULSEFEED_ALLOWED_ACTORS")
        .context("PULSEFEED_ALLOWED_ACTORS must be set")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let enable_test_injector = std::env::var("PULSEFEED_ENABLE_TEST_INJECTOR")
        .is_ok_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

    let store = Arc::new(EventLogStore::new(
        StoreConfig::builder().data_dir(&data_dir).build(),
    ));
    let replayed = store.hydrate().await.context("hydrating activity log")?;
    store.start();

    let config = ServerConfig::builder()
        .signing_secret(signing_secret.into_bytes())
        .allowed_actors(allowed_actors)
        .enable_test_injector(enable_test_injector)
        .build();

    let bus = EventBus::new(config.subscriber_queue);
    let heartbeat = spawn_heartbeat(bus.clone(), config.heartbeat_interval);

    let state = AppState::new(Arc::clone(&store), bus, config);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, replayed, data_dir, "pulsefeed server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    heartbeat.abort();
    store.shutdown().await;
    info!("pulsefeed server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
