//! # Pulsefeed Server
//!
//! The HTTP surface of the activity pipeline: signed ingestion, read-only
//! query/stats, and the SSE stream endpoint, glued together by an
//! in-process event bus.
//!
//! # Request Flow
//!
//! ```text
//! producer ──POST /api/activity──► IngestionGateway
//!                                    │  HMAC verify + field validation
//!                          ┌─────────┴──────────┐
//!                          ▼                    ▼
//!                   EventLogStore.append   EventBus.publish
//!                   (ring + disk writer)        │
//!                                               ▼
//! browser ◄──SSE /api/activity/stream─── StreamEndpoint
//!            connected / activity / heartbeat frames
//! ```
//!
//! One shared heartbeat task services every open stream; per-subscriber
//! frame queues are bounded, and a subscriber that cannot drain its queue
//! is disconnected rather than allowed to stall the broadcast loop.

pub mod auth;
pub mod bus;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use bus::{Broadcast, EventBus, spawn_heartbeat};
pub use config::ServerConfig;
pub use error::AppError;
pub use state::AppState;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Build the activity API router for the given state.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/activity",
            post(handlers::ingest::ingest).get(handlers::query::query),
        )
        .route("/api/activity/stats", get(handlers::query::stats))
        .route("/api/activity/stream", get(handlers::stream::stream))
        .route("/api/activity/test", post(handlers::ingest::inject_test_event))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
