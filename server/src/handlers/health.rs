//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the service is
//! running. Liveness only; it does not touch the store or the bus.

use axum::http::StatusCode;

/// Simple health check endpoint (for basic liveness).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
