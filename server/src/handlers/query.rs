//! Read-only query and stats endpoints.
//!
//! Both read the ring buffer only; neither touches disk. They are
//! unauthenticated: the activity feed is an admin surface, and access
//! control sits in front of the service.

use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use pulsefeed_core::ActivityEvent;
use pulsefeed_store::{ActivityStats, QueryFilter};
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /api/activity`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Maximum number of events to return (default 50).
    pub limit: Option<usize>,
    /// Only events by this actor name.
    pub author: Option<String>,
    /// Only events with this action type.
    pub action_type: Option<String>,
}

/// Response body for `GET /api/activity`.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Always `true` for successful queries.
    pub ok: bool,
    /// Matching events, most recent first.
    pub data: Vec<ActivityEvent>,
}

/// `GET /api/activity`: filtered view of the ring buffer.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Json<QueryResponse> {
    let filter = QueryFilter {
        limit: params.limit,
        author: params.author,
        action_type: params.action_type,
    };
    Json(QueryResponse {
        ok: true,
        data: state.store.query(&filter),
    })
}

/// Response body for `GET /api/activity/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Always `true` for successful queries.
    pub ok: bool,
    /// Trailing-24h aggregates.
    #[serde(flatten)]
    pub stats: ActivityStats,
}

/// `GET /api/activity/stats`: trailing-24h aggregates.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        ok: true,
        stats: state.store.stats(),
    })
}
