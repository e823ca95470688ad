//! The SSE stream endpoint.
//!
//! Connection lifecycle: register on the bus, send the `connected` frame,
//! replay (resume token) or catch up (recent burst), then forward live bus
//! frames in publish order until the client goes away. Dropping the
//! response stream drops the bus subscription, which deregisters the
//! subscriber immediately. The server never reconnects anyone; that
//! responsibility belongs entirely to the client.

use crate::bus::Broadcast;
use crate::state::AppState;
use async_stream::stream;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
};
use chrono::Utc;
use metrics::counter;
use pulsefeed_core::{ActivityEvent, ConnectedPayload, EventId, frame_names};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, error, info};

/// Query parameters for `GET /api/activity/stream`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamParams {
    /// Resume token, equivalent to the `Last-Event-ID` header.
    pub last_event_id: Option<String>,
}

/// `GET /api/activity/stream`: the SSE fan-out endpoint.
///
/// Accepts a resume token via the `Last-Event-ID` header or the
/// `lastEventId` query parameter. With a token, buffered events after it
/// are replayed before live mode; without one, a bounded burst of the most
/// recent events is sent. An unparseable token is treated as absent.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<StreamParams>,
) -> impl IntoResponse {
    let token = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .or(params.last_event_id);
    let resume = token.as_deref().and_then(|raw| match raw.parse::<EventId>() {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(error = %e, token = raw, "ignoring unparseable resume token");
            None
        }
    });

    counter!("pulsefeed_stream_connections").increment(1);
    info!(resume = ?resume, "stream subscriber connected");

    // Register before snapshotting the replay so no publish can fall into
    // the gap; the id watermark below filters the overlap instead.
    let mut subscription = state.bus.subscribe();
    let replay = match resume {
        Some(id) => state.store.get_since(id, state.config.replay_limit),
        None => state.store.recent(state.config.catch_up_limit),
    };

    let frames = stream! {
        yield Ok::<_, Infallible>(json_frame(
            frame_names::CONNECTED,
            &ConnectedPayload::new(Utc::now()),
        ));

        let mut last_sent = resume;
        for event in replay {
            last_sent = Some(event.id);
            yield Ok(activity_frame(&event));
        }

        while let Some(broadcast) = subscription.recv().await {
            match broadcast {
                Broadcast::Activity(event) => {
                    if last_sent.is_some_and(|last| event.id <= last) {
                        continue;
                    }
                    last_sent = Some(event.id);
                    yield Ok(activity_frame(&event));
                }
                Broadcast::Heartbeat(heartbeat) => {
                    yield Ok(json_frame(frame_names::HEARTBEAT, &heartbeat));
                }
            }
        }
    };

    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        Sse::new(frames),
    )
}

/// An `activity` frame: the serialized event as data, its id as frame id.
fn activity_frame(event: &ActivityEvent) -> Event {
    json_frame(frame_names::ACTIVITY, event).id(event.id.to_string())
}

/// Build a named frame with a JSON payload.
///
/// Serialization of these payload types cannot realistically fail; if it
/// ever does, the frame degrades to an empty object rather than killing
/// the connection.
fn json_frame<T: Serialize>(name: &'static str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(data) => Event::default().event(name).data(data),
        Err(e) => {
            error!(error = %e, frame = name, "failed to serialize frame payload");
            Event::default().event(name).data("{}")
        }
    }
}
