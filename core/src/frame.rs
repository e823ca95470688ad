//! The SSE frame vocabulary shared by the stream endpoint and the client.
//!
//! The stream speaks three frame types: `connected` (sent once per
//! connection before replay), `activity` (one per event, with the event's
//! encoded id as the frame id), and `heartbeat` (shared-timer keep-alive).
//! This module holds the frame names and the small JSON payloads of the
//! non-event frames; `activity` frames carry a serialized
//! [`ActivityEvent`](crate::ActivityEvent) directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame (SSE `event:`) names used on the stream.
pub mod frame_names {
    /// Sent once when a connection is established, before any replay.
    pub const CONNECTED: &str = "connected";
    /// Carries one JSON-serialized activity event; frame id = event id.
    pub const ACTIVITY: &str = "activity";
    /// Periodic keep-alive from the shared server heartbeat timer.
    pub const HEARTBEAT: &str = "heartbeat";
}

/// Payload of the `connected` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    /// Always `true`; present so the payload is self-describing.
    pub ok: bool,
    /// Server wall-clock time at connection setup.
    pub now: DateTime<Utc>,
}

impl ConnectedPayload {
    /// Build the payload for a connection established at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self { ok: true, now }
    }
}

/// Payload of the `heartbeat` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    /// Server wall-clock time at the heartbeat tick.
    pub now: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connected_payload_shape() {
        let now: DateTime<Utc> = "2025-11-01T12:00:00Z".parse().unwrap();
        let json = serde_json::to_value(ConnectedPayload::new(now)).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["now"], "2025-11-01T12:00:00Z");
    }

    #[test]
    fn heartbeat_roundtrip() {
        let now: DateTime<Utc> = "2025-11-01T12:00:25Z".parse().unwrap();
        let json = serde_json::to_string(&HeartbeatPayload { now }).unwrap();
        let back: HeartbeatPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.now, now);
    }
}
