//! # Pulsefeed Core
//!
//! Core types for the Pulsefeed activity pipeline: the activity event model,
//! composite monotonic event ids, the typed SSE frame vocabulary, and the
//! bounded ring buffer backing the in-memory event log.
//!
//! ## Core Concepts
//!
//! - **`ActivityEvent`**: an immutable fact about something an actor did,
//!   identified by a strictly increasing [`EventId`]
//! - **`EventId`**: a `(millisecond timestamp, tie-break counter)` composite
//!   key with a stable, order-preserving string encoding for the wire
//! - **`RingBuffer`**: fixed-capacity FIFO with oldest-first eviction, the
//!   authoritative hot window of recent activity
//! - **Frames**: the `connected` / `activity` / `heartbeat` vocabulary shared
//!   by the stream endpoint and the client consumer
//!
//! Everything in this crate is pure data: no I/O, no clocks, no sockets.
//! The store, server, and client crates compose these types into the actual
//! pipeline.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod event;
pub mod event_id;
pub mod frame;
pub mod ring;

pub use event::{ActivityEvent, Actor, DetailValue, EventDraft};
pub use event_id::{EventId, ParseEventIdError};
pub use frame::{ConnectedPayload, HeartbeatPayload, frame_names};
pub use ring::RingBuffer;
