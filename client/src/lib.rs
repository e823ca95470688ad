//! # Pulsefeed Client
//!
//! A resilient consumer for the Pulsefeed SSE stream: multiplexed
//! transport sharing, automatic reconnection with exponential backoff,
//! resume-token tracking, and a pure connection-health state machine for
//! UI consumption.
//!
//! # Architecture
//!
//! ```text
//! subscribe(url, handlers, options) ─┐
//! subscribe(url, handlers, options) ─┼─► one shared transport per
//! subscribe(url, handlers, options) ─┘   (url, credentials, query) key
//!                                          │
//!                         ┌────────────────┴───────────────┐
//!                         │ connect ──► read frames ──► …  │
//!                         │    ▲            │ error        │
//!                         │    └── backoff ◄┘              │
//!                         └────────────────────────────────┘
//! ```
//!
//! The first subscriber for a key creates the transport; the last one to
//! unsubscribe tears it down, including any pending reconnect timer. Each
//! incoming frame's id is recorded and presented as `Last-Event-ID` on the
//! next connection attempt, bounding data loss to whatever the server's
//! ring buffer still retains.

pub mod backoff;
pub mod error;
pub mod manager;
pub mod sse;
pub mod state;
mod transport;

pub use backoff::{Backoff, ReconnectPolicy};
pub use error::StreamError;
pub use manager::{
    CredentialsMode, ManagerConfig, StreamHandlers, StreamManager, SubscribeOptions, Subscription,
};
pub use sse::RawFrame;
pub use state::{ConnectionEvent, ConnectionState};
