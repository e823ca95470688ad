//! # Pulsefeed Store
//!
//! The authoritative event log for the Pulsefeed pipeline: a bounded
//! in-memory ring buffer fronting an append-only JSON-Lines file with
//! monthly/size-based rotation into gzip-compressed parts.
//!
//! # Architecture
//!
//! ```text
//! append(draft)
//!    │  dedup check + id assignment + ring push   (synchronous, one lock)
//!    ▼
//! ┌─────────────┐   mpsc (fire-and-forget)   ┌──────────────┐
//! │ Ring buffer │ ─────────────────────────► │ Disk writer  │
//! │ (hot window)│                            │ (one task)   │
//! └─────────────┘                            └──────┬───────┘
//!                                                   │ rotate on month
//!                                                   ▼ change / size cap
//!                                     activity.log + activity-YYYY-MM.N.log.gz
//! ```
//!
//! Durability is deliberately best-effort: disk and rotation failures are
//! logged and swallowed so the hot path never blocks on I/O. Replay across
//! restarts is bounded by the ring window via [`EventLogStore::hydrate`].

pub mod config;
pub mod disk;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::{ActivityStats, EventLogStore, QueryFilter};
