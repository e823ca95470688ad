//! The event log store: ring buffer, id assignment, dedup, and replay.

use crate::config::StoreConfig;
use crate::disk::{LIVE_FILE, LogWriter};
use crate::error::StoreError;
use chrono::{Duration as ChronoDuration, Utc};
use metrics::{counter, gauge};
use pulsefeed_core::{ActivityEvent, DetailValue, EventDraft, EventId, RingBuffer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Filter for [`EventLogStore::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Maximum number of events to return; `None` means the default of 50.
    pub limit: Option<usize>,
    /// Only events by this actor name.
    pub author: Option<String>,
    /// Only events with this action type.
    pub action_type: Option<String>,
}

/// Default `limit` for [`EventLogStore::query`].
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Aggregated counts over the trailing 24 hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    /// Total events in the window.
    pub count: u64,
    /// Events per actor name.
    pub by_actor: BTreeMap<String, u64>,
    /// Events per action type.
    pub by_type: BTreeMap<String, u64>,
}

struct Inner {
    ring: RingBuffer<ActivityEvent>,
    last_id: Option<EventId>,
}

struct WriterHandle {
    tx: mpsc::UnboundedSender<ActivityEvent>,
    task: JoinHandle<()>,
}

/// Authoritative in-memory event log with best-effort disk persistence.
///
/// The store owns the bounded ring buffer of recent events and assigns the
/// strictly increasing [`EventId`]s. Buffer mutation, dedup, and id
/// assignment happen in one synchronous critical section, so two `append`
/// calls can never interleave; persistence is handed to a single background
/// writer task through a non-blocking channel and can never stall or fail
/// an append.
///
/// # Lifecycle
///
/// Construct with [`new`](Self::new), optionally [`hydrate`](Self::hydrate)
/// from the live log, then [`start`](Self::start) the disk writer (requires
/// a Tokio runtime). [`shutdown`](Self::shutdown) drains outstanding writes.
/// Instances are plain values: tests build as many isolated copies as they
/// like, nothing is process-global.
pub struct EventLogStore {
    config: StoreConfig,
    inner: Mutex<Inner>,
    writer: Mutex<Option<WriterHandle>>,
}

impl EventLogStore {
    /// Create a store with the given configuration. No I/O happens here.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            inner: Mutex::new(Inner {
                ring: RingBuffer::new(capacity),
                last_id: None,
            }),
            writer: Mutex::new(None),
        }
    }

    /// Spawn the disk-writer task. Idempotent.
    ///
    /// Events appended before `start` are buffered in memory only; call
    /// [`hydrate`](Self::hydrate) before `start` so replayed history is not
    /// written back out to the file it came from.
    pub fn start(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if writer.is_some() {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(LogWriter::new(&self.config).run(rx));
        *writer = Some(WriterHandle { tx, task });
    }

    /// Stop the disk writer after draining all queued writes.
    pub async fn shutdown(&self) {
        let handle = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            drop(handle.tx);
            let _ = handle.task.await;
        }
    }

    /// Append a draft event, returning the stored event.
    ///
    /// Returns `None` when the draft coalesced into the most recent buffered
    /// event: same dedup key `(author name, action type, details["file"])`
    /// and accepted within the dedup window. Otherwise the draft is assigned
    /// the next monotonic id, pushed into the ring buffer (evicting the
    /// oldest at capacity), and queued for the disk writer.
    pub fn append(&self, draft: EventDraft) -> Option<ActivityEvent> {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);

        let event = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(last) = inner.ring.latest() {
                let age_ms = now_ms.saturating_sub(last.id.timestamp_ms());
                let window_ms = u64::try_from(self.config.dedup_window.as_millis()).unwrap_or(u64::MAX);
                if age_ms < window_ms && same_dedup_key(last, &draft) {
                    counter!("pulsefeed_events_deduped").increment(1);
                    debug!(author = %draft.author.name, action = %draft.action_type, "coalesced duplicate event");
                    return None;
                }
            }

            let id = match inner.last_id {
                Some(last) => last.next(now_ms),
                None => EventId::new(now_ms, 0),
            };
            inner.last_id = Some(id);

            let event = draft.into_event(id);
            inner.ring.push(event.clone());
            gauge!("pulsefeed_buffered_events").set(inner.ring.len() as f64);
            event
        };

        counter!("pulsefeed_events_appended").increment(1);

        // Fire-and-forget persistence: an unstarted or stopped writer just
        // means the event stays memory-only.
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = writer.as_ref() {
            let _ = handle.tx.send(event.clone());
        }

        Some(event)
    }

    /// Buffered events matching `filter`, most recent first.
    #[must_use]
    pub fn query(&self, filter: &QueryFilter) -> Vec<ActivityEvent> {
        let limit = filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .ring
            .iter()
            .rev()
            .filter(|e| filter.author.as_deref().is_none_or(|a| e.author.name == a))
            .filter(|e| {
                filter
                    .action_type
                    .as_deref()
                    .is_none_or(|t| e.action_type == t)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Buffered events with ids strictly greater than `since`, ascending,
    /// capped at `limit`.
    ///
    /// If `since` predates the ring window, only what the buffer still
    /// retains is returned; older history is not reconstructed from disk.
    #[must_use]
    pub fn get_since(&self, since: EventId, limit: usize) -> Vec<ActivityEvent> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .ring
            .iter()
            .filter(|e| e.id > since)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The `limit` most recent buffered events, ascending.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<ActivityEvent> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut events: Vec<_> = inner.ring.iter().rev().take(limit).cloned().collect();
        events.reverse();
        events
    }

    /// Counts over the trailing 24 hours, grouped by actor and action type.
    #[must_use]
    pub fn stats(&self) -> ActivityStats {
        let cutoff = Utc::now() - ChronoDuration::hours(24);
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let mut stats = ActivityStats {
            count: 0,
            by_actor: BTreeMap::new(),
            by_type: BTreeMap::new(),
        };
        for event in inner.ring.iter().filter(|e| e.timestamp >= cutoff) {
            stats.count += 1;
            *stats.by_actor.entry(event.author.name.clone()).or_insert(0) += 1;
            *stats.by_type.entry(event.action_type.clone()).or_insert(0) += 1;
        }
        stats
    }

    /// Number of events currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.ring.len()
    }

    /// Replay the live log file into the ring buffer.
    ///
    /// Reads the live JSON-Lines file line by line; corrupt lines are
    /// skipped silently. The buffer keeps at most `capacity` events (the
    /// most recent lines win) and the id cursor advances past the highest
    /// replayed id so restarts never mint colliding ids. Returns the number
    /// of events replayed; a missing file is an empty history, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the live file exists but cannot be
    /// read.
    pub async fn hydrate(&self) -> Result<usize, StoreError> {
        let path = self.config.data_dir.join(LIVE_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut replayed = 0usize;
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(event) = serde_json::from_str::<ActivityEvent>(line) else {
                continue;
            };
            inner.last_id = Some(match inner.last_id {
                Some(last) if last >= event.id => last,
                _ => event.id,
            });
            inner.ring.push(event);
            replayed += 1;
        }
        debug!(replayed, "hydrated ring buffer from live log");
        Ok(replayed)
    }

    /// The store's configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Dedup key equality: `(author name, action type, details["file"])`.
fn same_dedup_key(stored: &ActivityEvent, draft: &EventDraft) -> bool {
    stored.author.name == draft.author.name
        && stored.action_type == draft.action_type
        && stored.details.get("file").and_then(DetailValue::as_str)
            == draft.details.get("file").and_then(DetailValue::as_str)
}
