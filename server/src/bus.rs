//! In-process publish/subscribe fan-out to live stream subscribers.
//!
//! The bus is a registry of bounded per-subscriber frame queues. Publishing
//! walks the registry and `try_send`s to each queue: a closed queue means
//! the subscriber went away, a full queue means it cannot keep up. Either
//! way only that subscriber is dropped, and delivery to the rest continues.
//! Disconnected slow subscribers recover by reconnecting with their resume
//! token, which funnels the gap through the store's replay path.
//!
//! The heartbeat is one shared timer per server, not one per connection:
//! [`spawn_heartbeat`] publishes a heartbeat frame to every subscriber at a
//! fixed interval to defeat idle-connection timeouts in intermediary
//! proxies.

use chrono::Utc;
use metrics::{counter, gauge};
use pulsefeed_core::{ActivityEvent, HeartbeatPayload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A frame fanned out to every live subscriber.
#[derive(Clone, Debug)]
pub enum Broadcast {
    /// A freshly stored activity event.
    Activity(ActivityEvent),
    /// Shared-timer keep-alive.
    Heartbeat(HeartbeatPayload),
}

struct SubscriberEntry {
    tx: mpsc::Sender<Broadcast>,
    registered_at: Instant,
}

struct Registry {
    subscribers: Mutex<HashMap<u64, SubscriberEntry>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, id: u64) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = subscribers.remove(&id) {
            debug!(
                subscriber = id,
                connected_for = ?entry.registered_at.elapsed(),
                "stream subscriber deregistered"
            );
        }
        gauge!("pulsefeed_stream_subscribers").set(subscribers.len() as f64);
    }
}

/// In-process fan-out bus for stream frames.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
    queue_capacity: usize,
}

impl EventBus {
    /// Create a bus whose subscribers each buffer up to `queue_capacity`
    /// frames before being disconnected as too slow.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new subscriber and return its frame subscription.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self
            .registry
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.insert(
            id,
            SubscriberEntry {
                tx,
                registered_at: Instant::now(),
            },
        );
        gauge!("pulsefeed_stream_subscribers").set(subscribers.len() as f64);
        drop(subscribers);
        debug!(subscriber = id, "stream subscriber registered");
        Subscription {
            id,
            rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Fan a frame out to every live subscriber, in registration order.
    ///
    /// A subscriber whose queue is full or closed is removed; delivery to
    /// the remaining subscribers always continues.
    pub fn publish(&self, frame: &Broadcast) {
        let mut subscribers = self
            .registry
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|id, entry| match entry.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                counter!("pulsefeed_slow_subscriber_drops").increment(1);
                warn!(
                    subscriber = id,
                    "subscriber queue full; disconnecting slow consumer"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        gauge!("pulsefeed_stream_subscribers").set(subscribers.len() as f64);
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A registered subscriber's receiving half.
///
/// Dropping the subscription deregisters the subscriber immediately.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Broadcast>,
    registry: Arc<Registry>,
}

impl Subscription {
    /// Receive the next frame; `None` once deregistered by the bus.
    pub async fn recv(&mut self) -> Option<Broadcast> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Spawn the single shared heartbeat task for a bus.
///
/// The returned handle should be aborted on shutdown.
pub fn spawn_heartbeat(bus: EventBus, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; the heartbeat starts one
        // full interval after spawn.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            bus.publish(&Broadcast::Heartbeat(HeartbeatPayload { now: Utc::now() }));
        }
    })
}
