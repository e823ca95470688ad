//! Multiplexed, auto-reconnecting stream subscriptions.
//!
//! Subscriptions sharing an identical key (url, credentials mode, and
//! sorted query parameters) share exactly one underlying transport. The
//! first subscriber for a key creates the transport task; the last one to
//! unsubscribe aborts it, cancelling any pending reconnect timer with it,
//! so neither sockets nor timers can leak. Creation is guarded by the
//! entry map's lock, so concurrent subscribes cannot race a duplicate
//! transport into existence.
//!
//! Handlers on one shared transport observe frames strictly in arrival
//! order; no reordering is performed across reconnects. Transport errors
//! are surfaced to handlers and feed the backoff path; they never
//! propagate across subscription boundaries.

use crate::backoff::{Backoff, ReconnectPolicy};
use crate::error::StreamError;
use crate::sse::RawFrame;
use crate::state::{ConnectionEvent, ConnectionState};
use crate::transport;
use futures::{Stream, StreamExt};
use pulsefeed_core::{ActivityEvent, frame_names};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Whether the transport carries stored credentials (cookies) with its
/// requests, mirroring the browser `EventSource` credentials modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CredentialsMode {
    /// No credentials attached.
    #[default]
    Omit,
    /// Attach the shared cookie store to every request.
    Include,
}

/// Per-subscription options.
#[derive(Clone, Debug, Default)]
pub struct SubscribeOptions {
    /// Credentials mode; part of the transport-sharing key.
    pub credentials: CredentialsMode,
    /// Query parameters appended to the stream URL; part of the key.
    pub query: BTreeMap<String, String>,
}

/// Identity of a shared transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ConnectionKey {
    url: String,
    credentials: CredentialsMode,
    /// Sorted by construction: collected from a `BTreeMap`.
    query: Vec<(String, String)>,
}

impl ConnectionKey {
    fn new(url: &str, options: &SubscribeOptions) -> Self {
        Self {
            url: url.to_string(),
            credentials: options.credentials,
            query: options
                .query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

type EventCallback = Arc<dyn Fn(ActivityEvent) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&StreamError) + Send + Sync>;
type StateCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Callbacks for one logical subscription.
///
/// All callbacks are optional; a subscription interested only in activity
/// events sets `on_event` and ignores the rest.
#[derive(Clone, Default)]
pub struct StreamHandlers {
    on_event: Option<EventCallback>,
    on_error: Option<ErrorCallback>,
    on_state: Option<StateCallback>,
}

impl StreamHandlers {
    /// Create an empty handler set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every activity event, in arrival order.
    #[must_use]
    pub fn on_event(mut self, callback: impl Fn(ActivityEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(callback));
        self
    }

    /// Called for every transport or parse error on the shared connection.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&StreamError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Called whenever the derived connection-health state changes.
    #[must_use]
    pub fn on_state(mut self, callback: impl Fn(ConnectionState) + Send + Sync + 'static) -> Self {
        self.on_state = Some(Arc::new(callback));
        self
    }
}

/// Stream manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Reconnect backoff policy.
    pub policy: ReconnectPolicy,
    /// Watchdog window: with no frame (heartbeat included) inside it, a
    /// `HeartbeatTimeout` is fed to the state machine. The server default
    /// heartbeat is 25 s, so two missed beats trip this.
    pub heartbeat_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            heartbeat_timeout: Duration::from_secs(60),
        }
    }
}

struct ConnectionShared {
    handlers: Mutex<HashMap<u64, StreamHandlers>>,
    last_event_id: Mutex<Option<String>>,
    state: Mutex<ConnectionState>,
}

struct ConnectionEntry {
    shared: Arc<ConnectionShared>,
    task: JoinHandle<()>,
}

struct ManagerInner {
    config: ManagerConfig,
    entries: Mutex<HashMap<ConnectionKey, ConnectionEntry>>,
    next_handler_id: AtomicU64,
}

/// Multiplexing stream consumer; cheap to clone, clones share state.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<ManagerInner>,
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamManager {
    /// Create a manager with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Create a manager with explicit configuration.
    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                entries: Mutex::new(HashMap::new()),
                next_handler_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a logical subscription, sharing or creating the transport
    /// for its key. Must be called within a Tokio runtime.
    ///
    /// Dropping the returned [`Subscription`] (or calling
    /// [`unsubscribe`](Subscription::unsubscribe)) removes the handler set;
    /// the transport is torn down once no handlers remain for its key.
    #[must_use]
    pub fn subscribe(
        &self,
        url: impl Into<String>,
        handlers: StreamHandlers,
        options: SubscribeOptions,
    ) -> Subscription {
        let url = url.into();
        let key = ConnectionKey::new(&url, &options);
        let handler_id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);

        let mut entries = lock(&self.inner.entries);
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            debug!(%url, "creating shared stream transport");
            let shared = Arc::new(ConnectionShared {
                handlers: Mutex::new(HashMap::new()),
                last_event_id: Mutex::new(None),
                state: Mutex::new(ConnectionState::Idle),
            });
            let task = tokio::spawn(run_connection(
                url.clone(),
                options.clone(),
                Arc::clone(&shared),
                self.inner.config.clone(),
            ));
            ConnectionEntry { shared, task }
        });
        lock(&entry.shared.handlers).insert(handler_id, handlers);

        Subscription {
            inner: Arc::clone(&self.inner),
            key,
            handler_id,
        }
    }

    /// Number of live shared transports.
    #[must_use]
    pub fn active_transports(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    /// Current connection-health state for a key, if a transport exists.
    #[must_use]
    pub fn connection_state(&self, url: &str, options: &SubscribeOptions) -> Option<ConnectionState> {
        let key = ConnectionKey::new(url, options);
        let entries = lock(&self.inner.entries);
        entries.get(&key).map(|entry| *lock(&entry.shared.state))
    }
}

/// Handle for one logical subscription.
pub struct Subscription {
    inner: Arc<ManagerInner>,
    key: ConnectionKey,
    handler_id: u64,
}

impl Subscription {
    /// Remove this subscription's handlers; tears the shared transport
    /// down if this was the last subscription for its key.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut entries = lock(&self.inner.entries);
        let Some(entry) = entries.get(&self.key) else {
            return;
        };
        let mut handlers = lock(&entry.shared.handlers);
        handlers.remove(&self.handler_id);
        let last = handlers.is_empty();
        drop(handlers);

        if last {
            if let Some(entry) = entries.remove(&self.key) {
                // Aborting the task closes the transport and cancels any
                // pending reconnect sleep.
                entry.task.abort();
                debug!(url = %self.key.url, "last subscriber gone; transport torn down");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_client(credentials: CredentialsMode) -> Result<reqwest::Client, StreamError> {
    let builder = reqwest::Client::builder();
    let builder = match credentials {
        CredentialsMode::Omit => builder,
        CredentialsMode::Include => builder.cookie_store(true),
    };
    builder.build().map_err(|e| StreamError::Connect(e.to_string()))
}

/// The lifetime of one shared transport: connect, read, back off, repeat.
async fn run_connection(
    url: String,
    options: SubscribeOptions,
    shared: Arc<ConnectionShared>,
    config: ManagerConfig,
) {
    let client = match build_client(options.credentials) {
        Ok(client) => client,
        Err(e) => {
            emit_error(&shared, &e);
            apply_event(&shared, ConnectionEvent::StreamError { fatal: true });
            return;
        }
    };

    let mut backoff = Backoff::new(config.policy);
    loop {
        let last_id = lock(&shared.last_event_id).clone();
        match transport::connect(&client, &url, &options.query, last_id.as_deref()).await {
            Ok(frames) => {
                // Successful open resets the backoff immediately.
                backoff.reset();
                apply_event(&shared, ConnectionEvent::StreamOpened);
                read_frames(frames, &shared, config.heartbeat_timeout).await;
            }
            Err(e) => {
                let fatal = e.is_fatal();
                emit_error(&shared, &e);
                apply_event(&shared, ConnectionEvent::StreamError { fatal });
                if fatal {
                    warn!(%url, error = %e, "fatal stream error; not reconnecting");
                    return;
                }
            }
        }

        let delay = backoff.next_delay();
        debug!(%url, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "scheduling stream reconnect");
        tokio::time::sleep(delay).await;
    }
}

/// Read one connection's frames until it errors or ends.
async fn read_frames(
    frames: impl Stream<Item = Result<RawFrame, StreamError>> + Send,
    shared: &Arc<ConnectionShared>,
    heartbeat_timeout: Duration,
) {
    futures::pin_mut!(frames);
    loop {
        match tokio::time::timeout(heartbeat_timeout, frames.next()).await {
            Err(_elapsed) => {
                // Silence on the wire: not even a heartbeat arrived.
                apply_event(shared, ConnectionEvent::HeartbeatTimeout);
            }
            Ok(Some(Ok(frame))) => {
                if let Some(id) = &frame.id {
                    *lock(&shared.last_event_id) = Some(id.clone());
                }
                apply_event(shared, ConnectionEvent::MessageReceived);
                dispatch_frame(shared, &frame);
            }
            Ok(Some(Err(e))) => {
                emit_error(shared, &e);
                apply_event(shared, ConnectionEvent::StreamError { fatal: e.is_fatal() });
                return;
            }
            Ok(None) => {
                // The server closed an accepted stream; reconnect as a
                // transient failure.
                let e = StreamError::Transport("stream ended".to_string());
                emit_error(shared, &e);
                apply_event(shared, ConnectionEvent::StreamError { fatal: false });
                return;
            }
        }
    }
}

fn dispatch_frame(shared: &Arc<ConnectionShared>, frame: &RawFrame) {
    // `connected` and `heartbeat` frames only feed the state machine.
    if frame.event != frame_names::ACTIVITY {
        return;
    }
    match serde_json::from_str::<ActivityEvent>(&frame.data) {
        Ok(event) => {
            for handlers in snapshot_handlers(shared) {
                if let Some(callback) = &handlers.on_event {
                    callback(event.clone());
                }
            }
        }
        Err(e) => emit_error(shared, &StreamError::Parse(e.to_string())),
    }
}

fn snapshot_handlers(shared: &Arc<ConnectionShared>) -> Vec<StreamHandlers> {
    lock(&shared.handlers).values().cloned().collect()
}

fn emit_error(shared: &Arc<ConnectionShared>, error: &StreamError) {
    for handlers in snapshot_handlers(shared) {
        if let Some(callback) = &handlers.on_error {
            callback(error);
        }
    }
}

fn apply_event(shared: &Arc<ConnectionShared>, event: ConnectionEvent) {
    let next = {
        let mut state = lock(&shared.state);
        let next = state.apply(event);
        if next == *state {
            return;
        }
        debug!(?event, from = ?*state, to = ?next, "connection state changed");
        *state = next;
        next
    };
    for handlers in snapshot_handlers(shared) {
        if let Some(callback) = &handlers.on_state {
            callback(next);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A port from the discard service range that nothing listens on.
    const DEAD_URL: &str = "http://127.0.0.1:9/api/activity/stream";

    fn options_with(pairs: &[(&str, &str)]) -> SubscribeOptions {
        SubscribeOptions {
            credentials: CredentialsMode::Omit,
            query: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn identical_keys_share_one_transport() {
        let manager = StreamManager::new();
        let a = manager.subscribe(DEAD_URL, StreamHandlers::new(), options_with(&[("a", "1")]));
        let b = manager.subscribe(DEAD_URL, StreamHandlers::new(), options_with(&[("a", "1")]));
        assert_eq!(manager.active_transports(), 1);

        a.unsubscribe();
        assert_eq!(manager.active_transports(), 1);
        b.unsubscribe();
        assert_eq!(manager.active_transports(), 0);
    }

    #[tokio::test]
    async fn query_insertion_order_does_not_split_the_key() {
        let manager = StreamManager::new();
        let _a = manager.subscribe(
            DEAD_URL,
            StreamHandlers::new(),
            options_with(&[("a", "1"), ("b", "2")]),
        );
        let _b = manager.subscribe(
            DEAD_URL,
            StreamHandlers::new(),
            options_with(&[("b", "2"), ("a", "1")]),
        );
        assert_eq!(manager.active_transports(), 1);
    }

    #[tokio::test]
    async fn different_options_get_distinct_transports() {
        let manager = StreamManager::new();
        let _a = manager.subscribe(DEAD_URL, StreamHandlers::new(), options_with(&[]));
        let _b = manager.subscribe(DEAD_URL, StreamHandlers::new(), options_with(&[("x", "1")]));
        let _c = manager.subscribe(
            DEAD_URL,
            StreamHandlers::new(),
            SubscribeOptions {
                credentials: CredentialsMode::Include,
                query: BTreeMap::new(),
            },
        );
        assert_eq!(manager.active_transports(), 3);
    }

    #[tokio::test]
    async fn connection_errors_reach_handlers_and_state() {
        let (error_tx, mut error_rx) = tokio::sync::mpsc::unbounded_channel();
        let (state_tx, mut state_rx) = tokio::sync::mpsc::unbounded_channel();

        let manager = StreamManager::new();
        let _sub = manager.subscribe(
            DEAD_URL,
            StreamHandlers::new()
                .on_error(move |e| {
                    let _ = error_tx.send(e.to_string());
                })
                .on_state(move |s| {
                    let _ = state_tx.send(s);
                }),
            SubscribeOptions::default(),
        );

        let error = tokio::time::timeout(Duration::from_secs(10), error_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(error.contains("Connection failed"));

        // First non-fatal error from Idle escalates to Connecting.
        let state = tokio::time::timeout(Duration::from_secs(10), state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(
            manager.connection_state(DEAD_URL, &SubscribeOptions::default()),
            Some(ConnectionState::Connecting)
        );
    }
}
