//! Application state for Axum handlers.

use crate::bus::EventBus;
use crate::config::ServerConfig;
use pulsefeed_store::EventLogStore;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative event log.
    pub store: Arc<EventLogStore>,
    /// Fan-out bus feeding open stream connections.
    pub bus: EventBus,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Assemble the application state.
    #[must_use]
    pub fn new(store: Arc<EventLogStore>, bus: EventBus, config: ServerConfig) -> Self {
        Self {
            store,
            bus,
            config: Arc::new(config),
        }
    }
}
