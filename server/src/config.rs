//! Server configuration.

use std::time::Duration;

/// Configuration for the activity API.
///
/// # Default Values
///
/// - `heartbeat_interval`: 25 seconds
/// - `catch_up_limit`: 50 events sent to a fresh subscriber
/// - `replay_limit`: 1,000 events replayed for a resume token
/// - `subscriber_queue`: 256 frames buffered per subscriber
/// - `enable_test_injector`: `false`
///
/// The signing secret and actor allow-list have no useful defaults and are
/// supplied by the deployment (environment variables in the binary, the
/// builder in tests).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HMAC-SHA256 key verifying ingest signatures.
    pub signing_secret: Vec<u8>,
    /// Actor names allowed to ingest events.
    pub allowed_actors: Vec<String>,
    /// Interval of the shared heartbeat timer.
    pub heartbeat_interval: Duration,
    /// Catch-up burst size for subscribers without a resume token.
    pub catch_up_limit: usize,
    /// Cap on events replayed for a resume token.
    pub replay_limit: usize,
    /// Bound of each subscriber's frame queue; overflowing disconnects it.
    pub subscriber_queue: usize,
    /// Whether the synthetic-event injector endpoint responds. Never enable
    /// in production.
    pub enable_test_injector: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            signing_secret: Vec::new(),
            allowed_actors: Vec::new(),
            heartbeat_interval: Duration::from_secs(25),
            catch_up_limit: 50,
            replay_limit: 1_000,
            subscriber_queue: 256,
            enable_test_injector: false,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the HMAC signing secret.
    #[must_use]
    pub fn signing_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.config.signing_secret = secret.into();
        self
    }

    /// Set the actor allow-list.
    #[must_use]
    pub fn allowed_actors<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_actors = actors.into_iter().map(Into::into).collect();
        self
    }

    /// Set the shared heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the catch-up burst size for token-less subscribers.
    #[must_use]
    pub fn catch_up_limit(mut self, limit: usize) -> Self {
        self.config.catch_up_limit = limit;
        self
    }

    /// Set the resume replay cap.
    #[must_use]
    pub fn replay_limit(mut self, limit: usize) -> Self {
        self.config.replay_limit = limit;
        self
    }

    /// Set the per-subscriber frame queue bound.
    #[must_use]
    pub fn subscriber_queue(mut self, frames: usize) -> Self {
        self.config.subscriber_queue = frames;
        self
    }

    /// Enable the synthetic-event injector (test environments only).
    #[must_use]
    pub fn enable_test_injector(mut self, enabled: bool) -> Self {
        self.config.enable_test_injector = enabled;
        self
    }

    /// Build the [`ServerConfig`].
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
