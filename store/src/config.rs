//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`EventLogStore`](crate::EventLogStore).
///
/// # Default Values
///
/// - `capacity`: 10,000 buffered events
/// - `dedup_window`: 3 seconds
/// - `rotation_max_bytes`: 10 MiB
/// - `data_dir`: `./data/activity`
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Ring buffer capacity; oldest events are evicted past this.
    pub capacity: usize,
    /// Window within which near-identical events coalesce into one entry.
    pub dedup_window: Duration,
    /// Live log file size that triggers rotation into a compressed part.
    pub rotation_max_bytes: u64,
    /// Directory holding the live log and rotated parts.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            dedup_window: Duration::from_secs(3),
            rotation_max_bytes: 10 * 1024 * 1024,
            data_dir: PathBuf::from("./data/activity"),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the ring buffer capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the dedup coalescing window.
    #[must_use]
    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.config.dedup_window = window;
        self
    }

    /// Set the live file size threshold for rotation.
    #[must_use]
    pub fn rotation_max_bytes(mut self, bytes: u64) -> Self {
        self.config.rotation_max_bytes = bytes;
        self
    }

    /// Set the data directory for the live log and rotated parts.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Build the [`StoreConfig`].
    #[must_use]
    pub fn build(self) -> StoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StoreConfig::default();
        assert_eq!(config.capacity, 10_000);
        assert_eq!(config.dedup_window, Duration::from_secs(3));
        assert_eq!(config.rotation_max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn builder_overrides() {
        let config = StoreConfig::builder()
            .capacity(16)
            .dedup_window(Duration::ZERO)
            .rotation_max_bytes(512)
            .data_dir("/tmp/feed")
            .build();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.dedup_window, Duration::ZERO);
        assert_eq!(config.rotation_max_bytes, 512);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/feed"));
    }
}
