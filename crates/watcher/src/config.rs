//! Configuration types for the filesystem subscription

use std::time::Duration;

/// Immutable configuration for the notify subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Maximum number of change events buffered between notify and the engine (default: 10000)
    pub max_queue_size: usize,
    /// Poll interval for backends that fall back to polling, in milliseconds (default: 100ms)
    pub poll_interval_ms: u64,
}

impl WatcherConfig {
    /// Create configuration from builder
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    /// Get the poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000, // editors can emit bursts of several events per save
            poll_interval_ms: 100,
        }
    }
}

/// Builder for WatcherConfig
#[derive(Debug, Default)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    /// Set maximum queue size
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size.max(1);
        self
    }

    /// Set poll interval in milliseconds
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> WatcherConfig {
        self.config
    }
}
