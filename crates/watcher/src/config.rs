//! Configuration types for the file watcher

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable configuration for the file watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Coalescing window in milliseconds (default: 100ms)
    pub window_ms: u64,
    /// Patterns to ignore (regular expressions)
    pub ignore_patterns: Vec<String>,
    /// Maximum number of raw events in queue (default: 10000)
    pub max_queue_size: usize,
    /// Number of reload ticks buffered for the consumer (default: 1)
    pub tick_capacity: usize,
}

impl WatcherConfig {
    /// Create configuration from builder
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    /// Get the coalescing window duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            window_ms: 100,
            ignore_patterns: Vec::new(),
            max_queue_size: 10_000,
            tick_capacity: 1,
        }
    }
}

impl From<&reloadwatch_core::Config> for WatcherConfig {
    fn from(config: &reloadwatch_core::Config) -> Self {
        Self::builder()
            .window_ms(config.window_ms)
            .ignore_patterns(config.ignore_patterns())
            .max_queue_size(config.max_queue_size)
            .build()
    }
}

/// Builder for WatcherConfig
#[derive(Debug, Default)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    /// Set coalescing window in milliseconds
    pub fn window_ms(mut self, ms: u64) -> Self {
        self.config.window_ms = ms;
        self
    }

    /// Set ignore patterns
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.ignore_patterns = patterns;
        self
    }

    /// Add an ignore pattern
    pub fn add_ignore_pattern(mut self, pattern: String) -> Self {
        self.config.ignore_patterns.push(pattern);
        self
    }

    /// Set maximum raw event queue size
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    /// Set how many ticks may wait for the consumer
    pub fn tick_capacity(mut self, capacity: usize) -> Self {
        self.config.tick_capacity = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> WatcherConfig {
        self.config
    }
}
