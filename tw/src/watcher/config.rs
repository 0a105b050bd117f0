//! Watcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default polling interval: one second
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Configuration for the FileWatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Polling interval in milliseconds
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WatcherConfig {
    /// Config with an explicit interval, mostly for tests
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            poll_interval_ms: interval.as_millis() as u64,
        }
    }

    /// Get the poll interval as a Duration (never zero)
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
