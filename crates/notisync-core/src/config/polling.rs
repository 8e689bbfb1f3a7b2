//! Polling refresher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Periodic REST refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Whether the periodic timer runs; on-demand refreshes work regardless.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval between periodic refreshes, in seconds.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Timeout for each of the list and count requests, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl PollingConfig {
    /// Refresh interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    /// Per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    5_000
}
