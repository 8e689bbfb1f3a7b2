//! Notification state store configuration.

use serde::{Deserialize, Serialize};

/// Limits for the in-memory notification store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How many read records, and separately how many read ids with no
    /// record behind them, are remembered. A read record is only evicted
    /// after a later poll confirms it, earliest read first, so a lagging
    /// poll cannot resurrect it.
    #[serde(default = "default_max_read_tombstones")]
    pub max_read_tombstones: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_read_tombstones: default_max_read_tombstones(),
        }
    }
}

fn default_max_read_tombstones() -> usize {
    500
}
