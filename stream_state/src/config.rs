//! Store and recovery configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the stream-state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateStoreConfig {
    /// Most-recent entries retained; older ones are evicted on every save.
    pub max_states: usize,
    /// Entries not updated within this window are treated as deleted.
    pub expiry_secs: u64,
    /// Assumed generation rate for indeterminate progress estimation.
    /// A rough placeholder, not calibrated per model.
    pub tokens_per_second: u64,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            max_states: 10,
            expiry_secs: 24 * 60 * 60,
            tokens_per_second: 50,
        }
    }
}

impl StateStoreConfig {
    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiry_secs as i64)
    }
}

/// Configuration for the recovery poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Interval between incomplete-stream checks.
    pub poll_interval_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl RecoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
