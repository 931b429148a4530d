use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default period between timer-driven flushes
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// Minimum flush interval in seconds (prevents runaway syncing)
const MIN_INTERVAL_SECS: u64 = 1;

/// Sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Seconds between periodic flushes while a session is active
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_INTERVAL_SECS))
    }
}

/// Current flush state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No flush in progress
    #[default]
    Idle,
    /// A flush is sending queued writes
    Syncing,
}

/// Sync status for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub status: SyncState,
    /// Last flush that completed without failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Number of words with changes not yet written remotely
    pub pending_changes: usize,
    /// Error from the most recent flush, if it had failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a flush request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum FlushOutcome {
    /// No signed-in user; nothing was sent
    Paused,
    /// Another flush was already running
    AlreadySyncing,
    /// Queue was empty
    Empty,
    /// Writes were issued
    Completed { pushed: usize, failed: usize },
}

impl FlushOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Empty | Self::Completed { failed: 0, .. })
    }
}
