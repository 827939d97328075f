//! Sync tunables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sync engine and its periodic worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on any single remote call (ms).
    pub request_timeout_ms: u64,
    /// Contacts older than this many days are purged.
    pub retention_days: u32,
    /// Window counted by the recent-contact figure (ms).
    pub recent_window_ms: u64,
    /// Period of the background worker (ms).
    pub sync_interval_ms: u64,
    /// Delay schedule after a failed background run.
    pub backoff: BackoffPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            retention_days: 14,
            recent_window_ms: 24 * 60 * 60 * 1000,
            sync_interval_ms: 15 * 60 * 1000,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn recent_window(&self) -> Duration {
        Duration::from_millis(self.recent_window_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

/// Exponential backoff: `initial * factor^(attempt - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub factor: u32,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 30_000,
            factor: 2,
            max_ms: 60 * 60 * 1000,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based). Attempt 0 means no
    /// failure yet and yields zero.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let growth = u64::from(self.factor).saturating_pow(attempt - 1);
        Duration::from_millis(self.initial_ms.saturating_mul(growth).min(self.max_ms))
    }
}
