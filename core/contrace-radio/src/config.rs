//! Tunables for detection and duty cycling.

use crate::distance::{DistanceEstimator, MEASURED_POWER_AT_1M, PATH_LOSS_EXPONENT, RSSI_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a tracing session.
///
/// Fixed at deployment; the defaults are the calibrated reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Length of each scan-on and scan-off phase (ms).
    pub scan_period_ms: u64,
    /// Lifetime of one ephemeral id (ms).
    pub id_rotation_interval_ms: u64,
    /// Advertising silence between two ephemeral ids (ms).
    pub rotation_pause_ms: u64,
    /// Gap that must elapse before an episode is recorded (ms).
    pub min_contact_duration_ms: u64,
    /// Entries unseen for this long are dropped from the detection map (ms).
    /// Never shorter than one rotation interval, see
    /// [`stale_entry_after`](Self::stale_entry_after).
    pub stale_entry_after_ms: u64,
    /// Weakest RSSI still treated as nearby (dBm).
    pub rssi_threshold: i32,
    /// Expected RSSI at one meter (dBm).
    pub measured_power_at_1m: i32,
    /// Path-loss exponent of the environment.
    pub path_loss_exponent: f64,
    /// Capacity of the discovery event queue.
    pub discovery_queue_capacity: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            scan_period_ms: 10_000,
            id_rotation_interval_ms: 15 * 60 * 1000,
            rotation_pause_ms: 1_000,
            min_contact_duration_ms: 60_000,
            stale_entry_after_ms: 15 * 60 * 1000,
            rssi_threshold: RSSI_THRESHOLD,
            measured_power_at_1m: MEASURED_POWER_AT_1M,
            path_loss_exponent: PATH_LOSS_EXPONENT,
            discovery_queue_capacity: 256,
        }
    }
}

impl TracingConfig {
    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms)
    }

    pub fn id_rotation_interval(&self) -> Duration {
        Duration::from_millis(self.id_rotation_interval_ms)
    }

    pub fn rotation_pause(&self) -> Duration {
        Duration::from_millis(self.rotation_pause_ms)
    }

    pub fn min_contact_duration(&self) -> Duration {
        Duration::from_millis(self.min_contact_duration_ms)
    }

    /// How long a quiet peer stays in the detection map.
    ///
    /// A peer keeps its ephemeral id for up to one rotation interval, so a
    /// sighting after a shorter gap still closes its episode. The window is
    /// floored at the rotation interval.
    pub fn stale_entry_after(&self) -> Duration {
        Duration::from_millis(self.stale_entry_after_ms.max(self.id_rotation_interval_ms))
    }

    /// Builds the distance estimator for these calibration values.
    pub fn estimator(&self) -> DistanceEstimator {
        DistanceEstimator {
            measured_power_at_1m: self.measured_power_at_1m,
            path_loss_exponent: self.path_loss_exponent,
            rssi_threshold: self.rssi_threshold,
        }
    }
}
