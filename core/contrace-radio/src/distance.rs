//! RSSI to distance conversion.
//!
//! Log-distance path-loss model:
//!
//! ```text
//! distance = 10 ^ ((measured_power_at_1m - rssi) / (10 * n))
//! ```
//!
//! The constants are calibration points, not runtime measurements.

use serde::{Deserialize, Serialize};

/// Typical BLE RSSI at one meter (dBm).
pub const MEASURED_POWER_AT_1M: i32 = -59;

/// Free-space path-loss exponent.
pub const PATH_LOSS_EXPONENT: f64 = 2.0;

/// Weakest RSSI counted as nearby (roughly 30 m in free space).
pub const RSSI_THRESHOLD: i32 = -70;

/// Calibrated distance model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimator {
    pub measured_power_at_1m: i32,
    pub path_loss_exponent: f64,
    pub rssi_threshold: i32,
}

impl Default for DistanceEstimator {
    fn default() -> Self {
        Self {
            measured_power_at_1m: MEASURED_POWER_AT_1M,
            path_loss_exponent: PATH_LOSS_EXPONENT,
            rssi_threshold: RSSI_THRESHOLD,
        }
    }
}

impl DistanceEstimator {
    /// Estimated distance in meters for a signal strength reading.
    ///
    /// Defined for every `i32`; weaker signals never yield a smaller
    /// distance than stronger ones.
    #[must_use]
    pub fn estimate_distance(&self, rssi: i32) -> f32 {
        let exponent = (f64::from(self.measured_power_at_1m) - f64::from(rssi))
            / (10.0 * self.path_loss_exponent);
        10f64.powf(exponent) as f32
    }

    /// Whether a reading is strong enough to count as nearby.
    #[must_use]
    pub fn is_within_range(&self, rssi: i32) -> bool {
        rssi >= self.rssi_threshold
    }
}

/// [`DistanceEstimator::estimate_distance`] with the reference calibration.
#[must_use]
pub fn estimate_distance(rssi: i32) -> f32 {
    DistanceEstimator::default().estimate_distance(rssi)
}

/// [`DistanceEstimator::is_within_range`] with the reference threshold.
#[must_use]
pub fn is_within_range(rssi: i32) -> bool {
    DistanceEstimator::default().is_within_range(rssi)
}
