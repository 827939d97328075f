use contrace_radio::{
    estimate_distance, is_within_range, DistanceEstimator, TracingConfig, RSSI_THRESHOLD,
};

#[test]
fn reference_power_is_one_meter() {
    assert!((estimate_distance(-59) - 1.0).abs() < 1e-6);
}

#[test]
fn ten_db_weaker_is_about_three_meters() {
    // 10^(10/20)
    assert!((estimate_distance(-69) - 3.162_277_7).abs() < 1e-4);
}

#[test]
fn threshold_is_inclusive() {
    assert!(is_within_range(RSSI_THRESHOLD));
    assert!(is_within_range(-40));
    assert!(!is_within_range(RSSI_THRESHOLD - 1));
    assert!(!is_within_range(-100));
}

#[test]
fn extreme_readings_do_not_overflow() {
    let strong = estimate_distance(i32::MAX);
    let weak = estimate_distance(i32::MIN);
    assert!(strong.is_finite());
    assert!(strong >= 0.0);
    assert!(weak >= strong);
}

#[test]
fn estimator_follows_config_calibration() {
    let config = TracingConfig {
        measured_power_at_1m: -65,
        path_loss_exponent: 3.0,
        rssi_threshold: -80,
        ..TracingConfig::default()
    };
    let estimator = config.estimator();
    assert!((estimator.estimate_distance(-65) - 1.0).abs() < 1e-6);
    assert!((estimator.estimate_distance(-95) - 10.0).abs() < 1e-4);
    assert!(estimator.is_within_range(-80));
    assert!(!estimator.is_within_range(-81));
}

#[test]
fn default_estimator_matches_free_functions() {
    let estimator = DistanceEstimator::default();
    for rssi in [-100, -70, -59, -30, 0] {
        assert_eq!(estimator.estimate_distance(rssi), estimate_distance(rssi));
        assert_eq!(estimator.is_within_range(rssi), is_within_range(rssi));
    }
}

#[test]
fn config_deserializes_with_defaults() {
    let config: TracingConfig = serde_json::from_str(r#"{"scan_period_ms": 5000}"#).unwrap();
    assert_eq!(config.scan_period_ms, 5_000);
    assert_eq!(config.id_rotation_interval_ms, 900_000);
    assert_eq!(config.min_contact_duration_ms, 60_000);
    assert_eq!(config.rssi_threshold, -70);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn stronger_signal_never_reads_farther(a in -130i32..=20, b in -130i32..=20) {
            let (weak, strong) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(estimate_distance(strong) <= estimate_distance(weak));
        }

        #[test]
        fn range_check_is_a_threshold(rssi in any::<i32>()) {
            prop_assert_eq!(is_within_range(rssi), rssi >= RSSI_THRESHOLD);
        }

        #[test]
        fn distance_is_never_negative(rssi in any::<i32>()) {
            let d = estimate_distance(rssi);
            prop_assert!(!d.is_nan());
            prop_assert!(d >= 0.0);
        }
    }
}
