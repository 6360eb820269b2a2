/// Unit tests for device configuration types

use std::time::Duration;

use crate::graphics_device::{Config, DebugSeverity, ValidationStats};

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.app_name, "Galaxy3D Application");
    assert_eq!(config.enable_validation, cfg!(debug_assertions));
    assert_eq!(config.debug_severity, DebugSeverity::ErrorsAndWarnings);
    assert!(config.transfer_timeout.is_none());
}

#[test]
fn test_config_with_timeout() {
    let config = Config {
        transfer_timeout: Some(Duration::from_millis(250)),
        ..Config::default()
    };
    assert_eq!(config.transfer_timeout.map(|t| t.as_nanos()), Some(250_000_000));
}

#[test]
fn test_validation_stats_total() {
    let stats = ValidationStats { errors: 1, warnings: 2, info: 3, verbose: 4 };
    assert_eq!(stats.total(), 10);
    assert!(stats.has_errors());
    assert_eq!(ValidationStats::default().total(), 0);
    assert!(!ValidationStats::default().has_errors());
}
