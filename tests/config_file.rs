//! Config File Tests
//!
//! Loading and saving `urja-eps.toml` on disk, and starting the controller
//! from a file-backed configuration.
//!
//! Run with: `cargo test --test config_file`

use std::fs;
use tempfile::TempDir;
use urja_eps::app::EpsApp;
use urja_eps::config::{AppConfig, ButtonAction, DeviceKind};
use urja_eps::core::types::IndicatorState;
use urja_eps::devices::create_devices;
use urja_eps::Error;

const CUSTOM_CONFIG: &str = r#"
[device]
kind = "mock"

[sampling]
frequency_hz = 1.0
read_retries = 2

[safety]
critical_voltage = 6.6

[indicator]
normal_above = 8.0
low_above = 7.0
hysteresis_volts = 0.05

[model]
degree = 2
calibration = [
    { voltage = 3.3, percent = 0.0 },
    { voltage = 3.7, percent = 40.0 },
    { voltage = 4.2, percent = 100.0 },
]

[button]
debounce_ms = 250
action = "reboot"

[mock]
start_cell_voltage = 4.1
noise_stddev = 0.0
"#;

#[test]
fn test_load_custom_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urja-eps.toml");
    fs::write(&path, CUSTOM_CONFIG).unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.device.kind, DeviceKind::Mock);
    assert_eq!(config.sampling.frequency_hz, 1.0);
    assert_eq!(config.sampling.read_retries, 2);
    assert_eq!(config.safety.critical_voltage, 6.6);
    assert_eq!(config.indicator.normal_above, 8.0);
    assert_eq!(config.model.degree, 2);
    assert_eq!(config.model.calibration.len(), 3);
    assert_eq!(config.button.debounce_ms, 250);
    assert_eq!(config.button.action, ButtonAction::Reboot);
    // Untouched sections keep their defaults
    assert_eq!(config.pins.off_button, 4);
    assert_eq!(config.adc.address, 0x48);
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("saved.toml");

    let mut config = AppConfig::default();
    config.sampling.frequency_hz = 4.0;
    config.indicator.hysteresis_volts = 0.1;
    config.button.action = ButtonAction::Reboot;
    config.to_file(&path).unwrap();

    let reloaded = AppConfig::from_file(&path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        AppConfig::from_file(dir.path().join("absent.toml")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[indicator]\nnormal_above = 6.0\nlow_above = 7.0\n").unwrap();
    assert!(matches!(AppConfig::from_file(&path), Err(Error::Config(_))));

    fs::write(&path, "[sampling\nfrequency_hz = 2.0\n").unwrap();
    assert!(matches!(
        AppConfig::from_file(&path),
        Err(Error::ConfigParse(_))
    ));
}

#[test]
fn test_controller_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urja-eps.toml");
    fs::write(&path, CUSTOM_CONFIG).unwrap();
    let config = AppConfig::from_file(&path).unwrap();

    let devices = create_devices(&config, false).unwrap();
    let mut app = EpsApp::new(&config, devices).unwrap();
    let report = app.tick_once().unwrap();

    // 8.2 V pack against the 8.0 V breakpoint from the file
    assert_eq!(report.state, IndicatorState::Normal);
    assert!(!report.critical);
    assert!(report.charge_percent > 80.0);
}

#[test]
fn test_shipped_example_matches_defaults() {
    let config = AppConfig::from_toml(include_str!("../urja-eps.toml")).unwrap();
    assert_eq!(config, AppConfig::default());
}
