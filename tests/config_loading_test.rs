//! Configuration loading from files and `SONAR_` environment overrides.
//!
//! Tests that touch the process environment run under `#[serial]`.

use serial_test::serial;
use sonar_daq::config::SonarConfig;
use sonar_daq::hardware::Model;
use sonar_daq::report::ReportFormat;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp config");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp config");
    file
}

const BENCH_CONFIG: &str = r#"
    [application]
    name = "Bench Sonar"
    log_level = "warn"

    [sensor]
    model = "mb1013"

    [sensor.serial]
    port = "/dev/ttyUSB0"
    idle_backoff_ms = 5

    [reporting]
    interval_ms = 1000
    format = "json"
"#;

#[test]
#[serial]
fn test_load_from_file() {
    let file = write_config(BENCH_CONFIG);
    let config = SonarConfig::load_from(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.application.name, "Bench Sonar");
    assert_eq!(config.sensor.model, Model::Mb1013);
    let serial = config.sensor.serial.as_ref().unwrap();
    assert_eq!(serial.port, "/dev/ttyUSB0");
    assert_eq!(serial.baud_rate, 9600);
    assert_eq!(
        serial.acquisition_config().idle_backoff,
        Duration::from_millis(5)
    );
    assert_eq!(config.rate.window_size, 100);
    assert_eq!(config.reporting.format, ReportFormat::Json);
    assert_eq!(config.report_interval(), Duration::from_secs(1));
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = SonarConfig::load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, SonarConfig::default());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config(BENCH_CONFIG);
    std::env::set_var("SONAR_SENSOR__MODEL", "mb1200");
    std::env::set_var("SONAR_SENSOR__SERIAL__PORT", "/dev/ttyACM3");
    std::env::set_var("SONAR_RATE__WINDOW_SIZE", "25");

    let result = SonarConfig::load_from(file.path());

    std::env::remove_var("SONAR_SENSOR__MODEL");
    std::env::remove_var("SONAR_SENSOR__SERIAL__PORT");
    std::env::remove_var("SONAR_RATE__WINDOW_SIZE");

    let config = result.unwrap();
    assert_eq!(config.sensor.model, Model::Mb1200);
    let serial = config.sensor.serial.as_ref().unwrap();
    assert_eq!(serial.port, "/dev/ttyACM3");
    // Untouched keys still come from the file
    assert_eq!(serial.idle_backoff_ms, 5);
    assert_eq!(config.rate_window().unwrap().get(), 25);
}

#[test]
#[serial]
fn test_environment_value_still_validated() {
    std::env::set_var("SONAR_REPORTING__INTERVAL_MS", "0");
    let dir = tempfile::tempdir().unwrap();
    let result = SonarConfig::load_from(dir.path().join("absent.toml"));
    std::env::remove_var("SONAR_REPORTING__INTERVAL_MS");

    let config = result.unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("reporting.interval_ms"));
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    let file = write_config("[sensor\nmodel = ");
    let err = SonarConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, sonar_daq::SonarError::Config(_)));
}
