//! Configuration System using Figment
//!
//! Configuration is merged from, in increasing priority:
//! 1. Built-in defaults
//! 2. `config/sonar.toml` (or an explicit path)
//! 3. Environment variables prefixed with `SONAR_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use sonar_daq::config::SonarConfig;
//!
//! let config = SonarConfig::load()?;
//! config.validate()?;
//! println!("Model: {}", config.sensor.model);
//! # Ok::<(), sonar_daq::error::SonarError>(())
//! ```
//!
//! Environment override example: `SONAR_SENSOR__MODEL=mb1200`.

use crate::acquisition::AcquisitionConfig;
use crate::data::rate::DEFAULT_WINDOW_SIZE;
use crate::error::{AppResult, SonarError};
use crate::hardware::{Model, MAXBOTIX_BAUD_RATE};
use crate::report::ReportFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/sonar.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SONAR_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SonarConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Sensor wiring and model
    pub sensor: SensorConfig,
    /// Rate estimation settings
    pub rate: RateConfig,
    /// Periodic reporting settings
    pub reporting: ReportingConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SensorConfig {
    /// Rangefinder model, selects the serial scale factor
    #[serde(default)]
    pub model: Model,
    /// Serial channel
    #[serde(default)]
    pub serial: Option<SerialConfig>,
}

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Maximum bytes requested per read
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: usize,
    /// Pause after an empty read, in milliseconds
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
}

/// Rate estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    /// Number of inter-arrival intervals averaged
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

/// Reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Report interval in milliseconds
    #[serde(default = "default_report_interval_ms")]
    pub interval_ms: u64,
    /// Output format
    #[serde(default)]
    pub format: ReportFormat,
}

// Default value functions
fn default_name() -> String {
    "sonar-daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_baud_rate() -> u32 {
    MAXBOTIX_BAUD_RATE
}

fn default_max_read_bytes() -> usize {
    64
}

fn default_idle_backoff_ms() -> u64 {
    10
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_report_interval_ms() -> u64 {
    500
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_report_interval_ms(),
            format: ReportFormat::default(),
        }
    }
}

impl SerialConfig {
    /// Serial settings for `port` with MaxBotix defaults.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            max_read_bytes: default_max_read_bytes(),
            idle_backoff_ms: default_idle_backoff_ms(),
        }
    }

    /// Acquisition loop tuning derived from these settings.
    pub fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            max_read_bytes: self.max_read_bytes,
            idle_backoff: Duration::from_millis(self.idle_backoff_ms),
        }
    }
}

impl SonarConfig {
    /// Load configuration from `config/sonar.toml` and environment variables
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path plus environment variables
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(SonarError::from)
    }

    /// Parse configuration from a TOML string, ignoring the environment
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        Figment::from(Toml::string(toml))
            .extract()
            .map_err(SonarError::from)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(SonarError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.rate.window_size == 0 {
            return Err(SonarError::Configuration(
                "rate.window_size must be greater than 0".into(),
            ));
        }

        if let Some(serial) = &self.sensor.serial {
            if serial.port.trim().is_empty() {
                return Err(SonarError::Configuration(
                    "sensor.serial.port must not be empty".into(),
                ));
            }
            if serial.baud_rate == 0 {
                return Err(SonarError::Configuration(
                    "sensor.serial.baud_rate must be greater than 0".into(),
                ));
            }
            if serial.max_read_bytes == 0 {
                return Err(SonarError::Configuration(
                    "sensor.serial.max_read_bytes must be greater than 0".into(),
                ));
            }
            if serial.idle_backoff_ms == 0 {
                return Err(SonarError::Configuration(
                    "sensor.serial.idle_backoff_ms must be greater than 0".into(),
                ));
            }
        }

        if self.reporting.interval_ms == 0 {
            return Err(SonarError::Configuration(
                "reporting.interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Rate window as a non-zero size
    pub fn rate_window(&self) -> AppResult<NonZeroUsize> {
        NonZeroUsize::new(self.rate.window_size).ok_or_else(|| {
            SonarError::Configuration("rate.window_size must be greater than 0".into())
        })
    }

    /// Interval between reports
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.reporting.interval_ms)
    }
}
