//! Periodic status reporting.
//!
//! Anything implementing [`Reportable`] can produce a [`RangeReport`] snapshot.
//! [`spawn_reporter`] emits that snapshot on a fixed interval as a tracing event,
//! either as structured fields or as a single JSON document, until cancelled.

use crate::hardware::Model;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Tracing target used for report events.
pub const REPORT_TARGET: &str = "sonar_daq::report";

/// A component that can describe its current state.
pub trait Reportable: Send + Sync {
    /// Snapshot of the current state.
    fn report(&self) -> RangeReport;
}

/// Serial channel figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerialReport {
    /// Latest range in cm, `-1` before the first reading.
    pub range_cm: f64,
    /// Latest range in inches, `-1` before the first reading.
    pub range_inches: f64,
    /// Reading rate in Hz, `0` before any interval is known.
    pub rate_hz: f64,
    /// True once the rate window is full.
    pub rate_warm: bool,
    /// Sequence number of the latest reading.
    pub sequence: Option<u64>,
}

/// Analog channel figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogReport {
    /// Range in cm.
    pub range_cm: f64,
    /// Range in inches.
    pub range_inches: f64,
}

/// Snapshot of a rangefinder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeReport {
    /// Sensor model.
    pub model: Model,
    /// Present when a serial source is attached.
    pub serial: Option<SerialReport>,
    /// Present when an analog input is attached.
    pub analog: Option<AnalogReport>,
}

/// How reports are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One tracing event with a field per figure.
    #[default]
    Log,
    /// One tracing event carrying the report as JSON.
    Json,
}

/// Emit a single report.
pub fn emit(report: &RangeReport, format: ReportFormat) {
    match format {
        ReportFormat::Log => {
            let model = report.model.to_string();
            if let Some(serial) = &report.serial {
                tracing::info!(
                    target: REPORT_TARGET,
                    model = %model,
                    serial_cm = serial.range_cm,
                    serial_inches = serial.range_inches,
                    serial_rate_hz = serial.rate_hz,
                    rate_warm = serial.rate_warm,
                    "serial range"
                );
            }
            if let Some(analog) = &report.analog {
                tracing::info!(
                    target: REPORT_TARGET,
                    model = %model,
                    analog_cm = analog.range_cm,
                    analog_inches = analog.range_inches,
                    "analog range"
                );
            }
        }
        ReportFormat::Json => match serde_json::to_string(report) {
            Ok(json) => tracing::info!(target: REPORT_TARGET, report = %json, "range report"),
            Err(e) => tracing::warn!(target: REPORT_TARGET, error = %e, "failed to encode report"),
        },
    }
}

/// Emit `reportable`'s report every `interval` until `cancel` fires.
pub fn spawn_reporter(
    reportable: Arc<dyn Reportable>,
    interval: Duration,
    format: ReportFormat,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => emit(&reportable.report(), format),
            }
        }
        tracing::debug!(target: REPORT_TARGET, "reporter stopped");
    })
}
