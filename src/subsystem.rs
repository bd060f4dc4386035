//! Rangefinder subsystem.
//!
//! [`Rangefinder`] owns everything needed to acquire from one MaxBotix sensor and
//! exposes the consumer-facing API:
//!
//! - [`latest_range_cm`](Rangefinder::latest_range_cm) / [`latest_range_inches`](Rangefinder::latest_range_inches)
//! - [`acquisition_rate_hz`](Rangefinder::acquisition_rate_hz)
//! - [`analog_range_cm`](Rangefinder::analog_range_cm) / [`analog_range_inches`](Rangefinder::analog_range_inches)
//!
//! None of these calls fail. Missing data is reported with sentinels: `-1` for
//! ranges, `0` for the rate.
//!
//! # Example
//! ```rust,ignore
//! use sonar_daq::hardware::Model;
//! use sonar_daq::subsystem::Rangefinder;
//!
//! let sonar = Rangefinder::builder(Model::Mb1013)
//!     .serial(Box::new(source))
//!     .build();
//! println!("{} cm at {} Hz", sonar.latest_range_cm(), sonar.acquisition_rate_hz());
//! sonar.shutdown().await?;
//! ```

use crate::acquisition::{
    AcquisitionConfig, AcquisitionControl, AcquisitionHandle, AcquisitionLoop, AcquisitionSummary,
};
use crate::data::rate::{RateEstimator, DEFAULT_WINDOW_SIZE, RATE_UNAVAILABLE};
use crate::error::AppResult;
use crate::hardware::analog::{AnalogInput, AnalogPotentiometer};
use crate::hardware::byte_source::DynByteSource;
use crate::hardware::maxbotix::FrameParser;
use crate::hardware::{cm_to_inches, Model};
use crate::report::{AnalogReport, RangeReport, Reportable, SerialReport};
use crate::state::{SharedRangeState, NO_READING};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for [`Rangefinder`].
pub struct RangefinderBuilder {
    model: Model,
    source: Option<DynByteSource>,
    analog_input: Option<Arc<dyn AnalogInput>>,
    analog_full_range_cm: Option<f64>,
    rate_window: NonZeroUsize,
    acquisition: AcquisitionConfig,
    cancel: CancellationToken,
}

impl RangefinderBuilder {
    /// Acquire serial frames from `source`.
    pub fn serial(mut self, source: DynByteSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Read the analog output through `input`.
    pub fn analog(mut self, input: Arc<dyn AnalogInput>) -> Self {
        self.analog_input = Some(input);
        self
    }

    /// Override the model's analog full-scale range.
    pub fn analog_full_range_cm(mut self, cm: f64) -> Self {
        self.analog_full_range_cm = Some(cm);
        self
    }

    /// Number of intervals averaged by the rate estimator.
    pub fn rate_window(mut self, window: NonZeroUsize) -> Self {
        self.rate_window = window;
        self
    }

    /// Read size and idle backoff for the acquisition loop.
    pub fn acquisition_config(mut self, config: AcquisitionConfig) -> Self {
        self.acquisition = config;
        self
    }

    /// Use a caller-provided parent token. Cancelling it stops acquisition.
    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the subsystem and, if a serial source was given, start acquiring.
    ///
    /// Must be called from within a tokio runtime when a serial source is set.
    pub fn build(self) -> Rangefinder {
        let state = Arc::new(SharedRangeState::new());
        let rate = Arc::new(RateEstimator::new(self.rate_window));

        let acquisition = self.source.map(|source| {
            tracing::info!(model = %self.model, source = %source.describe(), "starting serial acquisition");
            AcquisitionLoop::new(
                source,
                FrameParser::new(self.model.scale_factor()),
                state.clone(),
                rate.clone(),
                self.cancel.child_token(),
            )
            .with_config(self.acquisition)
            .spawn()
        });

        let analog = self.analog_input.map(|input| {
            let full_range = self
                .analog_full_range_cm
                .unwrap_or_else(|| self.model.analog_full_range_cm());
            AnalogPotentiometer::new(input, full_range, 0.0)
        });

        Rangefinder {
            model: self.model,
            state,
            rate,
            analog,
            control: acquisition.as_ref().map(AcquisitionHandle::control),
            acquisition: Mutex::new(acquisition),
        }
    }
}

/// One MaxBotix rangefinder with optional serial and analog channels.
///
/// All methods take `&self`, so the rangefinder can be shared behind an `Arc`
/// with a reporter while another task waits on acquisition.
pub struct Rangefinder {
    model: Model,
    state: Arc<SharedRangeState>,
    rate: Arc<RateEstimator>,
    analog: Option<AnalogPotentiometer>,
    control: Option<AcquisitionControl>,
    acquisition: Mutex<Option<AcquisitionHandle>>,
}

impl Rangefinder {
    /// Start building a rangefinder for `model`.
    pub fn builder(model: Model) -> RangefinderBuilder {
        RangefinderBuilder {
            model,
            source: None,
            analog_input: None,
            analog_full_range_cm: None,
            rate_window: NonZeroUsize::new(DEFAULT_WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN),
            acquisition: AcquisitionConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sensor model.
    pub fn model(&self) -> Model {
        self.model
    }

    /// Latest serial range in cm, or `-1` if nothing has been acquired.
    pub fn latest_range_cm(&self) -> f64 {
        self.state.range_cm_or_sentinel()
    }

    /// Latest serial range in inches, or `-1` if nothing has been acquired.
    pub fn latest_range_inches(&self) -> f64 {
        cm_to_inches(self.latest_range_cm())
    }

    /// Serial reading rate in Hz, `0` before any interval is known.
    pub fn acquisition_rate_hz(&self) -> f64 {
        if self.control.is_none() {
            return RATE_UNAVAILABLE;
        }
        self.rate.rate_hz()
    }

    /// Analog range in cm, or `-1` without an analog input.
    pub fn analog_range_cm(&self) -> f64 {
        self.analog.as_ref().map_or(NO_READING, AnalogPotentiometer::get)
    }

    /// Analog range in inches, or `-1` without an analog input.
    pub fn analog_range_inches(&self) -> f64 {
        cm_to_inches(self.analog_range_cm())
    }

    /// Shared state written by the acquisition task.
    pub fn state(&self) -> Arc<SharedRangeState> {
        self.state.clone()
    }

    /// Rate estimator fed by the acquisition task.
    pub fn rate(&self) -> Arc<RateEstimator> {
        self.rate.clone()
    }

    /// True while the serial acquisition task is running.
    pub fn is_acquiring(&self) -> bool {
        self.control
            .as_ref()
            .is_some_and(AcquisitionControl::is_running)
    }

    /// Stop serial acquisition and wait for the task to exit.
    ///
    /// Always cancels, even while another task is inside [`wait`](Self::wait).
    /// The summary goes to whichever caller holds the task: `None` is returned
    /// if there is no serial channel, it was already shut down, or a
    /// concurrent `wait` receives the result instead.
    ///
    /// # Errors
    /// Returns the source error if acquisition had already failed.
    pub async fn shutdown(&self) -> AppResult<Option<AcquisitionSummary>> {
        let Some(control) = &self.control else {
            return Ok(None);
        };
        control.cancel();

        let handle = { self.acquisition.lock().take() };
        match handle {
            Some(handle) => handle.join().await.map(Some),
            None => {
                control.stopped().await;
                Ok(None)
            }
        }
    }

    /// Wait until the acquisition task exits on its own (source failure or
    /// external cancellation).
    ///
    /// Dropping the returned future before it completes cancels acquisition.
    ///
    /// # Errors
    /// Returns the source error that stopped acquisition.
    pub async fn wait(&self) -> AppResult<Option<AcquisitionSummary>> {
        let handle = { self.acquisition.lock().take() };
        match handle {
            Some(handle) => handle.join().await.map(Some),
            None => Ok(None),
        }
    }
}

impl Reportable for Rangefinder {
    fn report(&self) -> RangeReport {
        let serial = self.control.is_some().then(|| SerialReport {
            range_cm: self.latest_range_cm(),
            range_inches: self.latest_range_inches(),
            rate_hz: self.acquisition_rate_hz(),
            rate_warm: self.rate.is_warm(),
            sequence: self.state.snapshot().map(|s| s.sequence),
        });
        let analog = self.analog.as_ref().map(|_| AnalogReport {
            range_cm: self.analog_range_cm(),
            range_inches: self.analog_range_inches(),
        });

        RangeReport {
            model: self.model,
            serial,
            analog,
        }
    }
}

impl std::fmt::Debug for Rangefinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rangefinder")
            .field("model", &self.model)
            .field("latest_range_cm", &self.latest_range_cm())
            .field("acquiring", &self.is_acquiring())
            .field("analog", &self.analog)
            .finish()
    }
}
