//! # Sonar DAQ Core Library
//!
//! Acquisition of range readings from MaxBotix ultrasonic rangefinders. A
//! background task decodes the sensor's `R<digits>\r` serial stream, publishes
//! the latest range for concurrent readers and keeps a rolling estimate of the
//! reading rate.
//!
//! ## Crate Structure
//!
//! - **`hardware`**: Sensor models, the serial frame parser, byte sources and
//!   analog output scaling.
//! - **`data`**: Rolling-average window and the reading-rate estimator built on it.
//! - **`state`**: Latest-value cell shared between the producer and readers.
//! - **`acquisition`**: The cancellable producer task.
//! - **`subsystem`**: `Rangefinder`, the consumer-facing facade tying it all together.
//! - **`report`**: Periodic status reports emitted through `tracing`.
//! - **`config`**: Figment-based configuration loading and validation.
//! - **`tracing_setup`**: Subscriber initialization.
//! - **`error`**: The crate-wide `SonarError` type.

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod report;
pub mod state;
pub mod subsystem;
pub mod tracing_setup;

pub use acquisition::{AcquisitionHandle, AcquisitionLoop, AcquisitionSummary};
pub use error::{AppResult, SonarError};
pub use hardware::maxbotix::{FrameParser, Reading};
pub use hardware::Model;
pub use state::SharedRangeState;
pub use subsystem::Rangefinder;
