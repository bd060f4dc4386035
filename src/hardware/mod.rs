//! Rangefinder hardware
//!
//! Supported MaxBotix models and the low-level pieces used to talk to them:
//!
//! - [`maxbotix`]: resumable parser for the `R<digits>\r` serial frames
//! - [`byte_source`]: the [`ByteSource`](byte_source::ByteSource) abstraction and its
//!   serial-port implementation
//! - [`mock_source`]: scripted byte sources for tests
//! - [`analog`]: analog voltage output scaling

pub mod analog;
pub mod byte_source;
pub mod maxbotix;
pub mod mock_source;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Centimetres per inch.
pub const CM_PER_INCH: f64 = 2.54;

/// Baud rate of the MaxBotix RS-232/TTL serial output.
pub const MAXBOTIX_BAUD_RATE: u32 = 9600;

/// Supported MaxBotix rangefinder models.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// MB1013 (HRLV-MaxSonar-EZ): serial output in millimetres, 5120 mm analog range.
    #[default]
    Mb1013,
    /// MB1200 (XL-MaxSonar-EZ0): serial output in centimetres, 1024 cm analog range.
    Mb1200,
}

impl Model {
    /// Divisor converting the raw serial value into centimetres.
    pub fn scale_factor(self) -> f64 {
        match self {
            Model::Mb1013 => 10.0,
            Model::Mb1200 => 1.0,
        }
    }

    /// Distance represented by a full-scale analog output, in centimetres.
    pub fn analog_full_range_cm(self) -> f64 {
        match self {
            Model::Mb1013 => 512.0,
            Model::Mb1200 => 1024.0,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Mb1013 => f.write_str("MB1013"),
            Model::Mb1200 => f.write_str("MB1200"),
        }
    }
}

/// Convert centimetres to inches, keeping the `-1` "no value" sentinel intact.
pub fn cm_to_inches(cm: f64) -> f64 {
    if cm == -1.0 {
        -1.0
    } else {
        cm / CM_PER_INCH
    }
}
