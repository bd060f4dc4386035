//! Analog voltage output of the rangefinder.
//!
//! MaxBotix sensors also drive an analog pin proportional to distance. The
//! voltage is read through an external [`AnalogInput`] and scaled like a
//! potentiometer: `voltage / supply * full_range + offset`.

use std::sync::Arc;

/// An analog input channel supplied by the host platform.
pub trait AnalogInput: Send + Sync {
    /// Present voltage on the channel, in volts.
    fn voltage(&self) -> f64;

    /// Supply voltage the sensor output is ratiometric to.
    fn supply_voltage(&self) -> f64 {
        5.0
    }
}

/// Scales an [`AnalogInput`] into centimetres.
#[derive(Clone)]
pub struct AnalogPotentiometer {
    input: Arc<dyn AnalogInput>,
    full_range_cm: f64,
    offset_cm: f64,
}

impl AnalogPotentiometer {
    /// Map the full supply voltage to `full_range_cm`, starting at `offset_cm`.
    pub fn new(input: Arc<dyn AnalogInput>, full_range_cm: f64, offset_cm: f64) -> Self {
        Self {
            input,
            full_range_cm,
            offset_cm,
        }
    }

    /// Current distance in centimetres, or `-1` if the supply voltage is unusable.
    pub fn get(&self) -> f64 {
        let supply = self.input.supply_voltage();
        if supply <= 0.0 || !supply.is_finite() {
            return -1.0;
        }
        self.input.voltage() / supply * self.full_range_cm + self.offset_cm
    }

    /// Distance represented by the full supply voltage.
    pub fn full_range_cm(&self) -> f64 {
        self.full_range_cm
    }
}

impl std::fmt::Debug for AnalogPotentiometer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalogPotentiometer")
            .field("full_range_cm", &self.full_range_cm)
            .field("offset_cm", &self.offset_cm)
            .finish_non_exhaustive()
    }
}
