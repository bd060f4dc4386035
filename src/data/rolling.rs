//! Fixed-capacity rolling average.
//!
//! [`RollingWindow`] keeps the most recent `N` samples in a circular buffer along
//! with their running sum, so both [`RollingWindow::add`] and
//! [`RollingWindow::average`] are O(1) and never allocate after construction.
//!
//! # Warm-up
//!
//! All slots start at zero and the average always divides by the full capacity.
//! Until `N` samples have been added the average is therefore biased low. This
//! is the expected behaviour; callers that care can check
//! [`RollingWindow::is_warm`] or [`RollingWindow::samples_seen`].
//!
//! # Example
//! ```
//! use sonar_daq::data::rolling::RollingWindow;
//! use std::num::NonZeroUsize;
//!
//! let mut window = RollingWindow::new(NonZeroUsize::new(3).unwrap());
//! window.add(1.0);
//! window.add(2.0);
//! window.add(3.0);
//! assert_eq!(window.average(), 2.0);
//! ```

use std::num::NonZeroUsize;

/// Circular accumulator of `f64` samples with a running sum.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: Box<[f64]>,
    sum: f64,
    write_index: usize,
    samples_seen: u64,
}

impl RollingWindow {
    /// Create a zero-filled window holding `capacity` samples.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            samples: vec![0.0; capacity.get()].into_boxed_slice(),
            sum: 0.0,
            write_index: 0,
            samples_seen: 0,
        }
    }

    /// Replace the oldest sample with `x`.
    pub fn add(&mut self, x: f64) {
        let slot = &mut self.samples[self.write_index];
        self.sum -= *slot;
        *slot = x;
        self.sum += x;

        self.write_index += 1;
        if self.write_index == self.samples.len() {
            self.write_index = 0;
        }
        self.samples_seen = self.samples_seen.saturating_add(1);
    }

    /// Sum of all slots divided by the capacity.
    ///
    /// Slots that have not been written yet count as zero.
    pub fn average(&self) -> f64 {
        self.sum / self.samples.len() as f64
    }

    /// Number of slots in the window.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Total number of samples added since construction (not capped at capacity).
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// True once every slot holds a real sample.
    pub fn is_warm(&self) -> bool {
        self.samples_seen >= self.samples.len() as u64
    }

    /// Running sum of the slots.
    pub fn sum(&self) -> f64 {
        self.sum
    }
}
