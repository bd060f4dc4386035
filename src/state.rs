//! Latest range measurement shared between the acquisition task and readers.
//!
//! [`SharedRangeState`] has a single writer (the acquisition loop) and any
//! number of readers. The value and its sequence number live behind one
//! `parking_lot::RwLock`, so a reader always sees a complete write and
//! successive reads on one thread never go backwards.

use parking_lot::RwLock;
use serde::Serialize;

/// Value returned by [`SharedRangeState::range_cm_or_sentinel`] before the first reading.
pub const NO_READING: f64 = -1.0;

/// A published range value and its position in the publication order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeSnapshot {
    /// Range in centimetres.
    pub cm: f64,
    /// 1 for the first published value, incremented on every write.
    pub sequence: u64,
}

/// Most recent range value, safe to read from any task.
#[derive(Debug, Default)]
pub struct SharedRangeState {
    latest: RwLock<Option<RangeSnapshot>>,
}

impl SharedRangeState {
    /// Create an empty state with no reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new value, replacing the previous one.
    pub fn write(&self, cm: f64) {
        let mut latest = self.latest.write();
        let sequence = latest.map_or(1, |s| s.sequence + 1);
        *latest = Some(RangeSnapshot { cm, sequence });
    }

    /// Latest value, if any has been published.
    pub fn read(&self) -> Option<f64> {
        self.latest.read().map(|s| s.cm)
    }

    /// Latest value with its sequence number.
    pub fn snapshot(&self) -> Option<RangeSnapshot> {
        *self.latest.read()
    }

    /// Latest value, or [`NO_READING`].
    pub fn range_cm_or_sentinel(&self) -> f64 {
        self.read().unwrap_or(NO_READING)
    }

    /// True once at least one value has been published.
    pub fn has_value(&self) -> bool {
        self.latest.read().is_some()
    }
}
