//! Sample-rate estimation from inter-arrival intervals.
//!
//! [`RateEstimator`] records the time between successive calls to
//! [`RateEstimator::add_sample`] in a [`RollingWindow`] and reports the inverse of
//! the mean interval as a frequency in Hz.
//!
//! The window and the last timestamp are guarded together by one mutex. The lock
//! is only held for the in-memory update, so readers calling
//! [`RateEstimator::rate_hz`] from other tasks never wait on I/O.
//!
//! Before any interval has been recorded the window average is zero. Instead of
//! dividing by zero, [`RateEstimator::rate_hz`] returns [`RATE_UNAVAILABLE`].

use super::rolling::RollingWindow;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use tokio::time::Instant;

/// Number of intervals averaged when no window size is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Rate reported while the window average is not yet positive.
pub const RATE_UNAVAILABLE: f64 = 0.0;

#[derive(Debug)]
struct RateInner {
    window: RollingWindow,
    last_timestamp: Instant,
    started: bool,
}

/// Thread-safe rolling estimate of how often samples arrive.
#[derive(Debug)]
pub struct RateEstimator {
    window_size: NonZeroUsize,
    inner: Mutex<RateInner>,
}

impl RateEstimator {
    /// Create an estimator averaging over `window_size` intervals.
    ///
    /// The estimator is idle until [`start`](Self::start) is called.
    pub fn new(window_size: NonZeroUsize) -> Self {
        Self {
            window_size,
            inner: Mutex::new(RateInner {
                window: RollingWindow::new(window_size),
                last_timestamp: Instant::now(),
                started: false,
            }),
        }
    }

    /// Reset the window and begin timing from now.
    pub fn start(&self) {
        self.start_at(Instant::now());
    }

    /// Reset the window and begin timing from `now`.
    pub fn start_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.window = RollingWindow::new(self.window_size);
        inner.last_timestamp = now;
        inner.started = true;
    }

    /// Record that a sample arrived now.
    pub fn add_sample(&self) {
        self.add_sample_at(Instant::now());
    }

    /// Record that a sample arrived at `now`.
    ///
    /// If the estimator was never started, this call starts it and records no
    /// interval.
    pub fn add_sample_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        if !inner.started {
            inner.last_timestamp = now;
            inner.started = true;
            return;
        }
        let delta = now.saturating_duration_since(inner.last_timestamp);
        inner.last_timestamp = now;
        inner.window.add(delta.as_secs_f64());
    }

    /// Samples per second, or [`RATE_UNAVAILABLE`] before any interval is known.
    pub fn rate_hz(&self) -> f64 {
        let average = self.inner.lock().window.average();
        if average > 0.0 && average.is_finite() {
            1.0 / average
        } else {
            RATE_UNAVAILABLE
        }
    }

    /// True once the window holds `window_size` real intervals.
    pub fn is_warm(&self) -> bool {
        self.inner.lock().window.is_warm()
    }

    /// Number of intervals recorded since the last start.
    pub fn samples_seen(&self) -> u64 {
        self.inner.lock().window.samples_seen()
    }

    /// Configured window size.
    pub fn window_size(&self) -> usize {
        self.window_size.get()
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn estimator(window: usize) -> RateEstimator {
        RateEstimator::new(NonZeroUsize::new(window).unwrap())
    }

    #[test]
    fn test_rate_before_any_sample_is_sentinel() {
        let rate = RateEstimator::default();
        assert_eq!(rate.rate_hz(), RATE_UNAVAILABLE);

        rate.start();
        assert_eq!(rate.rate_hz(), RATE_UNAVAILABLE);
        assert!(!rate.is_warm());
    }

    #[test]
    fn test_constant_interval_converges_to_frequency() {
        let rate = RateEstimator::default();
        let t0 = Instant::now();
        rate.start_at(t0);

        for i in 1..=DEFAULT_WINDOW_SIZE as u64 {
            rate.add_sample_at(t0 + Duration::from_millis(100 * i));
        }

        assert!(rate.is_warm());
        assert!((rate.rate_hz() - 10.0).abs() < 1e-9, "rate = {}", rate.rate_hz());
    }

    #[test]
    fn test_cold_window_overestimates_rate() {
        let rate = estimator(4);
        let t0 = Instant::now();
        rate.start_at(t0);

        rate.add_sample_at(t0 + Duration::from_millis(100));
        // One 0.1 s interval among four slots: average 0.025 s
        assert!((rate.rate_hz() - 40.0).abs() < 1e-9);
        assert_eq!(rate.samples_seen(), 1);
    }

    #[test]
    fn test_zero_intervals_do_not_divide_by_zero() {
        let rate = estimator(3);
        let t0 = Instant::now();
        rate.start_at(t0);
        for _ in 0..5 {
            rate.add_sample_at(t0);
        }
        assert_eq!(rate.rate_hz(), RATE_UNAVAILABLE);
    }

    #[test]
    fn test_add_sample_without_start_starts_timing() {
        let rate = estimator(1);
        let t0 = Instant::now();
        rate.add_sample_at(t0);
        assert_eq!(rate.samples_seen(), 0);

        rate.add_sample_at(t0 + Duration::from_millis(250));
        assert!((rate.rate_hz() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_restart_clears_window() {
        let rate = estimator(2);
        let t0 = Instant::now();
        rate.start_at(t0);
        rate.add_sample_at(t0 + Duration::from_millis(10));
        rate.add_sample_at(t0 + Duration::from_millis(20));
        assert!(rate.rate_hz() > 0.0);

        rate.start_at(t0 + Duration::from_millis(30));
        assert_eq!(rate.rate_hz(), RATE_UNAVAILABLE);
        assert_eq!(rate.samples_seen(), 0);
    }

    #[test]
    fn test_concurrent_readers_see_finite_rates() {
        let rate = Arc::new(estimator(10));
        let t0 = Instant::now();
        rate.start_at(t0);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let rate = rate.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let hz = rate.rate_hz();
                        assert!(hz.is_finite());
                        assert!(hz >= 0.0);
                    }
                })
            })
            .collect();

        for i in 1..=1_000u64 {
            rate.add_sample_at(t0 + Duration::from_millis(i));
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert!((rate.rate_hz() - 1_000.0).abs() < 1e-6);
    }
}
