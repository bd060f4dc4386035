//! Range acquisition task.
//!
//! [`AcquisitionLoop`] is the single producer of range readings. It pulls bytes
//! from a [`ByteSource`](crate::hardware::byte_source::ByteSource), feeds them
//! through a [`FrameParser`], and for every decoded reading:
//!
//! 1. publishes the value to [`SharedRangeState`]
//! 2. records an arrival in the [`RateEstimator`]
//!
//! The loop checks its [`CancellationToken`] on every iteration and races each
//! read and idle backoff against it, so a stop request is honoured even while
//! the source is blocked. No lock is held while waiting on the source.
//!
//! A failing source is fatal: the loop logs the error, drops the source and
//! hands the error to whoever awaits the task. It never retries on its own.
//!
//! # Example
//! ```rust,ignore
//! let handle = AcquisitionLoop::new(source, parser, state.clone(), rate.clone(), cancel)
//!     .spawn();
//! // ...
//! let summary = handle.stop().await?;
//! ```

use crate::data::rate::RateEstimator;
use crate::error::{AppResult, SonarError};
use crate::hardware::byte_source::DynByteSource;
use crate::hardware::maxbotix::FrameParser;
use crate::state::SharedRangeState;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace};

/// Tuning for the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Upper bound on bytes requested per read.
    pub max_read_bytes: usize,
    /// Pause after an empty read before polling the source again.
    pub idle_backoff: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_read_bytes: 64,
            idle_backoff: Duration::from_millis(10),
        }
    }
}

/// Counters reported when the loop stops cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionSummary {
    /// Readings published.
    pub readings: u64,
    /// Bytes pulled from the source.
    pub bytes_read: u64,
    /// Frames dropped because of unexpected bytes.
    pub framing_errors: u64,
}

/// Producer task connecting a byte source to the shared range state.
pub struct AcquisitionLoop {
    source: DynByteSource,
    parser: FrameParser,
    state: Arc<SharedRangeState>,
    rate: Arc<RateEstimator>,
    config: AcquisitionConfig,
    cancel: CancellationToken,
}

impl AcquisitionLoop {
    /// Assemble a loop. Nothing runs until [`run`](Self::run) or [`spawn`](Self::spawn).
    pub fn new(
        source: DynByteSource,
        parser: FrameParser,
        state: Arc<SharedRangeState>,
        rate: Arc<RateEstimator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            parser,
            state,
            rate,
            config: AcquisitionConfig::default(),
            cancel,
        }
    }

    /// Override the default read size and idle backoff.
    pub fn with_config(mut self, config: AcquisitionConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the loop on the tokio runtime.
    pub fn spawn(self) -> AcquisitionHandle {
        let (running_tx, running_rx) = watch::channel(true);
        let control = AcquisitionControl {
            cancel: self.cancel.clone(),
            running: running_rx,
        };
        let guard = RunningGuard(running_tx);
        let task = tokio::spawn(async move {
            let _guard = guard;
            self.run().await
        });
        AcquisitionHandle {
            control,
            task: Some(task),
        }
    }

    /// Acquire until cancelled or the source fails.
    ///
    /// The source is reset and the rate estimator restarted before the first
    /// read. The source is dropped when this future completes.
    ///
    /// # Errors
    /// Returns [`SonarError::SourceRead`] or [`SonarError::SourceClosed`] when
    /// the byte source fails.
    #[instrument(name = "acquisition", skip_all)]
    pub async fn run(mut self) -> AppResult<AcquisitionSummary> {
        let source_name = self.source.describe();
        let mut summary = AcquisitionSummary::default();

        let reset = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(summary),
            result = self.source.reset() => result,
        };
        if let Err(e) = reset {
            let err = SonarError::from_source(e);
            error!(source = %source_name, error = %err, "failed to reset byte source");
            return Err(err);
        }

        self.rate.start();
        info!(
            source = %source_name,
            scale_factor = self.parser.scale_factor(),
            "range acquisition started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.source.read(self.config.max_read_bytes) => result,
            };

            let chunk = match read {
                Ok(chunk) => chunk,
                Err(e) => {
                    let err = SonarError::from_source(e);
                    error!(
                        source = %source_name,
                        error = %err,
                        readings = summary.readings,
                        "range acquisition stopped: byte source failed"
                    );
                    return Err(err);
                }
            };

            if chunk.is_empty() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.idle_backoff) => continue,
                }
            }

            trace!(bytes = chunk.len(), "read chunk");
            summary.bytes_read += chunk.len() as u64;

            for reading in self.parser.feed(&chunk) {
                if self.cancel.is_cancelled() {
                    break;
                }
                self.state.write(reading.value_cm());
                self.rate.add_sample();
                summary.readings += 1;
            }
        }

        summary.framing_errors = self.parser.framing_errors();
        info!(
            source = %source_name,
            readings = summary.readings,
            bytes_read = summary.bytes_read,
            framing_errors = summary.framing_errors,
            "range acquisition stopped"
        );
        Ok(summary)
    }
}

/// Clears the running flag when the spawned task ends, including by panic.
struct RunningGuard(watch::Sender<bool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// Cloneable stop and status control for a spawned [`AcquisitionLoop`].
///
/// Stays usable after the [`AcquisitionHandle`] has been moved into another
/// task that is awaiting the result.
#[derive(Debug, Clone)]
pub struct AcquisitionControl {
    cancel: CancellationToken,
    running: watch::Receiver<bool>,
}

impl AcquisitionControl {
    /// Request the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True until the task has exited, for any reason.
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Wait until the task has exited.
    pub async fn stopped(&self) {
        let mut running = self.running.clone();
        // A closed channel means the guard is gone, so the task is too
        let _ = running.wait_for(|running| !*running).await;
    }
}

/// Handle to a spawned [`AcquisitionLoop`].
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct AcquisitionHandle {
    control: AcquisitionControl,
    task: Option<JoinHandle<AppResult<AcquisitionSummary>>>,
}

impl AcquisitionHandle {
    /// Request the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Token shared with the loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.control.cancel.clone()
    }

    /// Control that outlives moving or joining this handle.
    pub fn control(&self) -> AcquisitionControl {
        self.control.clone()
    }

    /// True once the task has exited, for any reason.
    pub fn is_finished(&self) -> bool {
        !self.control.is_running()
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// # Errors
    /// Returns the source error if the loop had already failed, or
    /// [`SonarError::TaskJoin`] if the task panicked.
    pub async fn stop(mut self) -> AppResult<AcquisitionSummary> {
        self.control.cancel();
        self.wait().await
    }

    /// Wait for the loop to exit on its own.
    ///
    /// # Errors
    /// See [`stop`](Self::stop).
    pub async fn join(mut self) -> AppResult<AcquisitionSummary> {
        self.wait().await
    }

    async fn wait(&mut self) -> AppResult<AcquisitionSummary> {
        let task = self
            .task
            .take()
            .ok_or_else(|| SonarError::TaskJoin("acquisition task already joined".into()))?;
        task.await
            .map_err(|e| SonarError::TaskJoin(format!("acquisition task: {e}")))?
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        self.control.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::byte_source::ByteSource;
    use crate::hardware::mock_source::{self, ScriptedByteSource};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::io;
    use std::num::NonZeroUsize;

    /// Delivers one chunk of complete frames and requests cancellation while
    /// doing so, as if a stop arrived during the read.
    struct CancelDuringRead {
        cancel: CancellationToken,
        chunk: Option<Bytes>,
    }

    #[async_trait]
    impl ByteSource for CancelDuringRead {
        async fn read(&mut self, _max_bytes: usize) -> io::Result<Bytes> {
            self.cancel.cancel();
            Ok(self.chunk.take().unwrap_or_default())
        }

        async fn reset(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn components() -> (Arc<SharedRangeState>, Arc<RateEstimator>) {
        (
            Arc::new(SharedRangeState::new()),
            Arc::new(RateEstimator::new(NonZeroUsize::new(4).unwrap())),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_publishes_readings_then_stops() {
        let (state, rate) = components();
        let source = ScriptedByteSource::from_chunks(["R100\rR2", "00\r"]);
        let stats = source.stats();
        let cancel = CancellationToken::new();

        let handle = AcquisitionLoop::new(
            Box::new(source),
            FrameParser::new(1.0),
            state.clone(),
            rate.clone(),
            cancel,
        )
        .spawn();

        while state.snapshot().map(|s| s.sequence) != Some(2) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let summary = handle.stop().await.unwrap();
        assert_eq!(summary.readings, 2);
        assert_eq!(summary.bytes_read, 10);
        assert_eq!(state.read(), Some(200.0));
        assert_eq!(rate.samples_seen(), 2);
        assert_eq!(stats.resets(), 1);
        assert!(stats.is_dropped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_never_reads() {
        let (state, rate) = components();
        let source = ScriptedByteSource::from_chunks(["R1\r"]);
        let stats = source.stats();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = AcquisitionLoop::new(
            Box::new(source),
            FrameParser::new(1.0),
            state.clone(),
            rate,
            cancel,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(summary, AcquisitionSummary::default());
        assert_eq!(stats.reads(), 0);
        assert!(stats.is_dropped());
        assert!(!state.has_value());
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_is_returned() {
        let (state, rate) = components();
        let source = ScriptedByteSource::from_chunks(["R5\r"])
            .then_fail(std::io::ErrorKind::BrokenPipe, "unplugged");

        let err = AcquisitionLoop::new(
            Box::new(source),
            FrameParser::new(1.0),
            state.clone(),
            rate,
            CancellationToken::new(),
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(err, SonarError::SourceRead(_)));
        assert_eq!(state.read(), Some(5.0));
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_task() {
        let (state, rate) = components();
        let cancel = CancellationToken::new();
        let handle = AcquisitionLoop::new(
            Box::new(ScriptedByteSource::default()),
            FrameParser::new(1.0),
            state,
            rate,
            cancel.clone(),
        )
        .spawn();

        drop(handle);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_mid_chunk_publishes_nothing_further() {
        let (state, rate) = components();
        let cancel = CancellationToken::new();
        let source = CancelDuringRead {
            cancel: cancel.clone(),
            chunk: Some(Bytes::from_static(b"R1\rR2\rR3\r")),
        };

        let summary = AcquisitionLoop::new(
            Box::new(source),
            FrameParser::new(1.0),
            state.clone(),
            rate.clone(),
            cancel,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(summary.readings, 0);
        assert_eq!(summary.bytes_read, 9);
        assert!(!state.has_value());
        assert_eq!(rate.samples_seen(), 0);
    }

    #[tokio::test]
    async fn test_control_outlives_joined_handle() {
        let (state, rate) = components();
        let (source, harness) = mock_source::new();
        let handle = AcquisitionLoop::new(
            Box::new(source),
            FrameParser::new(1.0),
            state,
            rate,
            CancellationToken::new(),
        )
        .spawn();
        let control = handle.control();
        assert!(control.is_running());

        let joiner = tokio::spawn(handle.join());
        tokio::task::yield_now().await;
        assert!(control.is_running());

        control.cancel();
        control.stopped().await;
        assert!(!control.is_running());
        assert!(joiner.await.unwrap().is_ok());
        assert!(harness.stats().is_dropped());
    }
}
