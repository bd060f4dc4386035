//! Mock byte sources for testing the acquisition loop
//!
//! Two doubles are provided:
//!
//! - [`MockByteSource`] + [`MockSourceHarness`]: a channel-backed source whose
//!   `read` waits until the harness pushes bytes or an error, like a blocking
//!   serial port.
//! - [`ScriptedByteSource`]: a non-blocking source that replays a fixed list of
//!   chunks and errors, then returns empty reads forever.
//!
//! Both share a [`SourceStats`] handle so tests can observe how often the loop
//! read, whether it reset the source, and whether the source was released.
//!
//! # Example
//!
//! ```rust,ignore
//! use sonar_daq::hardware::mock_source;
//!
//! let (source, harness) = mock_source::new();
//! harness.send_bytes(b"R0123\r").unwrap();
//! ```

use super::byte_source::ByteSource;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Counters shared between a mock source and the test that owns it.
#[derive(Debug, Default)]
pub struct SourceStats {
    reads: AtomicUsize,
    resets: AtomicUsize,
    dropped: AtomicBool,
}

impl SourceStats {
    /// Number of `read` calls made so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `reset` calls made so far.
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// True once the source has been dropped.
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum MockEvent {
    Data(Vec<u8>),
    Fail(io::ErrorKind, String),
}

// =============================================================================
// MockByteSource
// =============================================================================

/// The loop-facing side of the channel-backed mock.
#[derive(Debug)]
pub struct MockByteSource {
    events: UnboundedReceiver<MockEvent>,
    read_buffer: VecDeque<u8>,
    stats: Arc<SourceStats>,
}

/// The test-facing side for scripting a [`MockByteSource`].
#[derive(Debug, Clone)]
pub struct MockSourceHarness {
    events: UnboundedSender<MockEvent>,
    stats: Arc<SourceStats>,
}

/// Creates a connected pair of [`MockByteSource`] and [`MockSourceHarness`].
pub fn new() -> (MockByteSource, MockSourceHarness) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = Arc::new(SourceStats::default());

    let source = MockByteSource {
        events: rx,
        read_buffer: VecDeque::new(),
        stats: stats.clone(),
    };
    let harness = MockSourceHarness { events: tx, stats };

    (source, harness)
}

impl MockByteSource {
    fn take_buffered(&mut self, max_bytes: usize) -> Bytes {
        let n = max_bytes.min(self.read_buffer.len());
        self.read_buffer.drain(..n).collect::<Vec<u8>>().into()
    }
}

#[async_trait]
impl ByteSource for MockByteSource {
    async fn read(&mut self, max_bytes: usize) -> io::Result<Bytes> {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);

        if !self.read_buffer.is_empty() || max_bytes == 0 {
            return Ok(self.take_buffered(max_bytes));
        }

        match self.events.recv().await {
            Some(MockEvent::Data(chunk)) => {
                self.read_buffer.extend(chunk);
                Ok(self.take_buffered(max_bytes))
            }
            Some(MockEvent::Fail(kind, message)) => Err(io::Error::new(kind, message)),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "mock source harness disconnected",
            )),
        }
    }

    async fn reset(&mut self) -> io::Result<()> {
        self.stats.resets.fetch_add(1, Ordering::SeqCst);
        self.read_buffer.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        "mock source".to_string()
    }
}

impl Drop for MockByteSource {
    fn drop(&mut self) {
        self.stats.dropped.store(true, Ordering::SeqCst);
    }
}

impl MockSourceHarness {
    /// Deliver bytes to the next `read`.
    ///
    /// # Errors
    /// Returns error if the source has been dropped
    pub fn send_bytes(&self, data: &[u8]) -> Result<(), &'static str> {
        self.events
            .send(MockEvent::Data(data.to_vec()))
            .map_err(|_| "mock source dropped")
    }

    /// Make the next `read` fail with `kind`.
    ///
    /// # Errors
    /// Returns error if the source has been dropped
    pub fn fail(&self, kind: io::ErrorKind, message: &str) -> Result<(), &'static str> {
        self.events
            .send(MockEvent::Fail(kind, message.to_string()))
            .map_err(|_| "mock source dropped")
    }

    /// Shared counters for the paired source.
    pub fn stats(&self) -> Arc<SourceStats> {
        self.stats.clone()
    }
}

// =============================================================================
// ScriptedByteSource
// =============================================================================

/// Non-blocking source that replays a script, then reports no data.
#[derive(Debug, Default)]
pub struct ScriptedByteSource {
    script: VecDeque<io::Result<Vec<u8>>>,
    stats: Arc<SourceStats>,
}

impl ScriptedByteSource {
    /// Replay `chunks` in order, one per `read`.
    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            script: chunks.into_iter().map(|c| Ok(c.as_ref().to_vec())).collect(),
            stats: Arc::new(SourceStats::default()),
        }
    }

    /// Replay `data` one byte per `read`.
    pub fn byte_at_a_time(data: &[u8]) -> Self {
        Self::from_chunks(data.iter().map(|b| [*b]))
    }

    /// Append a read failure after the scripted chunks.
    pub fn then_fail(mut self, kind: io::ErrorKind, message: &str) -> Self {
        self.script.push_back(Err(io::Error::new(kind, message.to_string())));
        self
    }

    /// Shared counters for this source.
    pub fn stats(&self) -> Arc<SourceStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl ByteSource for ScriptedByteSource {
    async fn read(&mut self, max_bytes: usize) -> io::Result<Bytes> {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(mut chunk)) => {
                if chunk.len() > max_bytes {
                    let rest = chunk.split_off(max_bytes);
                    self.script.push_front(Ok(rest));
                }
                Ok(Bytes::from(chunk))
            }
            Some(Err(e)) => Err(e),
            None => Ok(Bytes::new()),
        }
    }

    async fn reset(&mut self) -> io::Result<()> {
        self.stats.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted source".to_string()
    }
}

impl Drop for ScriptedByteSource {
    fn drop(&mut self) {
        self.stats.dropped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_delivers_chunks() {
        let (mut source, harness) = new();
        harness.send_bytes(b"R12").unwrap();
        harness.send_bytes(b"3\r").unwrap();

        assert_eq!(&source.read(2).await.unwrap()[..], b"R1");
        assert_eq!(&source.read(8).await.unwrap()[..], b"2");
        assert_eq!(&source.read(8).await.unwrap()[..], b"3\r");
        assert_eq!(harness.stats().reads(), 3);
    }

    #[tokio::test]
    async fn test_mock_source_failure_and_disconnect() {
        let (mut source, harness) = new();
        harness.fail(io::ErrorKind::BrokenPipe, "unplugged").unwrap();

        let err = source.read(8).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        drop(harness);
        let err = source.read(8).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_mock_source_reports_drop() {
        let (source, harness) = new();
        let stats = harness.stats();
        assert!(!stats.is_dropped());
        drop(source);
        assert!(stats.is_dropped());
        assert!(harness.send_bytes(b"R1\r").is_err());
    }

    #[tokio::test]
    async fn test_scripted_source_splits_and_idles() {
        let mut source = ScriptedByteSource::from_chunks([b"R1234\r".as_slice()])
            .then_fail(io::ErrorKind::TimedOut, "late");

        assert_eq!(&source.read(4).await.unwrap()[..], b"R123");
        assert_eq!(&source.read(4).await.unwrap()[..], b"4\r");
        assert_eq!(source.read(4).await.unwrap_err().kind(), io::ErrorKind::TimedOut);
        assert!(source.read(4).await.unwrap().is_empty());
        assert!(source.read(4).await.unwrap().is_empty());
        assert_eq!(source.stats().reads(), 5);
    }

    #[tokio::test]
    async fn test_scripted_byte_at_a_time() {
        let mut source = ScriptedByteSource::byte_at_a_time(b"R9\r");
        let mut collected = Vec::new();
        for _ in 0..3 {
            collected.extend_from_slice(&source.read(16).await.unwrap());
        }
        assert_eq!(collected, b"R9\r");
    }
}
