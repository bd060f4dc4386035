//! Byte Sources
//!
//! The acquisition loop pulls raw bytes through the [`ByteSource`] trait so it
//! does not care whether they come from a real serial port, a test double, or a
//! recorded capture.
//!
//! # Types
//!
//! - [`ByteSource`]: async pull interface (`read` + `reset`)
//! - [`DynByteSource`]: type-erased boxed source
//! - [`SerialByteSource`]: adapter over any `AsyncRead` (serial port, duplex stream)
//!
//! # Utilities
//!
//! - [`open_serial_async`]: open a serial port with `spawn_blocking` (feature `serial`)
//! - [`drain_serial_buffer`]: discard stale bytes before acquisition starts
//!
//! # Example
//!
//! ```rust,ignore
//! use sonar_daq::hardware::byte_source::SerialByteSource;
//!
//! let mut source = SerialByteSource::open("/dev/ttyUSB0", 9600).await?;
//! source.reset().await?;
//! let chunk = source.read(64).await?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

// =============================================================================
// ByteSource Trait
// =============================================================================

/// Pull-based source of raw protocol bytes.
///
/// Implementations decide whether [`read`](ByteSource::read) blocks until data
/// arrives or returns immediately. An empty result means "nothing available
/// right now"; end-of-stream and hardware faults are reported as errors.
#[async_trait]
pub trait ByteSource: Send {
    /// Read at most `max_bytes` bytes.
    async fn read(&mut self, max_bytes: usize) -> io::Result<Bytes>;

    /// Discard anything buffered before acquisition starts.
    async fn reset(&mut self) -> io::Result<()>;

    /// Human-readable description used in log messages.
    fn describe(&self) -> String {
        "byte source".to_string()
    }
}

/// Type-erased boxed byte source.
pub type DynByteSource = Box<dyn ByteSource>;

// =============================================================================
// SerialByteSource
// =============================================================================

/// Default time spent draining stale bytes on [`ByteSource::reset`].
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(50);

/// [`ByteSource`] over any async reader.
///
/// Used with `tokio_serial::SerialStream` for real hardware and with
/// `tokio::io::DuplexStream` in tests. A zero-length read from the underlying
/// reader is end-of-stream and surfaces as [`io::ErrorKind::UnexpectedEof`].
#[derive(Debug)]
pub struct SerialByteSource<R> {
    port: R,
    name: String,
    drain_timeout: Duration,
}

impl<R: AsyncRead + Unpin + Send> SerialByteSource<R> {
    /// Wrap an already opened reader.
    pub fn new(port: R, name: impl Into<String>) -> Self {
        Self {
            port,
            name: name.into(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Set how long [`ByteSource::reset`] keeps draining.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Consume the adapter and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.port
    }
}

#[cfg(feature = "serial")]
impl SerialByteSource<tokio_serial::SerialStream> {
    /// Open `port_path` at `baud_rate` with 8N1 framing.
    pub async fn open(port_path: &str, baud_rate: u32) -> crate::error::AppResult<Self> {
        let port = open_serial_async(port_path, baud_rate).await?;
        Ok(Self::new(port, port_path))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for SerialByteSource<R> {
    async fn read(&mut self, max_bytes: usize) -> io::Result<Bytes> {
        if max_bytes == 0 {
            return Ok(Bytes::new());
        }
        let mut buf = vec![0u8; max_bytes];
        let n = self.port.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} closed", self.name),
            ));
        }
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    async fn reset(&mut self) -> io::Result<()> {
        let discarded = drain_serial_buffer(&mut self.port, self.drain_timeout).await;
        if discarded > 0 {
            tracing::debug!(port = %self.name, discarded, "discarded stale bytes");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// =============================================================================
// Serial Port Utilities
// =============================================================================

/// Open a serial port asynchronously using `spawn_blocking`.
///
/// Standard MaxBotix settings are applied: 8 data bits, no parity, one stop bit,
/// no flow control.
///
/// # Errors
///
/// Returns [`SonarError::SerialOpen`](crate::error::SonarError::SerialOpen) if the
/// port cannot be opened or the blocking task fails.
#[cfg(feature = "serial")]
pub async fn open_serial_async(
    port_path: &str,
    baud_rate: u32,
) -> crate::error::AppResult<tokio_serial::SerialStream> {
    use crate::error::SonarError;
    use tokio::task::spawn_blocking;
    use tokio_serial::SerialPortBuilderExt;

    let port_path_owned = port_path.to_string();

    spawn_blocking(move || {
        tokio_serial::new(&port_path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                SonarError::SerialOpen(format!("{port_path_owned} at {baud_rate} baud: {e}"))
            })
    })
    .await
    .map_err(|e| SonarError::TaskJoin(format!("serial open task failed: {e}")))?
}

/// Drain stale data from a reader.
///
/// Reads and discards bytes until nothing arrives within the remaining time,
/// the reader reports end-of-stream, or `timeout` elapses.
///
/// # Returns
///
/// Total number of bytes discarded.
pub async fn drain_serial_buffer<R: AsyncRead + Unpin>(port: &mut R, timeout: Duration) -> usize {
    let mut discard = [0u8; 256];
    let deadline = tokio::time::Instant::now() + timeout;
    let mut total_discarded = 0usize;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, port.read(&mut discard)).await {
            Ok(Ok(0)) => break, // EOF
            Ok(Ok(n)) => total_discarded += n,
            Ok(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => break,
            Ok(Err(_)) => break, // Real I/O error surfaces on the next read
            Err(_) => break,     // Timeout, no more immediate data
        }
    }

    total_discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_returns_available_bytes() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut source = SerialByteSource::new(device, "duplex");

        host.write_all(b"R1234\r").await.unwrap();

        let chunk = source.read(64).await.unwrap();
        assert_eq!(&chunk[..], b"R1234\r");
    }

    #[tokio::test]
    async fn test_read_respects_max_bytes() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut source = SerialByteSource::new(device, "duplex");

        host.write_all(b"R1234\r").await.unwrap();

        assert_eq!(&source.read(2).await.unwrap()[..], b"R1");
        assert_eq!(&source.read(64).await.unwrap()[..], b"234\r");
        assert!(source.read(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_stream_is_unexpected_eof() {
        let (host, device) = tokio::io::duplex(64);
        let mut source = SerialByteSource::new(device, "duplex");
        drop(host);

        let err = source.read(16).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("duplex"));
    }

    #[tokio::test]
    async fn test_reset_drains_stale_bytes() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut source =
            SerialByteSource::new(device, "duplex").with_drain_timeout(Duration::from_millis(20));

        host.write_all(b"stale R99").await.unwrap();
        source.reset().await.unwrap();

        host.write_all(b"R42\r").await.unwrap();
        assert_eq!(&source.read(64).await.unwrap()[..], b"R42\r");
    }

    #[tokio::test]
    async fn test_drain_serial_buffer_counts_bytes() {
        let (mut host, mut device) = tokio::io::duplex(64);
        host.write_all(b"stale data 12345").await.unwrap();

        let discarded = drain_serial_buffer(&mut device, Duration::from_millis(50)).await;
        assert_eq!(discarded, 16);
    }

    #[tokio::test]
    async fn test_boxed_source_dispatch() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut source: DynByteSource = Box::new(SerialByteSource::new(device, "boxed"));

        host.write_all(b"R7\r").await.unwrap();
        assert_eq!(&source.read(8).await.unwrap()[..], b"R7\r");
        assert_eq!(source.describe(), "boxed");
    }
}
