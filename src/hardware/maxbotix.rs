//! MaxBotix Serial Range Frames
//!
//! Protocol Overview:
//! - Format: ASCII, one frame per measurement
//! - Frame: `R` start marker, decimal digits, `\r` terminator (e.g. `R1234\r`)
//! - Digits: 3 or 4 in practice; no length limit is enforced
//! - Units: model dependent (MB1013 reports mm, MB1200 reports cm)
//!
//! [`FrameParser`] is a small resumable state machine. Bytes can be delivered in
//! arbitrary chunks, including one byte at a time, and decode exactly as if the
//! whole stream had arrived at once. Bytes outside a frame are discarded while
//! scanning for the next `R`. Any byte other than a digit or `\r` after the
//! marker aborts the frame and the parser resynchronises on the next marker.
//!
//! # Example
//! ```
//! use sonar_daq::hardware::maxbotix::FrameParser;
//!
//! let mut parser = FrameParser::new(10.0);
//! assert_eq!(parser.feed(b"R12").count(), 0);
//! let readings: Vec<_> = parser.feed(b"34\r").collect();
//! assert_eq!(readings[0].value_cm(), 123.4);
//! ```

use std::slice;

/// Frame start marker.
pub const START_MARKER: u8 = b'R';

/// Frame terminator.
pub const TERMINATOR: u8 = b'\r';

/// One decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Integer value exactly as transmitted.
    pub raw: u64,
    /// Divisor converting `raw` into centimetres.
    pub scale_factor: f64,
}

impl Reading {
    /// Measurement in centimetres.
    pub fn value_cm(&self) -> f64 {
        self.raw as f64 / self.scale_factor
    }
}

/// Resumable decoder for `R<digits>\r` frames.
#[derive(Debug, Clone)]
pub struct FrameParser {
    scale_factor: f64,
    marker_seen: bool,
    accumulated: u64,
    frames_decoded: u64,
    framing_errors: u64,
}

impl FrameParser {
    /// Create a parser whose readings divide the raw value by `scale_factor`.
    pub fn new(scale_factor: f64) -> Self {
        Self {
            scale_factor,
            marker_seen: false,
            accumulated: 0,
            frames_decoded: 0,
            framing_errors: 0,
        }
    }

    /// Feed a chunk of bytes and iterate over the readings it completes.
    ///
    /// Decoding is lazy: bytes are consumed as the iterator advances. Drain the
    /// iterator before the next call, otherwise the unconsumed tail of `bytes`
    /// is never seen by the parser.
    pub fn feed<'p, 'b>(&'p mut self, bytes: &'b [u8]) -> Frames<'p, 'b> {
        Frames {
            parser: self,
            bytes: bytes.iter(),
        }
    }

    /// Advance the state machine by one byte.
    pub fn push_byte(&mut self, byte: u8) -> Option<Reading> {
        if !self.marker_seen {
            self.marker_seen = byte == START_MARKER;
            return None;
        }

        match byte {
            b'0'..=b'9' => {
                self.accumulated = self
                    .accumulated
                    .saturating_mul(10)
                    .saturating_add(u64::from(byte - b'0'));
                None
            }
            TERMINATOR => {
                let reading = Reading {
                    raw: self.accumulated,
                    scale_factor: self.scale_factor,
                };
                self.reset();
                self.frames_decoded += 1;
                tracing::trace!(raw = reading.raw, cm = reading.value_cm(), "decoded range frame");
                Some(reading)
            }
            other => {
                tracing::debug!(
                    byte = other,
                    partial = self.accumulated,
                    "unexpected byte inside range frame, resynchronising"
                );
                self.reset();
                self.framing_errors += 1;
                None
            }
        }
    }

    /// Drop any partially decoded frame and wait for the next start marker.
    pub fn reset(&mut self) {
        self.marker_seen = false;
        self.accumulated = 0;
    }

    /// True while a frame has started but not yet terminated.
    pub fn in_frame(&self) -> bool {
        self.marker_seen
    }

    /// Scale factor applied to emitted readings.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Frames successfully decoded since construction.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Frames aborted because of an unexpected byte.
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }
}

/// Lazy iterator returned by [`FrameParser::feed`].
#[derive(Debug)]
pub struct Frames<'p, 'b> {
    parser: &'p mut FrameParser,
    bytes: slice::Iter<'b, u8>,
}

impl Iterator for Frames<'_, '_> {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        for &byte in self.bytes.by_ref() {
            if let Some(reading) = self.parser.push_byte(byte) {
                return Some(reading);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Shortest frame is two bytes ("R\r")
        (0, Some(self.bytes.len() / 2 + 1))
    }
}
