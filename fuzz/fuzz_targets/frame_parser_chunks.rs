//! Fuzz target for FrameParser fragmentation invariance.
//!
//! Tests:
//! - Arbitrary byte streams never panic the parser
//! - Splitting a stream at arbitrary points yields exactly the readings
//!   produced by feeding it whole
//! - Error counters agree between the two deliveries

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sonar_daq::hardware::maxbotix::FrameParser;

#[derive(Debug, Arbitrary)]
struct ChunkInput {
    /// Raw stream, biased towards protocol bytes
    stream: Vec<StreamByte>,
    /// Chunk lengths used to split the stream
    splits: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum StreamByte {
    Marker,
    Terminator,
    Digit(u8),
    Other(u8),
}

impl StreamByte {
    fn to_byte(self) -> u8 {
        match self {
            StreamByte::Marker => b'R',
            StreamByte::Terminator => b'\r',
            StreamByte::Digit(d) => b'0' + d % 10,
            StreamByte::Other(b) => b,
        }
    }
}

fuzz_target!(|input: ChunkInput| {
    let stream: Vec<u8> = input.stream.iter().map(|b| b.to_byte()).collect();

    let mut whole = FrameParser::new(10.0);
    let expected: Vec<u64> = whole.feed(&stream).map(|r| r.raw).collect();

    let mut split = FrameParser::new(10.0);
    let mut actual = Vec::new();
    let mut rest = stream.as_slice();
    let mut sizes = input.splits.iter().cycle();
    while !rest.is_empty() {
        let size = match sizes.next() {
            Some(&s) => usize::from(s).max(1),
            None => rest.len(),
        };
        let (chunk, tail) = rest.split_at(size.min(rest.len()));
        actual.extend(split.feed(chunk).map(|r| r.raw));
        rest = tail;
    }

    assert_eq!(expected, actual, "readings depend on chunk boundaries");
    assert_eq!(whole.frames_decoded(), split.frames_decoded());
    assert_eq!(whole.framing_errors(), split.framing_errors());
    assert_eq!(whole.in_frame(), split.in_frame());
});
