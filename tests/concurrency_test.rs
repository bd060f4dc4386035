//! Readers on other threads racing the acquisition task.
//!
//! Every frame `R<n>\r` is decoded with scale factor 1, so the n-th published
//! reading is exactly `n` cm. A reader that ever sees `cm != sequence` has
//! observed a torn or mismatched write.

use sonar_daq::acquisition::AcquisitionLoop;
use sonar_daq::data::rate::RateEstimator;
use sonar_daq::hardware::maxbotix::FrameParser;
use sonar_daq::hardware::mock_source::ScriptedByteSource;
use sonar_daq::state::SharedRangeState;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FRAMES: u64 = 2_000;

fn frame_stream() -> Vec<u8> {
    (1..=FRAMES)
        .flat_map(|n| format!("R{n}\r").into_bytes())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_never_observe_torn_values() {
    let stream = frame_stream();
    // Odd chunk size so frames straddle read boundaries
    let source = ScriptedByteSource::from_chunks(stream.chunks(7));
    let state = Arc::new(SharedRangeState::new());
    let rate = Arc::new(RateEstimator::new(NonZeroUsize::new(16).unwrap()));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let state = state.clone();
            let rate = rate.clone();
            thread::spawn(move || {
                let mut last_sequence = 0;
                let mut observations = 0u64;
                while last_sequence < FRAMES {
                    if let Some(snapshot) = state.snapshot() {
                        assert_eq!(snapshot.cm, snapshot.sequence as f64);
                        assert!(snapshot.sequence >= last_sequence);
                        last_sequence = snapshot.sequence;
                        observations += 1;
                    }
                    let hz = rate.rate_hz();
                    assert!(hz.is_finite() && hz >= 0.0);
                    thread::yield_now();
                }
                observations
            })
        })
        .collect();

    let handle = AcquisitionLoop::new(
        Box::new(source),
        FrameParser::new(1.0),
        state.clone(),
        rate.clone(),
        CancellationToken::new(),
    )
    .spawn();

    let readers = tokio::task::spawn_blocking(move || {
        readers
            .into_iter()
            .map(|r| r.join().unwrap())
            .collect::<Vec<_>>()
    });
    let observations = tokio::time::timeout(Duration::from_secs(30), readers)
        .await
        .expect("readers never saw the final frame")
        .unwrap();
    assert!(observations.iter().all(|&n| n > 0));

    let summary = handle.stop().await.unwrap();
    assert_eq!(summary.readings, FRAMES);
    assert_eq!(summary.framing_errors, 0);
    assert_eq!(state.read(), Some(FRAMES as f64));
    assert_eq!(rate.samples_seen(), FRAMES);
}

#[test]
fn test_latest_value_cell_under_contention() {
    let state = Arc::new(SharedRangeState::new());

    let writer = {
        let state = state.clone();
        thread::spawn(move || {
            for n in 1..=FRAMES {
                state.write(n as f64);
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let state = state.clone();
            thread::spawn(move || {
                let mut last = -1.0;
                loop {
                    let value = state.range_cm_or_sentinel();
                    assert!(value >= last, "value went backwards: {value} < {last}");
                    last = value;
                    if value == FRAMES as f64 {
                        break;
                    }
                    thread::yield_now();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(state.snapshot().unwrap().sequence, FRAMES);
}
