use std::io::Write;

use spikeval_core::stream::BatchSource;
use spikeval_core::{EvalError, Geometry, RecordingStream};

const SPAN: usize = 256;
const N_CHAN: usize = 4;
const SAMPLE_RATE: f32 = 20_000.0;

/// Sites far enough apart that radius 10 leaves every channel alone.
fn sparse_geometry() -> Geometry {
    Geometry::from_sites(vec![(0.0, 0.0), (100.0, 0.0), (200.0, 0.0), (300.0, 0.0)]).unwrap()
}

fn write_recording(samples: &[i16]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for &s in samples {
        file.write_all(&s.to_le_bytes()).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Deterministic non-trivial waveform: distinct per channel, wandering in
/// time.
fn test_samples(n_batches: usize) -> Vec<i16> {
    let n = n_batches * SPAN * N_CHAN;
    (0..n)
        .map(|i| {
            let t = i / N_CHAN;
            let c = i % N_CHAN;
            (((t * (c + 3)) % 173) as i16) - 86
        })
        .collect()
}

#[test]
fn batches_come_back_full_length_and_finite() {
    let file = write_recording(&test_samples(2));
    let mut stream =
        RecordingStream::open(file.path(), sparse_geometry(), SAMPLE_RATE, SPAN, 10.0).unwrap();

    for _ in 0..2 {
        let block = stream.next_batch().unwrap();
        assert_eq!(block.len(), SPAN * N_CHAN);
        assert!(block.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn cursor_tracks_batches_consumed() {
    let file = write_recording(&test_samples(2));
    let mut stream =
        RecordingStream::open(file.path(), sparse_geometry(), SAMPLE_RATE, SPAN, 10.0).unwrap();

    assert_eq!(stream.cursor(), 0);
    stream.next_batch().unwrap();
    assert_eq!(stream.cursor(), 1);
    stream.next_batch().unwrap();
    assert_eq!(stream.cursor(), 2);

    stream.reset_cursor().unwrap();
    assert_eq!(stream.cursor(), 0);
}

#[test]
fn short_tail_is_an_end_of_stream_error() {
    // One full batch plus a quarter of another.
    let mut samples = test_samples(1);
    samples.extend_from_slice(&test_samples(1)[..SPAN * N_CHAN / 4]);
    let file = write_recording(&samples);

    let mut stream =
        RecordingStream::open(file.path(), sparse_geometry(), SAMPLE_RATE, SPAN, 10.0).unwrap();
    stream.next_batch().unwrap();

    let err = stream.next_batch().unwrap_err();
    match err {
        EvalError::EndOfStream {
            batch,
            expected,
            found,
        } => {
            assert_eq!(batch, 1);
            assert_eq!(expected, SPAN * N_CHAN);
            assert_eq!(found, SPAN * N_CHAN / 4);
        }
        other => panic!("expected EndOfStream, got {:?}", other),
    }
}

#[test]
fn reset_replays_the_recording_identically() {
    let file = write_recording(&test_samples(1));
    let mut stream =
        RecordingStream::open(file.path(), sparse_geometry(), SAMPLE_RATE, SPAN, 10.0).unwrap();

    let first = stream.next_batch().unwrap();
    stream.reset_cursor().unwrap();
    let second = stream.next_batch().unwrap();
    assert_eq!(first, second);
}

#[test]
fn all_zero_recording_stays_zero() {
    let file = write_recording(&vec![0i16; SPAN * N_CHAN]);
    let mut stream =
        RecordingStream::open(file.path(), sparse_geometry(), SAMPLE_RATE, SPAN, 10.0).unwrap();

    let block = stream.next_batch().unwrap();
    assert!(block.iter().all(|&v| v == 0.0));
}

#[test]
fn conditioned_blocks_are_roughly_unit_variance() {
    let file = write_recording(&test_samples(1));
    let mut stream =
        RecordingStream::open(file.path(), sparse_geometry(), SAMPLE_RATE, SPAN, 10.0).unwrap();

    let block = stream.next_batch().unwrap();
    let n = block.len() as f64;
    let second_moment = block.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>() / n;
    // Rescale puts the block at unit variance; whitening over singleton
    // neighborhoods keeps each channel near it.
    assert!(
        second_moment > 0.2 && second_moment < 5.0,
        "second moment {}",
        second_moment
    );
}
