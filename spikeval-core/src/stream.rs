//! Batched access to a raw multichannel recording.
//!
//! A recording file is fixed-width little-endian i16 samples, interleaved
//! `[time][channel]` row-major, with a constant channel count. The stream
//! reads it in whole batches and hands out conditioned (filtered, rescaled,
//! whitened) blocks.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::error::EvalError;
use crate::geometry::Geometry;
use crate::signal;

/// Band-pass low cutoff in Hz.
const LOW_CUT_HZ: f32 = 300.0;
/// Band-pass high cutoff as a fraction of the Nyquist frequency.
const HIGH_FRAC: f32 = 0.1;
/// Butterworth filter order.
const FILTER_ORDER: usize = 3;
/// Samples masked around excursions when estimating whitening covariances.
const WHITEN_HALFWIDTH: usize = 40;

/// Flat index into a `[time × channel]` row-major block.
#[inline]
pub fn sample_index(t: usize, channel: usize, n_chan: usize) -> usize {
    t * n_chan + channel
}

/// Producer of fixed-length conditioned recording blocks.
///
/// The cursor is the only mutable state: whichever component holds the
/// `&mut` drives the stream, and must call [`reset_cursor`] before handing
/// it to another pass. [`cursor`] reports how many batches have been
/// consumed since the last reset, so sequencing is visible to callers.
///
/// [`reset_cursor`]: BatchSource::reset_cursor
/// [`cursor`]: BatchSource::cursor
pub trait BatchSource {
    /// Channel count of every block.
    fn n_channels(&self) -> usize;

    /// Time samples per block.
    fn batch_span(&self) -> usize;

    /// Batches consumed since the last reset.
    fn cursor(&self) -> usize;

    /// Reads the next full block. A partial batch at the end of the source is
    /// an [`EvalError::EndOfStream`], never a short block: downstream
    /// accumulation assumes full-length blocks.
    fn next_batch(&mut self) -> Result<Vec<f32>, EvalError>;

    /// Rewinds to the start of the source for another pass.
    fn reset_cursor(&mut self) -> Result<(), EvalError>;
}

/// File-backed [`BatchSource`] that conditions each batch on the way out:
/// band-pass, global-standard-deviation rescale, neighborhood whitening.
pub struct RecordingStream {
    file: BufReader<File>,
    geometry: Geometry,
    neighbors: Vec<Vec<usize>>,
    sample_rate: f32,
    batch_span: usize,
    cursor: usize,
    raw: Vec<u8>,
}

impl RecordingStream {
    /// Opens a recording and builds the channel-neighbor table once from the
    /// geometry (`radius` inclusive).
    pub fn open(
        recording: &Path,
        geometry: Geometry,
        sample_rate: f32,
        batch_span: usize,
        radius: f64,
    ) -> Result<Self, EvalError> {
        let neighbors = geometry.neighbors(radius);
        let n_chan = geometry.n_channels();
        Ok(Self {
            file: BufReader::new(File::open(recording)?),
            geometry,
            neighbors,
            sample_rate,
            batch_span,
            cursor: 0,
            raw: vec![0u8; batch_span * n_chan * 2],
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Fills the raw buffer, reporting how many whole samples were read when
    /// the file ends early.
    fn fill_raw(&mut self) -> Result<(), EvalError> {
        let mut filled = 0usize;
        while filled < self.raw.len() {
            let n = self.file.read(&mut self.raw[filled..])?;
            if n == 0 {
                return Err(EvalError::EndOfStream {
                    batch: self.cursor,
                    expected: self.raw.len() / 2,
                    found: filled / 2,
                });
            }
            filled += n;
        }
        Ok(())
    }
}

impl BatchSource for RecordingStream {
    fn n_channels(&self) -> usize {
        self.geometry.n_channels()
    }

    fn batch_span(&self) -> usize {
        self.batch_span
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn next_batch(&mut self) -> Result<Vec<f32>, EvalError> {
        self.fill_raw()?;
        let n_chan = self.geometry.n_channels();

        let mut block: Vec<f32> = self
            .raw
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32)
            .collect();

        signal::bandpass(
            &mut block,
            n_chan,
            LOW_CUT_HZ,
            HIGH_FRAC,
            FILTER_ORDER,
            self.sample_rate,
        );

        // Rescale by the block's global standard deviation. An all-zero block
        // stays zero instead of turning into NaN.
        let n = block.len() as f64;
        let mean = block.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = block
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let std = var.sqrt();
        if std > 0.0 {
            for v in block.iter_mut() {
                *v = (*v as f64 / std) as f32;
            }
        }

        let block = signal::whiten(&block, n_chan, &self.neighbors, WHITEN_HALFWIDTH);
        self.cursor += 1;
        debug!(batch = self.cursor, "conditioned recording batch");
        Ok(block)
    }

    fn reset_cursor(&mut self) -> Result<(), EvalError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.cursor = 0;
        Ok(())
    }
}
