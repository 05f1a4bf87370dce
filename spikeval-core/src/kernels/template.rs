//! Per-unit average waveforms ("templates") from a streamed recording and a
//! normalized spike train.

use tracing::debug;

use crate::error::EvalError;
use crate::events::SpikeEvent;
use crate::stream::{sample_index, BatchSource};

/// Samples taken before the spike time.
pub const WINDOW_BEFORE: i64 = 10;
/// Samples taken from the spike time onward.
pub const WINDOW_AFTER: i64 = 30;
/// Extraction window length.
pub const WINDOW_LEN: usize = (WINDOW_BEFORE + WINDOW_AFTER) as usize;

/// Average waveform snippets, one `[window × channel]` matrix per unit.
///
/// Built once by [`estimate_templates`] and read-only afterwards. A unit
/// that never contributed a full in-bounds window keeps an all-zero
/// waveform.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    data: Vec<f32>,
    window_len: usize,
    n_channels: usize,
    n_units: usize,
}

impl TemplateSet {
    fn zeros(n_units: usize, window_len: usize, n_channels: usize) -> Self {
        Self {
            data: vec![0.0; n_units * window_len * n_channels],
            window_len,
            n_channels,
            n_units,
        }
    }

    #[inline]
    pub fn n_units(&self) -> usize {
        self.n_units
    }

    #[inline]
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// One unit's waveform as a `[window × channel]` row-major slice.
    #[inline]
    pub fn waveform(&self, unit: usize) -> &[f32] {
        let stride = self.window_len * self.n_channels;
        &self.data[unit * stride..(unit + 1) * stride]
    }

    /// The unit's `k` highest-amplitude channels (peak absolute value over
    /// the window), in ascending amplitude order.
    pub fn peak_channels(&self, unit: usize, k: usize) -> Vec<usize> {
        let wf = self.waveform(unit);
        let mut peak = vec![0.0f32; self.n_channels];
        for t in 0..self.window_len {
            for c in 0..self.n_channels {
                let v = wf[sample_index(t, c, self.n_channels)].abs();
                if v > peak[c] {
                    peak[c] = v;
                }
            }
        }
        let mut order: Vec<usize> = (0..self.n_channels).collect();
        order.sort_by(|&a, &b| peak[a].partial_cmp(&peak[b]).unwrap_or(std::cmp::Ordering::Equal));
        order.split_off(self.n_channels.saturating_sub(k))
    }
}

/// Accumulates per-unit average waveforms over `max_batches` blocks of
/// `source`, starting at the stream's current cursor.
///
/// For the block at cursor `i`, events with `i*span < time < (i+1)*span`
/// (strict on both sides) are shifted to batch-local time and a full
/// `[WINDOW_LEN × channel]` snippet around each is added to the unit's
/// running sum. A window that
/// crosses either batch edge is a boundary violation: it is excluded from
/// both the sum and the unit's spike count, and tallied in the returned
/// counter instead of failing the pass.
///
/// Events must carry normalized unit labels in `0..n_units`; out-of-range
/// labels are skipped. Deterministic for a deterministic source, and never
/// reorders events.
pub fn estimate_templates<S: BatchSource>(
    source: &mut S,
    events: &[SpikeEvent],
    n_units: usize,
    max_batches: usize,
) -> Result<(TemplateSet, u64), EvalError> {
    let span = source.batch_span() as i64;
    let n_chan = source.n_channels();

    // Accumulate in f64, emit f32.
    let stride = WINDOW_LEN * n_chan;
    let mut sums = vec![0.0f64; n_units * stride];
    let mut counts = vec![0u64; n_units];
    let mut violations = 0u64;

    for _ in 0..max_batches {
        let batch = source.cursor();
        let block = source.next_batch()?;
        let lo = batch as i64 * span;

        let mut kept = 0u64;
        for ev in events {
            if ev.time <= lo || ev.time >= lo + span {
                continue;
            }
            let unit = ev.unit as usize;
            if unit >= n_units {
                continue;
            }
            let local = ev.time - lo;
            if local < WINDOW_BEFORE || local + WINDOW_AFTER > span {
                violations += 1;
                continue;
            }
            let start = (local - WINDOW_BEFORE) as usize;
            let sum = &mut sums[unit * stride..(unit + 1) * stride];
            for t in 0..WINDOW_LEN {
                for c in 0..n_chan {
                    sum[sample_index(t, c, n_chan)] +=
                        block[sample_index(start + t, c, n_chan)] as f64;
                }
            }
            counts[unit] += 1;
            kept += 1;
        }
        debug!(batch, kept, violations, "accumulated template batch");
    }

    let mut templates = TemplateSet::zeros(n_units, WINDOW_LEN, n_chan);
    for (unit, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let sum = &sums[unit * stride..(unit + 1) * stride];
        let dst = &mut templates.data[unit * stride..(unit + 1) * stride];
        for (d, &s) in dst.iter_mut().zip(sum) {
            *d = (s / count as f64) as f32;
        }
    }
    Ok((templates, violations))
}
