//! Ground-truth recording synthesis: streams the original recording and
//! superposes known templates at synthetic spike times.

use std::io::Write;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use tracing::{debug, info};

use crate::error::EvalError;
use crate::events::SpikeEvent;
use crate::geometry::Geometry;
use crate::kernels::relocate::{relocate_waveform, SPATIAL_SIZE, X_SPACING};
use crate::kernels::stat_summary::IsiLogStats;
use crate::kernels::synth::synthesize_spike_train;
use crate::kernels::template::{TemplateSet, WINDOW_AFTER, WINDOW_BEFORE};
use crate::stream::{sample_index, BatchSource};

/// Mean of the Poisson draw governing how far a relocated unit moves, in
/// multiples of the horizontal site pitch.
const MOVE_DISTANCE_LAMBDA: f64 = 15.0;

/// Knobs for one augmentation run.
#[derive(Debug, Clone)]
pub struct AugmentOptions {
    /// Fraction of units whose augmented waveform is spatially relocated.
    pub move_rate: f64,
    /// Length of the augmented recording, in batches of the source.
    pub n_batches: usize,
    /// Gain applied to every batch before it is written as i16.
    pub amplitude_scale: f32,
    /// Augmented spikes per unit, as a fraction of its original spike count.
    pub augment_rate: f64,
    /// Channels carried along when relocating a template.
    pub spatial_size: usize,
    /// Horizontal site pitch in geometry coordinate units.
    pub x_spacing: f64,
}

impl Default for AugmentOptions {
    fn default() -> Self {
        Self {
            move_rate: 0.2,
            n_batches: 1,
            amplitude_scale: 1e3,
            augment_rate: 0.25,
            spatial_size: SPATIAL_SIZE,
            x_spacing: X_SPACING,
        }
    }
}

/// Result of an augmentation run.
#[derive(Debug, Clone)]
pub struct AugmentOutcome {
    /// Original events followed by the augmented ones; augmented spikes of
    /// relocated units carry fresh unit ids appended after the existing ids.
    pub ground_truth: Vec<SpikeEvent>,
    /// Distinct units in `ground_truth`, including the fresh ids.
    pub n_units: usize,
    /// Injection windows that crossed a batch edge and were skipped.
    pub boundary_violations: u64,
    /// Original ids of the relocated units, ascending.
    pub moved_units: Vec<u32>,
}

/// Streams `options.n_batches` batches from the start of `source`, adds each
/// augmented spike's template at its aligned window, and writes the scaled
/// result to `out` as little-endian i16 in the input layout.
///
/// `round(move_rate × n_units)` units are drawn without replacement and have
/// their augmented waveform relocated by `sign(U(-1/2,1/2)) × Poisson(15)`
/// pitch units before injection. Templates are added, never overwritten, so
/// existing signal survives underneath. A spike whose window crosses a batch
/// edge is counted and skipped, never fatal. Spikes beyond the augmented
/// length are still part of the returned ground truth; they are simply never
/// injected.
///
/// `events` must be normalized to `0..n_units` with
/// [`crate::kernels::relabel::normalize_units`], and `stats` must be that
/// train's [`crate::kernels::stat_summary::isi_log_stats`]. All randomness
/// comes from `rng`.
pub fn write_augmented_recording<S, W, R>(
    source: &mut S,
    templates: &TemplateSet,
    geometry: &Geometry,
    events: &[SpikeEvent],
    stats: &[IsiLogStats],
    out: &mut W,
    options: &AugmentOptions,
    rng: &mut R,
) -> Result<AugmentOutcome, EvalError>
where
    S: BatchSource,
    W: Write,
    R: Rng + ?Sized,
{
    let n_units = templates.n_units();
    let n_chan = source.n_channels();
    let span = source.batch_span() as i64;
    let window_len = templates.window_len();

    source.reset_cursor()?;

    // Pick the units to relocate and build their moved waveforms.
    let n_moved = (options.move_rate * n_units as f64).round() as usize;
    let mut pool: Vec<u32> = (0..n_units as u32).collect();
    pool.shuffle(rng);
    let mut moved_units: Vec<u32> = pool.into_iter().take(n_moved.min(n_units)).collect();
    moved_units.sort_unstable();

    let poisson = Poisson::new(MOVE_DISTANCE_LAMBDA)
        .unwrap_or_else(|_| Poisson::new(1.0).unwrap());
    let mut moved_slot: Vec<Option<usize>> = vec![None; n_units];
    let mut moved_waveforms = Vec::with_capacity(moved_units.len());
    for (slot, &unit) in moved_units.iter().enumerate() {
        let sign = if rng.gen::<f64>() < 0.5 { -1.0 } else { 1.0 };
        let dist = sign * poisson.sample(rng);
        let peaks = templates.peak_channels(unit as usize, options.spatial_size);
        moved_waveforms.push(relocate_waveform(
            templates.waveform(unit as usize),
            window_len,
            geometry,
            &peaks,
            dist * options.x_spacing,
        ));
        moved_slot[unit as usize] = Some(slot);
        debug!(unit, dist, "relocated augmented template");
    }

    let mut augmented = synthesize_spike_train(events, n_units, stats, options.augment_rate, rng);

    // Stream, inject, scale, write.
    let mut violations = 0u64;
    let mut encoded: Vec<u8> = Vec::new();
    for batch in 0..options.n_batches {
        let mut block = source.next_batch()?;
        let lo = batch as i64 * span;

        let mut injected = 0u64;
        for ev in augmented.iter() {
            if ev.time <= lo || ev.time >= lo + span {
                continue;
            }
            let local = ev.time - lo;
            if local < WINDOW_BEFORE || local + WINDOW_AFTER > span {
                violations += 1;
                continue;
            }
            let unit = ev.unit as usize;
            let waveform = match moved_slot[unit] {
                Some(slot) => moved_waveforms[slot].as_slice(),
                None => templates.waveform(unit),
            };
            let start = (local - WINDOW_BEFORE) as usize;
            for t in 0..window_len {
                for c in 0..n_chan {
                    block[sample_index(start + t, c, n_chan)] +=
                        waveform[sample_index(t, c, n_chan)];
                }
            }
            injected += 1;
        }

        encoded.clear();
        encoded.reserve(block.len() * 2);
        for &v in block.iter() {
            let scaled = (v * options.amplitude_scale).trunc();
            let sample = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            encoded.extend_from_slice(&sample.to_le_bytes());
        }
        out.write_all(&encoded)?;
        debug!(batch, injected, violations, "wrote augmented batch");
    }

    // Relocated units become new ground-truth units, appended after the
    // existing ids so a scorer can tell recovered-in-place from moved.
    let mut next_id = n_units as u32;
    for &unit in moved_units.iter() {
        for ev in augmented.iter_mut() {
            if ev.unit == unit {
                ev.unit = next_id;
            }
        }
        next_id += 1;
    }

    let mut ground_truth = events.to_vec();
    ground_truth.extend_from_slice(&augmented);

    info!(
        n_units,
        moved = moved_units.len(),
        augmented = augmented.len(),
        violations,
        "augmentation pass complete"
    );

    Ok(AugmentOutcome {
        ground_truth,
        n_units: n_units + moved_units.len(),
        boundary_violations: violations,
        moved_units,
    })
}
