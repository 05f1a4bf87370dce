//! Synthetic spike-train generation from per-unit interval statistics.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::events::{sorted_unit_times, SpikeEvent};
use crate::kernels::stat_summary::IsiLogStats;

/// Minimum plausible gap, in samples, between a unit's consecutive firings.
pub const REFRACTORY_SPAN: i64 = 60;

/// Draws a new spike train whose per-unit firing statistics follow the
/// log-normal interval summaries of an existing train.
///
/// For each unit, `trunc(count × augment_rate)` gaps are drawn as
/// `exp(Normal(mean, std))`. A gap below [`REFRACTORY_SPAN`] has the span
/// added to it rather than being rejected, so the draw count is preserved.
/// The same number of anchor times is then picked uniformly without
/// replacement from the unit's existing spikes, sorted, and offset by the
/// gaps. Per-unit results are concatenated with their unit label.
///
/// New spike times are NOT globally sorted; callers that need order must
/// sort. All randomness comes from `rng`, so a seeded generator reproduces
/// the train exactly.
pub fn synthesize_spike_train<R: Rng + ?Sized>(
    events: &[SpikeEvent],
    n_units: usize,
    stats: &[IsiLogStats],
    augment_rate: f64,
    rng: &mut R,
) -> Vec<SpikeEvent> {
    debug_assert_eq!(stats.len(), n_units);

    let mut out = Vec::new();
    for unit in 0..n_units {
        let times = sorted_unit_times(events, unit as u32);
        let summary = &stats[unit];
        let n_new = ((summary.count as f64 * augment_rate) as usize).min(times.len());
        if n_new == 0 {
            continue;
        }

        let normal = Normal::new(summary.mean, summary.std)
            .unwrap_or_else(|_| Normal::new(0.0, 1e-9).unwrap());

        let mut anchors = times;
        anchors.shuffle(rng);
        anchors.truncate(n_new);
        anchors.sort_unstable();

        for anchor in anchors {
            let mut gap = normal.sample(rng).exp() as i64;
            if gap < REFRACTORY_SPAN {
                gap += REFRACTORY_SPAN;
            }
            out.push(SpikeEvent {
                time: anchor + gap,
                unit: unit as u32,
            });
        }
    }
    out
}
