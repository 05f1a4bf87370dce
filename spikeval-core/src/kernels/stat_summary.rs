//! Log-normal summaries of each unit's inter-spike-interval distribution.

use crate::events::{sorted_unit_times, SpikeEvent};

/// Per-unit summary of `ln(inter-spike interval)`.
///
/// Computed once from a spike train and read-only thereafter. A unit with
/// fewer than two spikes has no interval to model and keeps a degenerate
/// zero summary (its spike count is still recorded).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsiLogStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl IsiLogStats {
    fn degenerate(count: usize) -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            count,
        }
    }
}

/// Models each unit's inter-spike interval as log-normal: sorts the unit's
/// spike times, takes consecutive differences (zero gaps from duplicate
/// times are replaced with 1 before the log), and records the population
/// mean and standard deviation of the log-differences plus the unit's spike
/// count.
pub fn isi_log_stats(events: &[SpikeEvent], n_units: usize) -> Vec<IsiLogStats> {
    let mut out = Vec::with_capacity(n_units);
    for unit in 0..n_units {
        let times = sorted_unit_times(events, unit as u32);
        if times.len() < 2 {
            out.push(IsiLogStats::degenerate(times.len()));
            continue;
        }

        let logs: Vec<f64> = times
            .windows(2)
            .map(|w| {
                let gap = (w[1] - w[0]).max(1);
                (gap as f64).ln()
            })
            .collect();
        let n = logs.len() as f64;
        let mean = logs.iter().sum::<f64>() / n;
        let var = logs.iter().map(|l| (l - mean) * (l - mean)).sum::<f64>() / n;
        out.push(IsiLogStats {
            mean,
            std: var.sqrt(),
            count: times.len(),
        });
    }
    out
}
