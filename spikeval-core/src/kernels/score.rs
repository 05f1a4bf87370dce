//! Confusion-matrix scoring of a candidate spike train against a reference.

use crate::events::SpikeEvent;
use crate::kernels::matching::count_matches;
use crate::kernels::relabel::normalize_units;

/// Scoring of one candidate sorting against a ground-truth reference.
///
/// Built once by [`evaluate`] and immutable afterwards. Reference units
/// index rows, candidate clusters index columns.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub n_units: usize,
    pub n_clusters: usize,
    /// Spike tally per reference unit.
    pub unit_counts: Vec<u64>,
    /// Spike tally per candidate cluster.
    pub cluster_counts: Vec<u64>,
    /// Matched-event counts, row-major `[n_units × n_clusters]`.
    pub confusion: Vec<u64>,
    /// Best-matching reference unit per cluster (column argmax, ties to the
    /// lowest unit index).
    pub cluster_to_unit: Vec<usize>,
    /// True-positive rate per reference unit; 0 for units no cluster claims
    /// or units with no spikes.
    pub true_positive: Vec<f64>,
    /// False-discovery rate per cluster; 0 for empty clusters.
    pub false_discovery: Vec<f64>,
}

impl EvaluationReport {
    /// Matched-event count between a reference unit and a cluster.
    #[inline]
    pub fn matches(&self, unit: usize, cluster: usize) -> u64 {
        self.confusion[unit * self.n_clusters + cluster]
    }
}

/// Scores `candidate` against `reference` under a temporal proximity
/// `tolerance` (see [`crate::kernels::matching::MATCH_SPAN`] for the
/// conventional value).
///
/// Both trains are normalized here; callers comparing raw trains from
/// different sources must have disjoint label spaces (apply
/// [`crate::kernels::relabel::offset_units`] first). Per-unit and
/// per-cluster time lists are sorted before matching, satisfying the
/// merge's monotone-input requirement.
pub fn evaluate(reference: &[SpikeEvent], candidate: &[SpikeEvent], tolerance: i64) -> EvaluationReport {
    let (reference, n_units) = normalize_units(reference);
    let (candidate, n_clusters) = normalize_units(candidate);

    let unit_times = sorted_times_by_label(&reference, n_units);
    let cluster_times = sorted_times_by_label(&candidate, n_clusters);

    let unit_counts: Vec<u64> = unit_times.iter().map(|t| t.len() as u64).collect();
    let cluster_counts: Vec<u64> = cluster_times.iter().map(|t| t.len() as u64).collect();

    let mut confusion = vec![0u64; n_units * n_clusters];
    for (u, times) in unit_times.iter().enumerate() {
        for (c, cand) in cluster_times.iter().enumerate() {
            confusion[u * n_clusters + c] = count_matches(times, cand, tolerance) as u64;
        }
    }

    // Column argmax: the reference unit each cluster recovers best.
    let mut cluster_to_unit = vec![0usize; n_clusters];
    let mut recovered = vec![0u64; n_clusters];
    for c in 0..n_clusters {
        for u in 0..n_units {
            let count = confusion[u * n_clusters + c];
            if count > recovered[c] {
                recovered[c] = count;
                cluster_to_unit[c] = u;
            }
        }
    }

    // A unit claimed by several clusters keeps its best recovery.
    let mut true_positive = vec![0.0f64; n_units];
    for c in 0..n_clusters {
        let u = cluster_to_unit[c];
        if unit_counts[u] > 0 {
            let rate = recovered[c] as f64 / unit_counts[u] as f64;
            if rate > true_positive[u] {
                true_positive[u] = rate;
            }
        }
    }

    let mut false_discovery = vec![0.0f64; n_clusters];
    for c in 0..n_clusters {
        if cluster_counts[c] > 0 {
            false_discovery[c] =
                (cluster_counts[c] - recovered[c]) as f64 / cluster_counts[c] as f64;
        }
    }

    EvaluationReport {
        n_units,
        n_clusters,
        unit_counts,
        cluster_counts,
        confusion,
        cluster_to_unit,
        true_positive,
        false_discovery,
    }
}

fn sorted_times_by_label(events: &[SpikeEvent], n_labels: usize) -> Vec<Vec<i64>> {
    let mut times = vec![Vec::new(); n_labels];
    for ev in events {
        times[ev.unit as usize].push(ev.time);
    }
    for list in times.iter_mut() {
        list.sort_unstable();
    }
    times
}
