/// Default temporal proximity, in samples, under which two spikes count as
/// the same event.
pub const MATCH_SPAN: i64 = 60;

/// Counts temporal matches between two sorted spike-time lists.
///
/// Greedy one-pass merge: both cursors advance together whenever the current
/// times differ by less than `tolerance`, otherwise the earlier cursor
/// advances alone. Every event is consumed at most once and ties within
/// tolerance always count.
///
/// This is a deliberate O(n+m) approximation of optimal bipartite matching;
/// it can under-count only when several spikes crowd inside one tolerance
/// window. Both inputs must be sorted ascending — the merge assumes
/// monotone times.
pub fn count_matches(reference: &[i64], candidate: &[i64], tolerance: i64) -> usize {
    let (m, n) = (reference.len(), candidate.len());
    let (mut i, mut j) = (0, 0);
    let mut count = 0;
    while i < m && j < n {
        if (reference[i] - candidate[j]).abs() < tolerance {
            i += 1;
            j += 1;
            count += 1;
        } else if reference[i] < candidate[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    count
}
