/// A detected firing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpikeEvent {
    /// Spike time as a sample index into the recording
    pub time: i64,
    /// Unit label (ground truth) or cluster label (sorter output)
    pub unit: u32,
}

/// Collects the spike times of one unit, in input order.
pub fn unit_times(events: &[SpikeEvent], unit: u32) -> Vec<i64> {
    events
        .iter()
        .filter(|ev| ev.unit == unit)
        .map(|ev| ev.time)
        .collect()
}

/// Collects the spike times of one unit, sorted ascending.
pub fn sorted_unit_times(events: &[SpikeEvent], unit: u32) -> Vec<i64> {
    let mut times = unit_times(events, unit);
    times.sort_unstable();
    times
}
