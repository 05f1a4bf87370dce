use std::collections::{BTreeSet, HashMap};

use crate::events::SpikeEvent;

/// Number of distinct unit labels in a spike train.
pub fn unit_count(events: &[SpikeEvent]) -> usize {
    events.iter().map(|ev| ev.unit).collect::<BTreeSet<_>>().len()
}

/// Shifts every unit label by `offset`.
///
/// Applied to one of two raw trains before renumbering, this keeps their
/// label spaces disjoint: raw labels from different sorters may alias, so a
/// caller comparing two trains offsets one by the other's distinct-unit count
/// first, symmetrically with [`normalize_units`] on both.
pub fn offset_units(events: &mut [SpikeEvent], offset: u32) {
    for ev in events.iter_mut() {
        ev.unit += offset;
    }
}

/// Relabels unit identifiers to a dense `0..U-1` range, by rank of the raw
/// label, and returns the train together with its distinct-unit count `U`.
///
/// Event order and spike times are untouched. The mapping is a pure function
/// of the input's label set, so normalizing an already-normalized train
/// returns it unchanged.
pub fn normalize_units(events: &[SpikeEvent]) -> (Vec<SpikeEvent>, usize) {
    let labels: BTreeSet<u32> = events.iter().map(|ev| ev.unit).collect();
    let rank: HashMap<u32, u32> = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| (label, i as u32))
        .collect();

    let normalized = events
        .iter()
        .map(|ev| SpikeEvent {
            time: ev.time,
            unit: rank[&ev.unit],
        })
        .collect();
    (normalized, labels.len())
}
