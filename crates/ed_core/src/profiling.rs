//! Event-rate bookkeeping: how many events of each kind the runner dispatched.

use std::collections::BTreeMap;

use bevy_ecs::prelude::Resource;

use crate::clock::EventKind;

/// Per-kind dispatch counters. Inserted by default; the runner updates it
/// when present.
#[derive(Debug, Clone, Default, Resource)]
pub struct EventMetrics {
    counts: BTreeMap<EventKind, u64>,
    total: u64,
}

impl EventMetrics {
    pub fn record_event(&mut self, kind: EventKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Counts ordered by event kind.
    pub fn iter(&self) -> impl Iterator<Item = (EventKind, u64)> + '_ {
        self.counts.iter().map(|(kind, count)| (*kind, *count))
    }
}
