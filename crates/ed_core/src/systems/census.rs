use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::config::SimulationConfig;
use crate::error::{InvariantViolation, SimulationFault};
use crate::pool::{PoolKind, ResourcePools};
use crate::stats::SimStats;

/// Samples pool occupancy at fixed intervals for utilization estimates.
pub fn census_system(
    event: Res<CurrentEvent>,
    config: Res<SimulationConfig>,
    pools: Res<ResourcePools>,
    mut clock: ResMut<SimulationClock>,
    mut stats: ResMut<SimStats>,
    mut fault: ResMut<SimulationFault>,
) {
    if event.0.kind != EventKind::CensusSample {
        return;
    }

    for kind in PoolKind::ALL {
        let pool = pools.get(kind);
        if pool.holders() > pool.capacity() {
            fault.raise(InvariantViolation::OverCapacity {
                pool: kind,
                holders: pool.holders(),
                capacity: pool.capacity(),
            });
            return;
        }
    }

    let now = clock.now();
    stats.record_census(now, pools.occupancy());

    let next = now + config.census_interval_minutes;
    if next < config.horizon_minutes {
        if let Err(violation) = clock.schedule_at(next, EventKind::CensusSample, None) {
            fault.raise(violation);
        }
    }
}
