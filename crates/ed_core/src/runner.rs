//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Each step pops the next event from [SimulationClock], inserts it as
//! [CurrentEvent], then runs the schedule. Systems are gated on the event kind,
//! so exactly one of them reacts per step. Commands (patient spawns and
//! despawns) are applied before the step returns.

use bevy_ecs::prelude::{Res, Schedule, World};
use bevy_ecs::schedule::{ExecutorKind, IntoSystemConfigs};
use tracing::trace;

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::config::SimulationConfig;
use crate::error::{SimulationError, SimulationFault};
use crate::profiling::EventMetrics;
use crate::systems::{
    arrivals::{patient_arrival_system, simulation_started_system},
    census::census_system,
    patient_flow::patient_flow_system,
};

fn is_simulation_started(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SimulationStarted)
        .unwrap_or(false)
}

fn is_patient_arrival(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PatientArrival)
        .unwrap_or(false)
}

fn is_patient_event(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| {
            matches!(
                e.0.kind,
                EventKind::PatientArrived
                    | EventKind::ResourceGranted
                    | EventKind::LwbsTimeout
                    | EventKind::HoldComplete
            )
        })
        .unwrap_or(false)
}

fn is_census_sample(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::CensusSample)
        .unwrap_or(false)
}

/// Runs one simulation step.
///
/// Returns `Ok(true)` if an event was processed, `Ok(false)` if the queue is
/// empty or the next event is at or past the configured horizon. Anything
/// still suspended at that point is abandoned without recording stats.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> Result<bool, SimulationError> {
    let horizon = world
        .get_resource::<SimulationConfig>()
        .map(|c| c.horizon_minutes);
    let next_ts = world
        .get_resource::<SimulationClock>()
        .and_then(|c| c.next_event_time());
    if let (Some(horizon), Some(ts)) = (horizon, next_ts) {
        if ts >= horizon {
            return Ok(false);
        }
    }

    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return Ok(false),
    };
    trace!(at = event.timestamp, kind = event.kind.name(), "dispatching event");
    world.insert_resource(CurrentEvent(event));

    if let Some(mut metrics) = world.get_resource_mut::<EventMetrics>() {
        metrics.record_event(event.kind);
    }

    schedule.run(world);

    if let Some(violation) = world
        .get_resource_mut::<SimulationFault>()
        .and_then(|mut fault| fault.take())
    {
        return Err(violation.into());
    }
    Ok(true)
}

/// Runs simulation steps until the horizon, an empty queue, or `max_steps`.
/// Returns the number of steps executed.
pub fn run_until_empty(
    world: &mut World,
    schedule: &mut Schedule,
    max_steps: usize,
) -> Result<usize, SimulationError> {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule)? {
        steps += 1;
    }
    Ok(steps)
}

/// Builds the simulation schedule: one system per event family, gated by kind.
/// Exactly one system reacts per event, so the schedule runs on the caller's thread.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            simulation_started_system.run_if(is_simulation_started),
            patient_arrival_system.run_if(is_patient_arrival),
            patient_flow_system.run_if(is_patient_event),
            census_system.run_if(is_census_sample),
        )
            .chain(),
    );
    schedule
}

/// Schedules the SimulationStarted event at the current time (normally 0).
/// Call this after building the world and before running events.
pub fn initialize_simulation(world: &mut World) -> Result<(), SimulationError> {
    let mut clock = world.resource_mut::<SimulationClock>();
    let now = clock.now();
    clock.schedule_at(now, EventKind::SimulationStarted, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_world, FixedDurations};

    #[test]
    fn runner_stops_before_events_at_the_horizon() {
        let config = SimulationConfig::default()
            .with_horizon_minutes(3.0, 0.0)
            .with_arrival_rate(0.0);
        let mut world = create_test_world(config, FixedDurations::constant(1.0));
        initialize_simulation(&mut world).expect("init");

        let mut schedule = simulation_schedule();
        let steps = run_until_empty(&mut world, &mut schedule, 1_000).expect("run");

        // SimulationStarted plus census samples at 0, 1 and 2.
        assert_eq!(steps, 4);
        let metrics = world.resource::<EventMetrics>();
        assert_eq!(metrics.count(EventKind::CensusSample), 3);
        assert_eq!(metrics.count(EventKind::SimulationStarted), 1);
        assert!(world.resource::<SimulationClock>().now() < 3.0);
    }

    #[test]
    fn max_steps_bounds_the_run() {
        let config = SimulationConfig::default().with_horizon_minutes(100.0, 0.0);
        let mut world = create_test_world(config, FixedDurations::constant(1.0));
        initialize_simulation(&mut world).expect("init");

        let mut schedule = simulation_schedule();
        let steps = run_until_empty(&mut world, &mut schedule, 5).expect("run");
        assert_eq!(steps, 5);
    }

    #[test]
    fn raised_fault_ends_the_step_with_an_error() {
        let config = SimulationConfig::default().with_horizon_minutes(10.0, 0.0);
        let mut world = create_test_world(config, FixedDurations::constant(1.0));
        let ghost = world.spawn_empty().id();
        world.despawn(ghost);
        world
            .resource_mut::<SimulationClock>()
            .schedule_at(
                1.0,
                EventKind::HoldComplete,
                Some(crate::clock::EventSubject::Patient(ghost)),
            )
            .expect("schedule");

        let mut schedule = simulation_schedule();
        let err = run_next_event(&mut world, &mut schedule).unwrap_err();
        assert_eq!(
            err,
            SimulationError::Invariant(crate::error::InvariantViolation::MissingPatient {
                event: "HoldComplete"
            })
        );
    }
}
