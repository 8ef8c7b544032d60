#![allow(dead_code)]

use bevy_ecs::prelude::World;
use bevy_ecs::schedule::Schedule;
use ed_core::clock::SimulationClock;
use ed_core::runner::{run_next_event, run_until_empty, simulation_schedule};

/// Helper that owns a reusable `Schedule` so tests can step or drain the event queue.
pub struct ScheduleRunner {
    schedule: Schedule,
}

impl Default for ScheduleRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleRunner {
    /// Create a runner with the default simulation schedule.
    pub fn new() -> Self {
        Self {
            schedule: simulation_schedule(),
        }
    }

    /// Run a single event (returns `true` if an event was processed).
    pub fn run_one(&mut self, world: &mut World) -> bool {
        run_next_event(world, &mut self.schedule).expect("simulation step")
    }

    /// Run events up to `max_steps`, returning the number of steps executed.
    /// Stops early at the horizon.
    pub fn run_until_empty(&mut self, world: &mut World, max_steps: usize) -> usize {
        run_until_empty(world, &mut self.schedule, max_steps).expect("simulation run")
    }

    /// Process every event stamped at or before `until`, then stop.
    pub fn run_through(&mut self, world: &mut World, until: f64) -> usize {
        let mut steps = 0;
        while world
            .resource::<SimulationClock>()
            .next_event_time()
            .is_some_and(|at| at <= until)
        {
            if !self.run_one(world) {
                break;
            }
            steps += 1;
        }
        steps
    }

    /// Drive the simulation to its end: the next event would fall at or
    /// after the configured horizon, or nothing is left to process.
    pub fn run_full(&mut self, world: &mut World) -> usize {
        self.run_until_empty(world, usize::MAX)
    }
}
