//! World assembly and the top-level run entry points.

use bevy_ecs::prelude::{Schedule, With, World};
use tracing::info;

use crate::clock::SimulationClock;
use crate::config::SimulationConfig;
use crate::distributions::{DurationSampler, RandomSource};
use crate::error::{ConfigurationError, SimulationError, SimulationFault};
use crate::patient::Patient;
use crate::pool::ResourcePools;
use crate::profiling::EventMetrics;
use crate::runner::{initialize_simulation, run_next_event, simulation_schedule};
use crate::stats::SimStats;
use crate::systems::arrivals::ArrivalGenerator;

/// Validates `config` and inserts every resource a run needs into `world`.
///
/// Nothing is inserted if validation fails.
pub fn build_simulation_world(
    world: &mut World,
    config: SimulationConfig,
    sampler: Box<dyn DurationSampler>,
) -> Result<(), ConfigurationError> {
    config.validate()?;
    let pools = ResourcePools::from_capacities(&config.capacities)?;

    world.insert_resource(SimulationClock::default());
    world.insert_resource(pools);
    world.insert_resource(SimStats::new(config.warmup_minutes));
    world.insert_resource(RandomSource::new(sampler));
    world.insert_resource(SimulationFault::default());
    world.insert_resource(ArrivalGenerator::default());
    world.insert_resource(EventMetrics::default());
    world.insert_resource(config);
    Ok(())
}

/// One simulation run: a populated world plus the event schedule.
pub struct Simulation {
    world: World,
    schedule: Schedule,
}

impl Simulation {
    /// Builds a run seeded from `config.seed`.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let sampler = Box::new(crate::distributions::RandomStream::new(config.seed));
        Self::with_sampler(config, sampler)
    }

    /// Builds a run that draws every duration and classification from `sampler`.
    pub fn with_sampler(
        config: SimulationConfig,
        sampler: Box<dyn DurationSampler>,
    ) -> Result<Self, SimulationError> {
        let mut world = World::new();
        build_simulation_world(&mut world, config, sampler)?;
        initialize_simulation(&mut world)?;
        Ok(Self {
            world,
            schedule: simulation_schedule(),
        })
    }

    /// Processes one event. `Ok(false)` once the horizon is reached.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        run_next_event(&mut self.world, &mut self.schedule)
    }

    /// Runs until the next event would fall at or after the horizon.
    /// Returns the number of events processed.
    pub fn run_to_horizon(&mut self) -> Result<usize, SimulationError> {
        let mut steps = 0;
        while self.step()? {
            steps += 1;
        }
        Ok(steps)
    }

    pub fn now(&self) -> f64 {
        self.world.resource::<SimulationClock>().now()
    }

    pub fn stats(&self) -> &SimStats {
        self.world.resource::<SimStats>()
    }

    /// Final statistics. The resource is inserted by the constructor and
    /// never removed, so a missing one panics rather than reads as empty.
    pub fn into_stats(mut self) -> SimStats {
        std::mem::take(&mut *self.world.resource_mut::<SimStats>())
    }

    pub fn patients_spawned(&self) -> u64 {
        self.world.resource::<ArrivalGenerator>().spawned()
    }

    /// Patients still in the department (queued, in service or boarding).
    pub fn patients_in_flight(&mut self) -> usize {
        self.world
            .query_filtered::<(), With<Patient>>()
            .iter(&self.world)
            .count()
    }

    pub fn metrics(&self) -> &EventMetrics {
        self.world.resource::<EventMetrics>()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

/// Runs one replication of `config` to its horizon and returns the statistics.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimStats, SimulationError> {
    let mut simulation = Simulation::new(config.clone())?;
    let events = simulation.run_to_horizon()?;
    info!(
        events,
        spawned = simulation.patients_spawned(),
        in_flight = simulation.patients_in_flight(),
        clock_minutes = simulation.now(),
        "simulation finished"
    );
    Ok(simulation.into_stats())
}
