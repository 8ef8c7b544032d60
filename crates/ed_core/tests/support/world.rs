#![allow(dead_code)]

use bevy_ecs::prelude::{Entity, World};
use ed_core::config::{ResourceCapacities, SimulationConfig};
use ed_core::patient::Stream;
use ed_core::test_helpers::{create_test_world, spawn_patient_at, FixedDurations};

/// Builder for worlds with hand-placed patients and deterministic durations.
///
/// The arrival generator is never started: only the patients added through
/// [TestWorldBuilder::fast] and [TestWorldBuilder::main] take part.
#[derive(Debug, Clone)]
pub struct TestWorldBuilder {
    config: SimulationConfig,
    sampler: FixedDurations,
    patients: Vec<(f64, Stream, bool, bool)>,
}

impl Default for TestWorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorldBuilder {
    /// One-day horizon, no warm-up, every duration 10 minutes.
    pub fn new() -> Self {
        Self {
            config: SimulationConfig::default()
                .with_horizon_minutes(1_440.0, 0.0)
                .with_arrival_rate(0.0),
            sampler: FixedDurations::constant(10.0),
            patients: Vec::new(),
        }
    }

    pub fn with_capacities(mut self, capacities: ResourceCapacities) -> Self {
        self.config = self.config.with_capacities(capacities);
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(SimulationConfig) -> SimulationConfig) -> Self {
        self.config = edit(self.config);
        self
    }

    pub fn with_sampler(mut self, sampler: FixedDurations) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn fast(mut self, at: f64) -> Self {
        self.patients.push((at, Stream::Fast, false, false));
        self
    }

    pub fn main(mut self, at: f64, lab_needed: bool, admit: bool) -> Self {
        self.patients.push((at, Stream::Main, lab_needed, admit));
        self
    }

    /// Build the world; returns the patient entities in the order they were added.
    pub fn build(self) -> (World, Vec<Entity>) {
        let mut world = create_test_world(self.config, self.sampler);
        let entities = self
            .patients
            .iter()
            .enumerate()
            .map(|(i, &(at, stream, lab, admit))| {
                spawn_patient_at(&mut world, i as u64 + 1, at, stream, lab, admit)
            })
            .collect();
        (world, entities)
    }
}
