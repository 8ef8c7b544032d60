//! Test helpers for deterministic worlds and hand-placed patients.

use bevy_ecs::prelude::{Entity, World};

use crate::clock::{EventKind, EventSubject, SimulationClock};
use crate::config::SimulationConfig;
use crate::distributions::DurationSampler;
use crate::patient::{CarePhase, Patient, Stream};
use crate::simulation::build_simulation_world;

/// Sampler returning fixed values: every exponential and log-normal draw is
/// a constant, and every classification draw has the same answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDurations {
    pub exponential: f64,
    pub lognormal: f64,
    pub chance: bool,
}

impl FixedDurations {
    /// All durations equal `minutes`; every `chance` draw is `false`.
    pub fn constant(minutes: f64) -> Self {
        Self {
            exponential: minutes,
            lognormal: minutes,
            chance: false,
        }
    }

    pub fn with_chance(mut self, chance: bool) -> Self {
        self.chance = chance;
        self
    }

    pub fn with_exponential(mut self, minutes: f64) -> Self {
        self.exponential = minutes;
        self
    }
}

impl DurationSampler for FixedDurations {
    fn exponential(&mut self, _mean: f64) -> f64 {
        self.exponential
    }

    fn lognormal(&mut self, _mean: f64) -> f64 {
        self.lognormal
    }

    fn chance(&mut self, _p: f64) -> bool {
        self.chance
    }
}

/// Create a world with every simulation resource, driven by `sampler`.
/// No events are scheduled.
///
/// # Panics
///
/// Panics if `config` does not validate.
pub fn create_test_world(config: SimulationConfig, sampler: FixedDurations) -> World {
    let mut world = World::new();
    build_simulation_world(&mut world, config, Box::new(sampler))
        .expect("test configuration should be valid");
    world
}

/// Spawn a classified patient and schedule its `PatientArrived` event at `at`.
///
/// # Panics
///
/// Panics if `at` is earlier than the world's clock.
pub fn spawn_patient_at(
    world: &mut World,
    id: u64,
    at: f64,
    stream: Stream,
    lab_needed: bool,
    admit: bool,
) -> Entity {
    let mut patient = Patient::new(id, at, stream);
    patient.lab_needed = lab_needed;
    patient.admit = admit;
    let entity = world.spawn((patient, CarePhase::Arrived)).id();
    world
        .resource_mut::<SimulationClock>()
        .schedule_at(at, EventKind::PatientArrived, Some(EventSubject::Patient(entity)))
        .expect("patient start should not be in the past");
    entity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_durations_ignore_the_requested_mean() {
        let mut sampler = FixedDurations::constant(4.0).with_exponential(2.0);
        assert_eq!(sampler.exponential(100.0), 2.0);
        assert_eq!(sampler.lognormal(100.0), 4.0);
        assert!(!sampler.chance(1.0));
        assert!(sampler.with_chance(true).chance(0.0));
    }

    #[test]
    fn spawned_patient_starts_at_the_requested_time() {
        let config = SimulationConfig::default().with_horizon_minutes(60.0, 0.0);
        let mut world = create_test_world(config, FixedDurations::constant(1.0));
        let entity = spawn_patient_at(&mut world, 3, 12.5, Stream::Main, true, false);

        let patient = world.get::<Patient>(entity).expect("patient");
        assert_eq!(patient.arrival_min, 12.5);
        assert!(patient.lab_needed);
        let event = world
            .resource_mut::<SimulationClock>()
            .pop_next()
            .expect("start event");
        assert_eq!(event.kind, EventKind::PatientArrived);
        assert_eq!(event.timestamp, 12.5);
    }
}
