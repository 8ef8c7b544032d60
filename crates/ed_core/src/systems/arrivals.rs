//! Start-of-run bootstrap and the Poisson arrival generator.

use bevy_ecs::prelude::{Commands, Res, ResMut, Resource};
use tracing::{debug, info};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::config::SimulationConfig;
use crate::distributions::RandomSource;
use crate::error::SimulationFault;
use crate::patient::{CarePhase, Patient, Stream};

/// Arrivals stop once the clock passes this share of the horizon; later
/// patients could not finish inside the run anyway.
pub const ARRIVAL_CUTOFF_FRACTION: f64 = 0.999;

/// Arrival generator state.
#[derive(Debug, Clone, Default, Resource)]
pub struct ArrivalGenerator {
    next_id: u64,
    spawned: u64,
    stopped: bool,
}

impl ArrivalGenerator {
    /// Patients spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Kicks off the run: first census sample now, first arrival after one gap.
pub fn simulation_started_system(
    event: Res<CurrentEvent>,
    config: Res<SimulationConfig>,
    mut clock: ResMut<SimulationClock>,
    mut random: ResMut<RandomSource>,
    mut generator: ResMut<ArrivalGenerator>,
    mut fault: ResMut<SimulationFault>,
) {
    if event.0.kind != EventKind::SimulationStarted {
        return;
    }

    info!(
        horizon_minutes = config.horizon_minutes,
        warmup_minutes = config.warmup_minutes,
        arrival_rate_per_hour = config.arrival_rate_per_hour,
        seed = config.seed,
        "simulation started"
    );

    let now = clock.now();
    if let Err(violation) = clock.schedule_at(now, EventKind::CensusSample, None) {
        fault.raise(violation);
        return;
    }

    match config.mean_interarrival_minutes() {
        Some(mean) => {
            let gap = random.sampler().exponential(mean);
            if let Err(violation) = clock.schedule_in(gap, EventKind::PatientArrival, None) {
                fault.raise(violation);
            }
        }
        None => {
            // Zero rate: the next gap is infinite, so nobody ever arrives.
            generator.stopped = true;
            debug!("arrival rate is zero, no patients will be generated");
        }
    }
}

/// Spawns one patient, classifies it, and schedules the next arrival.
#[allow(clippy::too_many_arguments)]
pub fn patient_arrival_system(
    event: Res<CurrentEvent>,
    config: Res<SimulationConfig>,
    mut clock: ResMut<SimulationClock>,
    mut random: ResMut<RandomSource>,
    mut generator: ResMut<ArrivalGenerator>,
    mut fault: ResMut<SimulationFault>,
    mut commands: Commands,
) {
    if event.0.kind != EventKind::PatientArrival || generator.stopped {
        return;
    }

    let now = clock.now();
    let sampler = random.sampler();
    let id = generator.next_id();
    let stream = if sampler.chance(config.p_fast) {
        Stream::Fast
    } else {
        Stream::Main
    };
    let mut patient = Patient::new(id, now, stream);
    if stream == Stream::Main {
        patient.lab_needed = sampler.chance(config.p_lab);
        patient.admit = sampler.chance(config.p_admit);
    }

    let entity = commands.spawn((patient, CarePhase::Arrived)).id();
    generator.spawned += 1;
    if let Err(violation) = clock.schedule_at(
        now,
        EventKind::PatientArrived,
        Some(EventSubject::Patient(entity)),
    ) {
        fault.raise(violation);
        return;
    }

    if now > config.horizon_minutes * ARRIVAL_CUTOFF_FRACTION {
        generator.stopped = true;
        debug!(now, spawned = generator.spawned, "arrival generator stopped");
        return;
    }

    // mean_interarrival_minutes is Some: a zero rate never schedules an arrival.
    if let Some(mean) = config.mean_interarrival_minutes() {
        let gap = sampler.exponential(mean);
        if let Err(violation) = clock.schedule_in(gap, EventKind::PatientArrival, None) {
            fault.raise(violation);
        }
    }
}
