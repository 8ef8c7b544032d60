//! Per-patient care pathway.
//!
//! Each patient entity carries a [CarePhase] naming what it is suspended on.
//! Four events resume it: `PatientArrived` (start), `ResourceGranted` (a
//! queued request got its slot), `LwbsTimeout` (the abandonment timer of a
//! queued request fired) and `HoldComplete` (a timed service ended).
//!
//! Fast-track path: slot (raced against LWBS) -> service -> discharge.
//! Main path: bed (raced against LWBS) -> provider -> initial assessment
//! -> [lab -> provider review] -> boarding + admission, or discharge.
//! Congested fast-track arrivals overflow onto the main path when a bed is free.
//!
//! The LWBS race is settled by the pool: a grant flips the request to held the
//! moment the slot is handed over, and a withdraw removes it. Whichever event
//! is processed first wins; the other sees a settled request and does nothing.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use tracing::{debug, trace};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::config::SimulationConfig;
use crate::distributions::{DurationSampler, RandomSource};
use crate::error::{InvariantViolation, SimulationFault};
use crate::patient::{CarePhase, Disposition, Patient, Stream};
use crate::pool::{PendingRequest, PoolKind, RequestOutcome, ResourcePools};
use crate::stats::SimStats;

/// What the patient does after handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Waiting on a grant, a timer, or a hold; or nothing changed.
    Suspended,
    Finished(Disposition),
}

/// Everything a patient touches while advancing through its pathway.
pub struct PatientFlow<'a> {
    pub clock: &'a mut SimulationClock,
    pub pools: &'a mut ResourcePools,
    pub stats: &'a mut SimStats,
    pub sampler: &'a mut dyn DurationSampler,
    pub config: &'a SimulationConfig,
}

impl<'a> PatientFlow<'a> {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn on_arrived(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
    ) -> Result<Step, InvariantViolation> {
        if *phase != CarePhase::Arrived {
            return Err(unexpected(patient, EventKind::PatientArrived, phase));
        }

        match patient.stream {
            Stream::Fast if self.fast_track_congested() && self.beds_have_room() => {
                patient.reroute_to_overflow();
                let now = self.now();
                self.stats.record_overflow(now);
                debug!(patient = patient.id, now, "fast-track congested, overflowing to main bed");
                self.enter_main_track(entity, patient, phase)
            }
            Stream::Fast => self.enter_fast_track(entity, patient, phase),
            Stream::Main | Stream::Overflow => self.enter_main_track(entity, patient, phase),
        }
    }

    pub fn on_granted(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
        request: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        if phase.awaited_request() != Some(request) || !self.pools.get(request.pool).is_held(request)
        {
            return Err(unexpected(patient, EventKind::ResourceGranted, phase));
        }

        match *phase {
            CarePhase::AwaitingFastTrack { slot } => {
                self.start_fast_service(entity, patient, phase, slot)
            }
            CarePhase::AwaitingBed { bed } => self.on_bed_granted(entity, patient, phase, bed),
            CarePhase::AwaitingProvider { bed, provider } => {
                self.start_initial_assessment(entity, patient, phase, bed, provider)
            }
            CarePhase::AwaitingLab { bed, lab } => self.start_lab(entity, phase, bed, lab),
            CarePhase::AwaitingReview { bed, provider } => {
                self.start_review(entity, phase, bed, provider)
            }
            _ => Err(unexpected(patient, EventKind::ResourceGranted, phase)),
        }
    }

    pub fn on_lwbs_timeout(
        &mut self,
        patient: &mut Patient,
        phase: &mut CarePhase,
        request: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        // Already granted (or gone): the grant won the race.
        if !self.pools.get(request.pool).is_queued(request) {
            return Ok(Step::Suspended);
        }

        let abandonable = matches!(
            *phase,
            CarePhase::AwaitingFastTrack { .. } | CarePhase::AwaitingBed { .. }
        );
        if !abandonable || phase.awaited_request() != Some(request) {
            return Err(unexpected(patient, EventKind::LwbsTimeout, phase));
        }

        self.pools.get_mut(request.pool).withdraw(request)?;
        let now = self.now();
        patient.exit_min = Some(now);
        self.stats.record_lwbs(now);
        debug!(
            patient = patient.id,
            pool = ?request.pool,
            waited = patient.length_of_stay(now),
            "patient left without being seen"
        );
        Ok(Step::Finished(Disposition::Lwbs))
    }

    pub fn on_hold_complete(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
    ) -> Result<Step, InvariantViolation> {
        let now = self.now();
        match *phase {
            CarePhase::FastService { slot } => {
                self.release(slot)?;
                patient.exit_min = Some(now);
                self.stats
                    .record_fast_completion(now, patient.length_of_stay(now));
                debug!(patient = patient.id, now, "fast-track discharge");
                Ok(Step::Finished(Disposition::Discharged))
            }
            CarePhase::InitialAssessment { bed, provider } => {
                self.release(provider)?;
                if patient.lab_needed {
                    self.request_lab(entity, phase, bed)
                } else {
                    self.dispose(entity, patient, phase, bed)
                }
            }
            CarePhase::LabWork { bed, lab } => {
                self.release(lab)?;
                match self.pools.get_mut(PoolKind::Providers).request(entity) {
                    RequestOutcome::Granted(provider) => {
                        self.start_review(entity, phase, bed, provider)
                    }
                    RequestOutcome::Queued(provider) => {
                        *phase = CarePhase::AwaitingReview { bed, provider };
                        Ok(Step::Suspended)
                    }
                }
            }
            CarePhase::Review { bed, provider } => {
                self.release(provider)?;
                self.dispose(entity, patient, phase, bed)
            }
            CarePhase::Boarding { bed, started_at } => {
                let boarded = now - started_at;
                self.release(bed)?;
                patient.boarded_minutes = boarded;
                patient.exit_min = Some(now);
                self.stats
                    .record_admission(now, patient.length_of_stay(now), boarded);
                debug!(patient = patient.id, now, boarded, "admitted");
                Ok(Step::Finished(Disposition::Admitted))
            }
            _ => Err(unexpected(patient, EventKind::HoldComplete, phase)),
        }
    }

    /// Queue is long, or the track is full and the queue-based wait estimate
    /// exceeds the threshold.
    fn fast_track_congested(&self) -> bool {
        let fast = self.pools.get(PoolKind::FastTrack);
        let queued = fast.queue_len();
        if queued >= fast.capacity() * 3 {
            return true;
        }
        if fast.has_spare_capacity() {
            return false;
        }
        // A full track means a positive wait even before anyone has queued.
        let threshold = self.config.overflow_threshold_minutes;
        let estimated_wait = queued as f64 * self.config.fast_service_mean;
        estimated_wait > threshold || threshold <= 0.0
    }

    fn beds_have_room(&self) -> bool {
        let beds = self.pools.get(PoolKind::Beds);
        beds.queue_len() + beds.holders() < beds.capacity()
    }

    fn enter_fast_track(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
    ) -> Result<Step, InvariantViolation> {
        match self.pools.get_mut(PoolKind::FastTrack).request(entity) {
            RequestOutcome::Granted(slot) => self.start_fast_service(entity, patient, phase, slot),
            RequestOutcome::Queued(slot) => {
                *phase = CarePhase::AwaitingFastTrack { slot };
                self.arm_lwbs_timer(entity, slot)?;
                Ok(Step::Suspended)
            }
        }
    }

    fn enter_main_track(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
    ) -> Result<Step, InvariantViolation> {
        match self.pools.get_mut(PoolKind::Beds).request(entity) {
            RequestOutcome::Granted(bed) => self.on_bed_granted(entity, patient, phase, bed),
            RequestOutcome::Queued(bed) => {
                *phase = CarePhase::AwaitingBed { bed };
                self.arm_lwbs_timer(entity, bed)?;
                Ok(Step::Suspended)
            }
        }
    }

    fn arm_lwbs_timer(
        &mut self,
        entity: Entity,
        request: PendingRequest,
    ) -> Result<(), InvariantViolation> {
        let Some(cap) = self.config.lwbs_wait_cap_minutes else {
            return Ok(());
        };
        self.clock.schedule_in(
            cap,
            EventKind::LwbsTimeout,
            Some(EventSubject::Request {
                patient: entity,
                request,
            }),
        )
    }

    fn start_fast_service(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
        slot: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        let now = self.now();
        self.stats
            .record_fast_wait(now, patient.length_of_stay(now));
        patient.first_seen_min = Some(now);
        let duration = self.sampler.lognormal(self.config.fast_service_mean);
        *phase = CarePhase::FastService { slot };
        self.hold(entity, duration)
    }

    /// Bed in hand: queue for a provider with no abandonment timer.
    fn on_bed_granted(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
        bed: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        match self.pools.get_mut(PoolKind::Providers).request(entity) {
            RequestOutcome::Granted(provider) => {
                self.start_initial_assessment(entity, patient, phase, bed, provider)
            }
            RequestOutcome::Queued(provider) => {
                *phase = CarePhase::AwaitingProvider { bed, provider };
                Ok(Step::Suspended)
            }
        }
    }

    fn start_initial_assessment(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
        bed: PendingRequest,
        provider: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        let now = self.now();
        self.stats
            .record_main_wait(now, patient.length_of_stay(now));
        patient.first_seen_min = Some(now);
        let mean = if patient.is_overflow() {
            self.config.fast_service_mean
        } else {
            self.config.main_initial_mean
        };
        let duration = self.sampler.lognormal(mean);
        *phase = CarePhase::InitialAssessment { bed, provider };
        self.hold(entity, duration)
    }

    fn request_lab(
        &mut self,
        entity: Entity,
        phase: &mut CarePhase,
        bed: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        match self.pools.get_mut(PoolKind::Lab).request(entity) {
            RequestOutcome::Granted(lab) => self.start_lab(entity, phase, bed, lab),
            RequestOutcome::Queued(lab) => {
                *phase = CarePhase::AwaitingLab { bed, lab };
                Ok(Step::Suspended)
            }
        }
    }

    fn start_lab(
        &mut self,
        entity: Entity,
        phase: &mut CarePhase,
        bed: PendingRequest,
        lab: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        let duration = self.sampler.lognormal(self.config.lab_mean);
        *phase = CarePhase::LabWork { bed, lab };
        self.hold(entity, duration)
    }

    fn start_review(
        &mut self,
        entity: Entity,
        phase: &mut CarePhase,
        bed: PendingRequest,
        provider: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        let duration = self.sampler.lognormal(self.config.review_mean);
        *phase = CarePhase::Review { bed, provider };
        self.hold(entity, duration)
    }

    /// Care is complete: board and admit, or free the bed and discharge.
    fn dispose(
        &mut self,
        entity: Entity,
        patient: &mut Patient,
        phase: &mut CarePhase,
        bed: PendingRequest,
    ) -> Result<Step, InvariantViolation> {
        let now = self.now();
        if patient.admit {
            let duration = self.sampler.lognormal(self.config.boarding_mean);
            *phase = CarePhase::Boarding {
                bed,
                started_at: now,
            };
            return self.hold(entity, duration);
        }

        self.release(bed)?;
        patient.exit_min = Some(now);
        let length_of_stay = patient.length_of_stay(now);
        if patient.is_overflow() {
            self.stats.record_fast_completion(now, length_of_stay);
        } else {
            self.stats.record_main_discharge(now, length_of_stay);
        }
        debug!(patient = patient.id, now, stream = ?patient.stream, "main-bed discharge");
        Ok(Step::Finished(Disposition::Discharged))
    }

    fn hold(&mut self, entity: Entity, duration: f64) -> Result<Step, InvariantViolation> {
        self.clock.schedule_in(
            duration,
            EventKind::HoldComplete,
            Some(EventSubject::Patient(entity)),
        )?;
        Ok(Step::Suspended)
    }

    /// Return a slot; if someone was queued, resume them at the current time.
    fn release(&mut self, request: PendingRequest) -> Result<(), InvariantViolation> {
        let Some(grant) = self.pools.get_mut(request.pool).release(request)? else {
            return Ok(());
        };
        let now = self.now();
        self.clock.schedule_at(
            now,
            EventKind::ResourceGranted,
            Some(EventSubject::Request {
                patient: grant.owner,
                request: grant.request,
            }),
        )
    }
}

fn unexpected(patient: &Patient, event: EventKind, phase: &CarePhase) -> InvariantViolation {
    InvariantViolation::UnexpectedResume {
        patient_id: patient.id,
        event: event.name(),
        phase: phase.name(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn patient_flow_system(
    event: Res<CurrentEvent>,
    config: Res<SimulationConfig>,
    mut clock: ResMut<SimulationClock>,
    mut pools: ResMut<ResourcePools>,
    mut stats: ResMut<SimStats>,
    mut random: ResMut<RandomSource>,
    mut fault: ResMut<SimulationFault>,
    mut commands: Commands,
    mut patients: Query<(&mut Patient, &mut CarePhase)>,
) {
    let kind = event.0.kind;
    let Some(subject) = event.0.subject else {
        return;
    };
    let entity = subject.patient();

    let Ok((mut patient, mut phase)) = patients.get_mut(entity) else {
        // A timer outliving its patient is normal; anything else leaked a slot.
        if kind != EventKind::LwbsTimeout {
            fault.raise(InvariantViolation::MissingPatient { event: kind.name() });
        }
        return;
    };

    let mut flow = PatientFlow {
        clock: &mut *clock,
        pools: &mut *pools,
        stats: &mut *stats,
        sampler: random.sampler(),
        config: &*config,
    };

    trace!(patient = patient.id, event = kind.name(), phase = phase.name(), "resuming patient");
    let result = match (kind, subject) {
        (EventKind::PatientArrived, _) => flow.on_arrived(entity, &mut patient, &mut phase),
        (EventKind::ResourceGranted, EventSubject::Request { request, .. }) => {
            flow.on_granted(entity, &mut patient, &mut phase, request)
        }
        (EventKind::LwbsTimeout, EventSubject::Request { request, .. }) => {
            flow.on_lwbs_timeout(&mut patient, &mut phase, request)
        }
        (EventKind::HoldComplete, _) => flow.on_hold_complete(entity, &mut patient, &mut phase),
        _ => Err(unexpected(&patient, kind, &phase)),
    };

    match result {
        Ok(Step::Suspended) => {}
        Ok(Step::Finished(disposition)) => {
            trace!(patient = patient.id, ?disposition, "patient finished");
            commands.entity(entity).despawn();
        }
        Err(violation) => fault.raise(violation),
    }
}
