use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

use crate::pool::PendingRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    Fast,
    Main,
    /// Fast-track patient rerouted to a main bed. Never reverted.
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Patient {
    pub id: u64,
    pub arrival_min: f64,
    pub stream: Stream,
    pub lab_needed: bool,
    pub admit: bool,
    /// When a clinician (fast-track slot or main provider) first picked the patient up.
    pub first_seen_min: Option<f64>,
    /// Set once, when the patient reaches a terminal state.
    pub exit_min: Option<f64>,
    pub boarded_minutes: f64,
}

impl Patient {
    pub fn new(id: u64, arrival_min: f64, stream: Stream) -> Self {
        Self {
            id,
            arrival_min,
            stream,
            lab_needed: false,
            admit: false,
            first_seen_min: None,
            exit_min: None,
            boarded_minutes: 0.0,
        }
    }

    pub fn is_overflow(&self) -> bool {
        self.stream == Stream::Overflow
    }

    /// Reroute a fast-track patient into the main pipeline as a simple case.
    pub fn reroute_to_overflow(&mut self) {
        self.stream = Stream::Overflow;
        self.lab_needed = false;
        self.admit = false;
    }

    pub fn length_of_stay(&self, now: f64) -> f64 {
        now - self.arrival_min
    }
}

/// Where a patient is in its care pathway; the continuation resumed by events.
///
/// Waiting variants carry the queued request; service variants carry every
/// slot the patient currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub enum CarePhase {
    Arrived,
    AwaitingFastTrack {
        slot: PendingRequest,
    },
    FastService {
        slot: PendingRequest,
    },
    AwaitingBed {
        bed: PendingRequest,
    },
    AwaitingProvider {
        bed: PendingRequest,
        provider: PendingRequest,
    },
    InitialAssessment {
        bed: PendingRequest,
        provider: PendingRequest,
    },
    AwaitingLab {
        bed: PendingRequest,
        lab: PendingRequest,
    },
    LabWork {
        bed: PendingRequest,
        lab: PendingRequest,
    },
    AwaitingReview {
        bed: PendingRequest,
        provider: PendingRequest,
    },
    Review {
        bed: PendingRequest,
        provider: PendingRequest,
    },
    Boarding {
        bed: PendingRequest,
        started_at: f64,
    },
}

impl CarePhase {
    pub fn name(&self) -> &'static str {
        match self {
            CarePhase::Arrived => "Arrived",
            CarePhase::AwaitingFastTrack { .. } => "AwaitingFastTrack",
            CarePhase::FastService { .. } => "FastService",
            CarePhase::AwaitingBed { .. } => "AwaitingBed",
            CarePhase::AwaitingProvider { .. } => "AwaitingProvider",
            CarePhase::InitialAssessment { .. } => "InitialAssessment",
            CarePhase::AwaitingLab { .. } => "AwaitingLab",
            CarePhase::LabWork { .. } => "LabWork",
            CarePhase::AwaitingReview { .. } => "AwaitingReview",
            CarePhase::Review { .. } => "Review",
            CarePhase::Boarding { .. } => "Boarding",
        }
    }

    /// The request this phase is queued on, if any.
    pub fn awaited_request(&self) -> Option<PendingRequest> {
        match *self {
            CarePhase::AwaitingFastTrack { slot } => Some(slot),
            CarePhase::AwaitingBed { bed } => Some(bed),
            CarePhase::AwaitingProvider { provider, .. } => Some(provider),
            CarePhase::AwaitingLab { lab, .. } => Some(lab),
            CarePhase::AwaitingReview { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

/// Terminal state of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Discharged,
    Admitted,
    /// Left without being seen.
    Lwbs,
}
