//! Error types for configuration and engine invariants.

use bevy_ecs::prelude::Resource;
use thiserror::Error;

use crate::pool::{PendingRequest, PoolKind};

/// Invalid simulation configuration, detected before a run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A resource pool was configured without any capacity.
    #[error("{pool:?} capacity must be positive, got {value}")]
    NonPositiveCapacity { pool: PoolKind, value: usize },

    /// A rate or mean duration is negative, zero where forbidden, or not finite.
    #[error("{field} must be a finite value >= {min}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
    },

    /// A probability is outside [0, 1].
    #[error("{field} must be a probability in [0, 1], got {value}")]
    InvalidProbability { field: &'static str, value: f64 },

    /// Warm-up must fit inside the horizon.
    #[error("warm-up ({warmup_minutes} min) must lie within [0, horizon ({horizon_minutes} min)]")]
    WarmupBeyondHorizon {
        warmup_minutes: f64,
        horizon_minutes: f64,
    },
}

/// Internal contract violations. These indicate a bug in the engine, never bad input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// Released a request that the pool does not consider held.
    #[error("release of {request:?}, which is not held")]
    ReleaseNotHeld { request: PendingRequest },

    /// Withdrew a request that has already been granted.
    #[error("withdraw of {request:?}, which was already granted")]
    WithdrawGranted { request: PendingRequest },

    /// Withdrew a request the pool has no record of.
    #[error("withdraw of unknown request {request:?}")]
    WithdrawUnknown { request: PendingRequest },

    /// A handle was presented to a pool of a different kind.
    #[error("{request:?} presented to the {pool:?} pool")]
    WrongPool {
        request: PendingRequest,
        pool: PoolKind,
    },

    /// A patient was resumed by an event its current phase does not expect.
    #[error("patient {patient_id} resumed by {event} while in phase {phase}")]
    UnexpectedResume {
        patient_id: u64,
        event: &'static str,
        phase: &'static str,
    },

    /// A resume event targeted a patient that no longer exists.
    #[error("{event} delivered to a patient that has already left")]
    MissingPatient { event: &'static str },

    /// An event was scheduled before the current virtual time.
    #[error("event scheduled at {at} but clock is already at {now}")]
    ScheduledInPast { at: f64, now: f64 },

    /// A pool reported more holders than its capacity.
    #[error("{pool:?} has {holders} holders for capacity {capacity}")]
    OverCapacity {
        pool: PoolKind,
        holders: usize,
        capacity: usize,
    },
}

/// Any failure surfaced by a simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// First invariant violation raised by a system during the current step.
///
/// Systems cannot return errors, so they park the violation here and the
/// runner turns it into an `Err` once the step completes.
#[derive(Debug, Default, Resource)]
pub struct SimulationFault(Option<InvariantViolation>);

impl SimulationFault {
    /// Record a violation; later violations in the same step are dropped.
    pub fn raise(&mut self, violation: InvariantViolation) {
        if self.0.is_none() {
            tracing::error!(%violation, "simulation invariant violated");
            self.0 = Some(violation);
        }
    }

    pub fn take(&mut self) -> Option<InvariantViolation> {
        self.0.take()
    }

    pub fn is_raised(&self) -> bool {
        self.0.is_some()
    }
}
