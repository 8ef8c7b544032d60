use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

use crate::error::InvariantViolation;
use crate::pool::PendingRequest;

pub const MINUTES_PER_HOUR: f64 = 60.0;
pub const MINUTES_PER_DAY: f64 = 24.0 * MINUTES_PER_HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    SimulationStarted,
    /// The arrival generator produces the next patient.
    PatientArrival,
    /// A freshly spawned patient starts its care pathway.
    PatientArrived,
    /// A queued request was granted; its owner resumes.
    ResourceGranted,
    /// The LWBS timer of a queued request expired.
    LwbsTimeout,
    /// A timed hold (service, lab work, boarding) finished.
    HoldComplete,
    CensusSample,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SimulationStarted => "SimulationStarted",
            EventKind::PatientArrival => "PatientArrival",
            EventKind::PatientArrived => "PatientArrived",
            EventKind::ResourceGranted => "ResourceGranted",
            EventKind::LwbsTimeout => "LwbsTimeout",
            EventKind::HoldComplete => "HoldComplete",
            EventKind::CensusSample => "CensusSample",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    Patient(Entity),
    /// A patient's request in one of the pools (grant or timeout side of a race).
    Request {
        patient: Entity,
        request: PendingRequest,
    },
}

impl EventSubject {
    pub fn patient(&self) -> Entity {
        match *self {
            EventSubject::Patient(patient) | EventSubject::Request { patient, .. } => patient,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// Absolute simulation time in minutes.
    pub timestamp: f64,
    /// Insertion order; breaks timestamp ties first-scheduled-first.
    pub seq: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by (timestamp, seq).
        other
            .timestamp
            .total_cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

/// The event being dispatched by the runner in the current step.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

/// Virtual time plus the queue of pending events.
///
/// Time only moves forward, and only when an event is popped.
#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: f64,
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn schedule_at(
        &mut self,
        timestamp: f64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) -> Result<(), InvariantViolation> {
        // Also rejects NaN, which would poison the heap order.
        if !(timestamp >= self.now) {
            return Err(InvariantViolation::ScheduledInPast {
                at: timestamp,
                now: self.now,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp,
            seq,
            kind,
            subject,
        });
        Ok(())
    }

    pub fn schedule_in(
        &mut self,
        delay: f64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) -> Result<(), InvariantViolation> {
        self.schedule_at(self.now + delay, kind, subject)
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<f64> {
        self.events.peek().map(|e| e.timestamp)
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
