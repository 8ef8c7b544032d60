//! Capacity-limited shared resources with a FIFO wait queue.
//!
//! A pool grants requests immediately while it has spare capacity and queues
//! them otherwise. Releasing a held request hands the freed slot straight to
//! the head of the queue, so the holder count never exceeds capacity and no
//! request is granted twice. Withdrawing (giving up while queued) and
//! releasing (returning a held slot) are separate operations.

use std::collections::{HashMap, VecDeque};

use bevy_ecs::prelude::{Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::config::ResourceCapacities;
use crate::error::{ConfigurationError, InvariantViolation};

/// The four pools an emergency department competes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoolKind {
    FastTrack,
    Beds,
    Providers,
    Lab,
}

impl PoolKind {
    pub const ALL: [PoolKind; 4] = [
        PoolKind::FastTrack,
        PoolKind::Beds,
        PoolKind::Providers,
        PoolKind::Lab,
    ];
}

/// Handle identifying one request's place in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingRequest {
    pub pool: PoolKind,
    pub id: u64,
}

/// Result of [ResourcePool::request].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Capacity was available; the caller holds the slot now.
    Granted(PendingRequest),
    /// The request joined the back of the wait queue.
    Queued(PendingRequest),
}

impl RequestOutcome {
    pub fn request(&self) -> PendingRequest {
        match *self {
            RequestOutcome::Granted(request) | RequestOutcome::Queued(request) => request,
        }
    }
}

/// A queued request that was just handed a slot by a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub request: PendingRequest,
    pub owner: Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Queued,
    Held,
}

#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    owner: Entity,
    state: RequestState,
}

#[derive(Debug, Clone)]
pub struct ResourcePool {
    kind: PoolKind,
    capacity: usize,
    holders: usize,
    queue: VecDeque<u64>,
    /// Live requests only; released and withdrawn ones are forgotten.
    requests: HashMap<u64, RequestRecord>,
    next_id: u64,
}

impl ResourcePool {
    pub fn new(kind: PoolKind, capacity: usize) -> Result<Self, ConfigurationError> {
        if capacity == 0 {
            return Err(ConfigurationError::NonPositiveCapacity {
                pool: kind,
                value: capacity,
            });
        }
        Ok(Self {
            kind,
            capacity,
            holders: 0,
            queue: VecDeque::new(),
            requests: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn holders(&self) -> usize {
        self.holders
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// True when a new request would be granted without queueing.
    pub fn has_spare_capacity(&self) -> bool {
        self.holders < self.capacity
    }

    pub fn is_queued(&self, request: PendingRequest) -> bool {
        self.state_of(request) == Some(RequestState::Queued)
    }

    pub fn is_held(&self, request: PendingRequest) -> bool {
        self.state_of(request) == Some(RequestState::Held)
    }

    /// Ask for one slot on behalf of `owner`.
    pub fn request(&mut self, owner: Entity) -> RequestOutcome {
        let handle = PendingRequest {
            pool: self.kind,
            id: self.next_id,
        };
        self.next_id += 1;

        if self.holders < self.capacity {
            self.holders += 1;
            self.requests.insert(
                handle.id,
                RequestRecord {
                    owner,
                    state: RequestState::Held,
                },
            );
            RequestOutcome::Granted(handle)
        } else {
            self.queue.push_back(handle.id);
            self.requests.insert(
                handle.id,
                RequestRecord {
                    owner,
                    state: RequestState::Queued,
                },
            );
            RequestOutcome::Queued(handle)
        }
    }

    /// Return a held slot. If anyone is queued, the head of the queue is
    /// granted in the same step and returned so its owner can be resumed.
    pub fn release(&mut self, request: PendingRequest) -> Result<Option<Grant>, InvariantViolation> {
        self.check_kind(request)?;
        match self.requests.get(&request.id) {
            Some(record) if record.state == RequestState::Held => {}
            _ => return Err(InvariantViolation::ReleaseNotHeld { request }),
        }
        self.requests.remove(&request.id);
        self.holders -= 1;

        let Some(next_id) = self.queue.pop_front() else {
            return Ok(None);
        };
        let record = self
            .requests
            .get_mut(&next_id)
            .ok_or(InvariantViolation::WithdrawUnknown {
                request: PendingRequest {
                    pool: self.kind,
                    id: next_id,
                },
            })?;
        record.state = RequestState::Held;
        self.holders += 1;
        Ok(Some(Grant {
            request: PendingRequest {
                pool: self.kind,
                id: next_id,
            },
            owner: record.owner,
        }))
    }

    /// Remove a request that is still waiting. Holder count is untouched.
    pub fn withdraw(&mut self, request: PendingRequest) -> Result<(), InvariantViolation> {
        self.check_kind(request)?;
        match self.state_of(request) {
            None => return Err(InvariantViolation::WithdrawUnknown { request }),
            Some(RequestState::Held) => return Err(InvariantViolation::WithdrawGranted { request }),
            Some(RequestState::Queued) => {}
        }
        self.requests.remove(&request.id);
        if let Some(position) = self.queue.iter().position(|id| *id == request.id) {
            self.queue.remove(position);
        }
        Ok(())
    }

    fn state_of(&self, request: PendingRequest) -> Option<RequestState> {
        if request.pool != self.kind {
            return None;
        }
        self.requests.get(&request.id).map(|record| record.state)
    }

    fn check_kind(&self, request: PendingRequest) -> Result<(), InvariantViolation> {
        if request.pool == self.kind {
            Ok(())
        } else {
            Err(InvariantViolation::WrongPool {
                request,
                pool: self.kind,
            })
        }
    }
}

/// The department's four pools, addressed by [PoolKind].
#[derive(Debug, Clone, Resource)]
pub struct ResourcePools {
    fast_track: ResourcePool,
    beds: ResourcePool,
    providers: ResourcePool,
    lab: ResourcePool,
}

impl ResourcePools {
    pub fn from_capacities(capacities: &ResourceCapacities) -> Result<Self, ConfigurationError> {
        Ok(Self {
            fast_track: ResourcePool::new(PoolKind::FastTrack, capacities.fast_capacity)?,
            beds: ResourcePool::new(PoolKind::Beds, capacities.main_beds)?,
            providers: ResourcePool::new(PoolKind::Providers, capacities.main_providers)?,
            lab: ResourcePool::new(PoolKind::Lab, capacities.lab_techs)?,
        })
    }

    pub fn get(&self, kind: PoolKind) -> &ResourcePool {
        match kind {
            PoolKind::FastTrack => &self.fast_track,
            PoolKind::Beds => &self.beds,
            PoolKind::Providers => &self.providers,
            PoolKind::Lab => &self.lab,
        }
    }

    pub fn get_mut(&mut self, kind: PoolKind) -> &mut ResourcePool {
        match kind {
            PoolKind::FastTrack => &mut self.fast_track,
            PoolKind::Beds => &mut self.beds,
            PoolKind::Providers => &mut self.providers,
            PoolKind::Lab => &mut self.lab,
        }
    }

    /// Current holder count per pool, in [PoolKind::ALL] order.
    pub fn occupancy(&self) -> [usize; 4] {
        PoolKind::ALL.map(|kind| self.get(kind).holders())
    }
}
