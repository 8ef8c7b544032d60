use std::collections::VecDeque;

use bevy_ecs::prelude::Entity;
use ed_core::pool::{PendingRequest, PoolKind, RequestOutcome, ResourcePool};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Request,
    ReleaseOldestHolder,
    WithdrawQueued(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Request),
        2 => Just(Op::ReleaseOldestHolder),
        1 => (0usize..8).prop_map(Op::WithdrawQueued),
    ]
}

proptest! {
    #[test]
    fn holders_never_exceed_capacity_and_grants_follow_queue_order(
        capacity in 1usize..5,
        ops in prop::collection::vec(op(), 1..200),
    ) {
        let mut pool = ResourcePool::new(PoolKind::Beds, capacity).unwrap();
        let mut held: VecDeque<PendingRequest> = VecDeque::new();
        let mut queued: VecDeque<PendingRequest> = VecDeque::new();
        let mut owner = 0u32;

        for op in ops {
            match op {
                Op::Request => {
                    owner += 1;
                    match pool.request(Entity::from_raw(owner)) {
                        RequestOutcome::Granted(request) => {
                            prop_assert!(queued.is_empty());
                            held.push_back(request);
                        }
                        RequestOutcome::Queued(request) => {
                            prop_assert_eq!(held.len(), capacity);
                            queued.push_back(request);
                        }
                    }
                }
                Op::ReleaseOldestHolder => {
                    let Some(request) = held.pop_front() else { continue };
                    let grant = pool.release(request).unwrap();
                    // The slot goes to the longest-waiting request, if any.
                    prop_assert_eq!(grant.map(|g| g.request), queued.front().copied());
                    if let Some(next) = queued.pop_front() {
                        prop_assert!(pool.is_held(next));
                        held.push_back(next);
                    }
                }
                Op::WithdrawQueued(index) => {
                    if queued.is_empty() {
                        continue;
                    }
                    let request = queued.remove(index % queued.len()).unwrap();
                    pool.withdraw(request).unwrap();
                    prop_assert!(!pool.is_queued(request));
                }
            }
            prop_assert!(pool.holders() <= pool.capacity());
            prop_assert_eq!(pool.holders(), held.len());
            prop_assert_eq!(pool.queue_len(), queued.len());
        }
    }
}
