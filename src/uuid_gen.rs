//! The `resource_id`/`persistence_id` generator, injected so tests can
//! replace it with a deterministic source (invariant #5: identical input
//! plus an identical uuid sequence produces an identical recommendation
//! sequence).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

pub trait UuidSource: Send + Sync {
    fn next_uuid(&self) -> Uuid;
}

#[derive(Default)]
pub struct RandomUuidSource;

impl UuidSource for RandomUuidSource {
    fn next_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Produces `00000000-0000-0000-0000-00000000000N` for increasing `N`,
/// letting tests assert on exact generated ids without depending on
/// wall-clock randomness.
pub struct SequentialUuidSource {
    counter: AtomicU64,
}

impl SequentialUuidSource {
    pub fn new() -> Self {
        SequentialUuidSource {
            counter: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialUuidSource {
    fn default() -> Self {
        SequentialUuidSource::new()
    }
}

impl UuidSource for SequentialUuidSource {
    fn next_uuid(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Uuid::from_u128(u128::from(n))
    }
}

/// A fixed, pre-recorded sequence, for tests that want to assert on
/// specific ids rather than merely "sequential".
pub struct FixedUuidSource {
    remaining: Mutex<std::collections::VecDeque<Uuid>>,
}

impl FixedUuidSource {
    pub fn new(uuids: impl IntoIterator<Item = Uuid>) -> Self {
        FixedUuidSource {
            remaining: Mutex::new(uuids.into_iter().collect()),
        }
    }
}

impl UuidSource for FixedUuidSource {
    fn next_uuid(&self) -> Uuid {
        self.remaining
            .lock()
            .unwrap()
            .pop_front()
            .expect("FixedUuidSource exhausted")
    }
}
