//! Exclusive-lock strategy.
//!
//! One mutex serializes every write and every read. This is the
//! baseline the other strategies are measured against.

use parking_lot::Mutex;
use tracing::debug;

use crate::arena::Arena;
use crate::position::PositionTracker;
use crate::strategy::DirectMemoryStrategy;
use dmem_proto::{decode, encode_into, Order, RECORD_SIZE};

/// Record buffer guarded by a single mutex.
pub struct ExclusiveLockMemory {
    arena: Mutex<Arena>,
    /// Mutated only while `arena` is locked.
    tracker: PositionTracker,
}

impl ExclusiveLockMemory {
    /// Create a buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "exclusive-lock buffer created");
        Self {
            arena: Mutex::new(Arena::new(capacity)),
            tracker: PositionTracker::new(capacity),
        }
    }

    /// Append one staged record; caller holds the lock.
    #[inline(always)]
    fn append_locked(&self, arena: &mut Arena, staged: &[u8; RECORD_SIZE]) -> bool {
        let position = self.tracker.position();
        if !self.tracker.has_room_after(position) {
            return false;
        }
        arena.write_record(position, staged);
        self.tracker.store(position + RECORD_SIZE);
        true
    }
}

impl DirectMemoryStrategy for ExclusiveLockMemory {
    fn serialize(&self, order: &Order) -> bool {
        let mut staged = [0u8; RECORD_SIZE];
        encode_into(order, &mut staged);

        let mut arena = self.arena.lock();
        self.append_locked(&mut arena, &staged)
    }

    fn serialize_batch(&self, orders: &[Order]) -> usize {
        let mut staged = [0u8; RECORD_SIZE];
        let mut arena = self.arena.lock();

        let mut written = 0;
        for order in orders {
            encode_into(order, &mut staged);
            if !self.append_locked(&mut arena, &staged) {
                break;
            }
            written += 1;
        }
        written
    }

    fn deserialize_at(&self, offset: usize) -> Option<Order> {
        let bytes = {
            let arena = self.arena.lock();
            if !self.tracker.is_written(offset) {
                return None;
            }
            arena.read_record(offset)?
        };
        decode(&bytes, 0).ok()
    }

    fn serialize_ring(&self, order: &Order) -> bool {
        let mut staged = [0u8; RECORD_SIZE];
        encode_into(order, &mut staged);

        let mut arena = self.arena.lock();
        if !self.tracker.has_room_after(self.tracker.position()) {
            if !self.tracker.has_room_after(0) {
                return false;
            }
            debug!("exclusive-lock buffer wrapped");
            self.tracker.reset();
        }
        self.append_locked(&mut arena, &staged)
    }

    fn reset(&self) {
        let mut arena = self.arena.lock();
        self.tracker.reset();
        arena.clear();
        debug!("exclusive-lock buffer reset");
    }

    fn force_reset(&self) {
        let _arena = self.arena.lock();
        self.tracker.reset();
    }

    fn used_bytes(&self) -> usize {
        self.tracker.used()
    }

    fn capacity_bytes(&self) -> usize {
        self.tracker.capacity()
    }

    fn name(&self) -> &'static str {
        "exclusive"
    }

    fn description(&self) -> &'static str {
        "single mutex serializing every read and write"
    }
}
