//! Reader-writer-separated strategy.
//!
//! Writers take the lock exclusively; readers and queries share it, so
//! reads proceed in parallel with each other but never with a write.
//! Suited to read-heavy workloads. Batch writes amortize one exclusive
//! acquisition over many records.

use parking_lot::RwLock;
use tracing::debug;

use crate::arena::Arena;
use crate::position::PositionTracker;
use crate::strategy::DirectMemoryStrategy;
use dmem_proto::{decode, encode_into, Order, RECORD_SIZE};

/// Record buffer guarded by a readers-writer lock.
pub struct ReadWriteMemory {
    arena: RwLock<Arena>,
    /// Mutated only while `arena` is write-locked.
    tracker: PositionTracker,
}

impl ReadWriteMemory {
    /// Create a buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "read-write buffer created");
        Self {
            arena: RwLock::new(Arena::new(capacity)),
            tracker: PositionTracker::new(capacity),
        }
    }

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

    /// Decode several records under one shared acquisition.
    ///
    /// Unwritten offsets yield `None` in the corresponding slot.
    pub fn deserialize_many(&self, offsets: &[usize]) -> Vec<Option<Order>> {
        let arena = self.arena.read();
        offsets
            .iter()
            .map(|&offset| {
                if !self.tracker.is_written(offset) {
                    return None;
                }
                let bytes = arena.read_record(offset)?;
                decode(&bytes, 0).ok()
            })
            .collect()
    }
}

impl DirectMemoryStrategy for ReadWriteMemory {
    fn serialize(&self, order: &Order) -> bool {
        let mut staged = [0u8; RECORD_SIZE];
        encode_into(order, &mut staged);

        let mut arena = self.arena.write();
        self.append_locked(&mut arena, &staged)
    }

    fn serialize_batch(&self, orders: &[Order]) -> usize {
        let mut staged = [0u8; RECORD_SIZE];
        let mut arena = self.arena.write();

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
            let arena = self.arena.read();
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

        let mut arena = self.arena.write();
        if !self.tracker.has_room_after(self.tracker.position()) {
            if !self.tracker.has_room_after(0) {
                return false;
            }
            debug!("read-write buffer wrapped");
            self.tracker.reset();
        }
        self.append_locked(&mut arena, &staged)
    }

    fn reset(&self) {
        let mut arena = self.arena.write();
        self.tracker.reset();
        arena.clear();
        debug!("read-write buffer reset");
    }

    fn force_reset(&self) {
        let _arena = self.arena.write();
        self.tracker.reset();
    }

    fn used_bytes(&self) -> usize {
        let _arena = self.arena.read();
        self.tracker.used()
    }

    fn capacity_bytes(&self) -> usize {
        self.tracker.capacity()
    }

    fn remaining_bytes(&self) -> usize {
        let _arena = self.arena.read();
        self.tracker.remaining()
    }

    fn name(&self) -> &'static str {
        "read-write"
    }

    fn description(&self) -> &'static str {
        "readers-writer lock: shared reads, exclusive writes"
    }
}
