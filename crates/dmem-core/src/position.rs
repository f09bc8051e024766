//! Write-offset bookkeeping.
//!
//! The next free offset lives in its own cache line so that writers
//! bumping it do not invalidate the line holding the capacity or
//! neighbouring counters.

use core::sync::atomic::{AtomicUsize, Ordering};
use crossbeam_utils::CachePadded;

use dmem_proto::RECORD_SIZE;

/// Next-free-offset tracker for one buffer (or one segment).
///
/// Invariant: `0 <= position <= capacity`. Locked strategies mutate it
/// only while holding their lock; the optimistic strategy advances it
/// with compare-and-swap.
pub struct PositionTracker {
    position: CachePadded<AtomicUsize>,
    capacity: usize,
}

impl PositionTracker {
    /// Tracker for an empty region of `capacity` bytes.
    pub const fn new(capacity: usize) -> Self {
        Self {
            position: CachePadded::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Current next free offset.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    /// Region size in bytes.
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check one more record fits after `position`.
    #[inline(always)]
    pub const fn has_room_after(&self, position: usize) -> bool {
        position + RECORD_SIZE <= self.capacity
    }

    /// Check a record starts at `offset` and is fully written.
    #[inline(always)]
    pub fn is_written(&self, offset: usize) -> bool {
        is_record_within(offset, self.position())
    }

    /// Publish a new position (caller holds the owning lock).
    #[inline(always)]
    pub fn store(&self, position: usize) {
        debug_assert!(position <= self.capacity, "Position past capacity");
        self.position.store(position, Ordering::Release);
    }

    /// Advance by one record (caller holds the owning lock).
    #[inline(always)]
    pub fn advance(&self) {
        self.store(self.position.load(Ordering::Relaxed) + RECORD_SIZE);
    }

    /// Atomically move from `current` to `next`.
    ///
    /// Fails with the observed position if another writer got there first.
    #[inline(always)]
    pub fn compare_exchange(&self, current: usize, next: usize) -> Result<usize, usize> {
        debug_assert!(next <= self.capacity, "Position past capacity");
        self.position
            .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
    }

    /// Reserve one record slot at `current` (CAS `current -> current + 64`).
    #[inline(always)]
    pub fn try_reserve(&self, current: usize) -> Result<usize, usize> {
        self.compare_exchange(current, current + RECORD_SIZE)
    }

    /// Sequentially consistent position load, for use with `try_reserve`.
    #[inline(always)]
    pub fn position_seq_cst(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    /// Rewind to the start of the region.
    #[inline(always)]
    pub fn reset(&self) {
        self.position.store(0, Ordering::SeqCst);
    }

    /// Bytes written.
    #[inline(always)]
    pub fn used(&self) -> usize {
        self.position()
    }

    /// Bytes still free.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.position())
    }
}

/// Check `offset` is record-aligned and the whole record lies below `end`.
#[inline(always)]
pub fn is_record_within(offset: usize, end: usize) -> bool {
    offset % RECORD_SIZE == 0
        && offset
            .checked_add(RECORD_SIZE)
            .map_or(false, |record_end| record_end <= end)
}

/// Fraction of `capacity` in use; an empty region counts as full.
#[inline]
pub fn utilisation(used: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return 1.0;
    }
    used as f64 / capacity as f64
}
