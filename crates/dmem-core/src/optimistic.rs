//! Optimistic (CAS) strategy.
//!
//! Writers never block on each other for space: each stages its record
//! privately, then claims a 64-byte range by compare-and-swap on the
//! shared offset. Because the CAS compares the exact offset value, no two
//! writers can ever claim the same range.
//!
//! Only the raw byte copy is synchronized, under a narrow copy lock.
//! Readers never trust a copy that overlapped a write: every write is
//! bracketed by two stamp bumps, and a reader retries (and finally gives
//! up with `None`) when the stamps show a writer was in flight.

use core::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::arena::Arena;
use crate::config::OptimisticConfig;
use crate::position::{is_record_within, PositionTracker};
use crate::strategy::DirectMemoryStrategy;
use dmem_proto::{decode, encode_into, Order, RECORD_SIZE};

/// Write stamps bracketing every write.
///
/// `begun` is bumped before a writer reserves space, `finished` after
/// its copy completes (or it gives up). `finished == begun` means no
/// writer is in flight.
struct WriteStamps {
    begun: CachePadded<AtomicU64>,
    finished: CachePadded<AtomicU64>,
}

impl WriteStamps {
    const fn new() -> Self {
        Self {
            begun: CachePadded::new(AtomicU64::new(0)),
            finished: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Open a write; the returned guard closes it on drop.
    #[inline(always)]
    fn begin(&self) -> StampGuard<'_> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        StampGuard { stamps: self }
    }

    /// Current stamp if no writer is in flight.
    ///
    /// `finished` is loaded first: since `finished <= begun` always holds,
    /// equality here means both were equal when `begun` was loaded.
    #[inline(always)]
    fn quiescent(&self) -> Option<u64> {
        let finished = self.finished.load(Ordering::SeqCst);
        let begun = self.begun.load(Ordering::SeqCst);
        (finished == begun).then_some(begun)
    }

    /// Check no writer has started since `stamp` was taken.
    #[inline(always)]
    fn unchanged_since(&self, stamp: u64) -> bool {
        self.begun.load(Ordering::SeqCst) == stamp
    }

    /// Total bumps so far (two per completed write).
    fn version(&self) -> u64 {
        self.finished.load(Ordering::SeqCst) + self.begun.load(Ordering::SeqCst)
    }
}

struct StampGuard<'a> {
    stamps: &'a WriteStamps,
}

impl Drop for StampGuard<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.stamps.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lock-free-reservation record buffer.
pub struct OptimisticMemory {
    tracker: PositionTracker,
    stamps: WriteStamps,
    /// Held only for the duration of a raw 64-byte (or batch) copy.
    arena: Mutex<Arena>,
    config: OptimisticConfig,
}

impl OptimisticMemory {
    /// Create a buffer of `capacity` bytes with default retry tuning.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, OptimisticConfig::default())
    }

    /// Create a buffer of `capacity` bytes with explicit retry tuning.
    pub fn with_config(capacity: usize, config: OptimisticConfig) -> Self {
        debug!(capacity, ?config, "optimistic buffer created");
        Self {
            tracker: PositionTracker::new(capacity),
            stamps: WriteStamps::new(),
            arena: Mutex::new(Arena::new(capacity)),
            config,
        }
    }

    /// Stamp counter; advances by two for every completed write.
    pub fn version(&self) -> u64 {
        self.stamps.version()
    }

    #[inline(always)]
    fn back_off(&self, attempt: u32, backoff: &Backoff) {
        if attempt < self.config.spin_retries {
            backoff.spin();
        } else {
            thread::sleep(self.config.backoff_for(attempt));
        }
    }

    #[inline(always)]
    fn copy_in(&self, offset: usize, staged: &[u8; RECORD_SIZE]) {
        self.arena.lock().write_record(offset, staged);
    }

    #[inline(always)]
    fn is_written(&self, offset: usize) -> bool {
        is_record_within(offset, self.tracker.position_seq_cst())
    }

    fn give_up(&self, op: &'static str) -> bool {
        warn!(op, attempts = self.config.max_attempts, "optimistic write gave up under contention");
        false
    }
}

impl DirectMemoryStrategy for OptimisticMemory {
    fn serialize(&self, order: &Order) -> bool {
        let mut staged = [0u8; RECORD_SIZE];
        encode_into(order, &mut staged);

        let _stamp = self.stamps.begin();
        let backoff = Backoff::new();
        for attempt in 0..self.config.max_attempts {
            let current = self.tracker.position_seq_cst();
            if !self.tracker.has_room_after(current) {
                return false;
            }
            match self.tracker.try_reserve(current) {
                Ok(_) => {
                    self.copy_in(current, &staged);
                    return true;
                }
                Err(_) => self.back_off(attempt, &backoff),
            }
        }
        self.give_up("serialize")
    }

    /// Claims room for as many records as fit with a single CAS, then
    /// copies them all under one acquisition of the copy lock.
    fn serialize_batch(&self, orders: &[Order]) -> usize {
        let wanted = orders.len().min(self.tracker.capacity() / RECORD_SIZE);
        if wanted == 0 {
            return 0;
        }
        let staged: Vec<[u8; RECORD_SIZE]> = orders[..wanted]
            .iter()
            .map(|order| {
                let mut record = [0u8; RECORD_SIZE];
                encode_into(order, &mut record);
                record
            })
            .collect();

        let _stamp = self.stamps.begin();
        let backoff = Backoff::new();
        for attempt in 0..self.config.max_attempts {
            let current = self.tracker.position_seq_cst();
            let fits = self.tracker.capacity().saturating_sub(current) / RECORD_SIZE;
            let count = wanted.min(fits);
            if count == 0 {
                return 0;
            }
            if self
                .tracker
                .compare_exchange(current, current + count * RECORD_SIZE)
                .is_ok()
            {
                let mut arena = self.arena.lock();
                for (i, record) in staged[..count].iter().enumerate() {
                    arena.write_record(current + i * RECORD_SIZE, record);
                }
                return count;
            }
            self.back_off(attempt, &backoff);
        }
        self.give_up("serialize_batch");
        0
    }

    fn deserialize_at(&self, offset: usize) -> Option<Order> {
        let backoff = Backoff::new();
        for _ in 0..self.config.read_retries {
            let Some(stamp) = self.stamps.quiescent() else {
                backoff.snooze();
                continue;
            };
            if !self.is_written(offset) {
                return None;
            }
            let bytes = self.arena.lock().read_record(offset)?;
            if self.stamps.unchanged_since(stamp) {
                return decode(&bytes, 0).ok();
            }
            backoff.snooze();
        }
        None
    }

    fn serialize_ring(&self, order: &Order) -> bool {
        if !self.tracker.has_room_after(0) {
            return false;
        }
        let mut staged = [0u8; RECORD_SIZE];
        encode_into(order, &mut staged);

        let _stamp = self.stamps.begin();
        let backoff = Backoff::new();
        for attempt in 0..self.config.max_attempts {
            let mut current = self.tracker.position_seq_cst();
            if !self.tracker.has_room_after(current) {
                if self.tracker.compare_exchange(current, 0).is_err() {
                    self.back_off(attempt, &backoff);
                    continue;
                }
                debug!("optimistic buffer wrapped");
                current = 0;
            }
            match self.tracker.try_reserve(current) {
                Ok(_) => {
                    self.copy_in(current, &staged);
                    return true;
                }
                Err(_) => self.back_off(attempt, &backoff),
            }
        }
        self.give_up("serialize_ring")
    }

    fn reset(&self) {
        let mut arena = self.arena.lock();
        self.tracker.reset();
        arena.clear();
        debug!("optimistic buffer reset");
    }

    fn force_reset(&self) {
        self.tracker.reset();
    }

    fn used_bytes(&self) -> usize {
        self.tracker.used()
    }

    fn capacity_bytes(&self) -> usize {
        self.tracker.capacity()
    }

    fn name(&self) -> &'static str {
        "optimistic"
    }

    fn description(&self) -> &'static str {
        "lock-free CAS offset reservation with version-stamped reads"
    }
}
