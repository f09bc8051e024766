//! Segmented (lock-striped) strategy.
//!
//! The buffer is split into N equal, record-aligned segments (the last
//! absorbs the remainder), each with its own lock and local offset. Writers start at
//! a round-robin segment and probe onward, so concurrent writers mostly
//! land on different locks. Readers map an absolute offset to its owning
//! segment and lock only that one.
//!
//! Offsets handed back by reads are absolute, so records are not laid out
//! in write order: with 16 segments the second write lands at the start of
//! segment 1, not at offset 64 of segment 0.

use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use tracing::debug;

use crate::arena::Arena;
use crate::config::DEFAULT_SEGMENT_COUNT;
use crate::position::PositionTracker;
use crate::strategy::{BufferStatus, DirectMemoryStrategy};
use dmem_proto::{decode, encode_into, Order, RECORD_SIZE};

/// Outcome of a non-blocking append attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Append {
    Written,
    Full,
    Busy,
}

/// One independently locked sub-range `[start, start + size)`.
struct Segment {
    start: usize,
    /// Local offsets; mutated only while `arena` is locked.
    tracker: PositionTracker,
    arena: Mutex<Arena>,
}

impl Segment {
    fn new(start: usize, size: usize) -> Self {
        Self {
            start,
            tracker: PositionTracker::new(size),
            arena: Mutex::new(Arena::new(size)),
        }
    }

    #[inline(always)]
    fn size(&self) -> usize {
        self.tracker.capacity()
    }

    #[inline(always)]
    fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset - self.start < self.size()
    }

    #[inline(always)]
    fn can_hold_record(&self) -> bool {
        self.tracker.has_room_after(0)
    }

    /// Append at the local offset; caller holds the lock.
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

    #[inline]
    fn try_append(&self, staged: &[u8; RECORD_SIZE]) -> Append {
        // Unlocked peek: a full segment is not worth contending for
        if !self.tracker.has_room_after(self.tracker.position()) {
            return Append::Full;
        }
        match self.arena.try_lock() {
            Some(mut arena) => {
                if self.append_locked(&mut arena, staged) {
                    Append::Written
                } else {
                    Append::Full
                }
            }
            None => Append::Busy,
        }
    }

    #[inline]
    fn append(&self, staged: &[u8; RECORD_SIZE]) -> bool {
        let mut arena = self.arena.lock();
        self.append_locked(&mut arena, staged)
    }

    fn read(&self, offset: usize) -> Option<[u8; RECORD_SIZE]> {
        let local = offset - self.start;
        let arena = self.arena.lock();
        if !self.tracker.is_written(local) {
            return None;
        }
        arena.read_record(local)
    }

    fn status(&self) -> BufferStatus {
        BufferStatus {
            used: self.tracker.used(),
            remaining: self.tracker.remaining(),
            capacity: self.size(),
        }
    }
}

/// Lock-striped record buffer.
pub struct SegmentedMemory {
    segments: Box<[Segment]>,
    capacity: usize,
    /// Picks the first segment each write probes.
    write_counter: CachePadded<AtomicUsize>,
    /// Next segment to recycle once every segment is full (ring mode).
    recycle_cursor: CachePadded<AtomicUsize>,
}

impl SegmentedMemory {
    /// Create a buffer of `capacity` bytes with the default 16 segments.
    pub fn new(capacity: usize) -> Self {
        Self::with_segments(capacity, DEFAULT_SEGMENT_COUNT)
    }

    /// Create a buffer of `capacity` bytes split into `segment_count` segments.
    ///
    /// Segment sizes are whole records; the last segment absorbs the
    /// remainder, so the segments together hold `capacity / 64` records.
    ///
    /// # Panics
    /// Panics if `segment_count` is zero.
    pub fn with_segments(capacity: usize, segment_count: usize) -> Self {
        assert!(segment_count > 0, "Segment count must be at least 1");

        let segment_size = capacity / segment_count / RECORD_SIZE * RECORD_SIZE;
        let segments: Box<[Segment]> = (0..segment_count)
            .map(|i| {
                let start = i * segment_size;
                let size = if i == segment_count - 1 {
                    capacity - start
                } else {
                    segment_size
                };
                Segment::new(start, size)
            })
            .collect();

        debug!(capacity, segment_count, segment_size, "segmented buffer created");
        Self {
            segments,
            capacity,
            write_counter: CachePadded::new(AtomicUsize::new(0)),
            recycle_cursor: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Per-segment usage, in segment order.
    pub fn segment_status(&self) -> Vec<BufferStatus> {
        self.segments.iter().map(Segment::status).collect()
    }

    /// Owning segment of an absolute offset (linear scan, fine at N≈16).
    #[inline]
    fn segment_for(&self, offset: usize) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.contains(offset))
    }

    /// Round-robin placement of one staged record.
    ///
    /// Probes every segment without blocking first; only if some segment
    /// was busy (rather than full) does it go round again taking locks.
    fn place(&self, staged: &[u8; RECORD_SIZE]) -> bool {
        let n = self.segments.len();
        let first = self.write_counter.fetch_add(1, Ordering::Relaxed) % n;

        let mut contended = false;
        for i in 0..n {
            match self.segments[(first + i) % n].try_append(staged) {
                Append::Written => return true,
                Append::Busy => contended = true,
                Append::Full => {}
            }
        }

        contended && (0..n).any(|i| self.segments[(first + i) % n].append(staged))
    }

    /// Segment for a batch: the first with room for all of it, else the
    /// one with the most room.
    fn segment_for_batch(&self, required: usize) -> Option<&Segment> {
        let mut best: Option<&Segment> = None;
        let mut best_room = 0;
        for segment in self.segments.iter() {
            let room = segment.tracker.remaining();
            if room >= required {
                return Some(segment);
            }
            if room > best_room {
                best_room = room;
                best = Some(segment);
            }
        }
        best.filter(|_| best_room >= RECORD_SIZE)
    }
}

impl DirectMemoryStrategy for SegmentedMemory {
    fn serialize(&self, order: &Order) -> bool {
        let mut staged = [0u8; RECORD_SIZE];
        encode_into(order, &mut staged);
        self.place(&staged)
    }

    /// Writes the whole batch into a single segment so it stays contiguous;
    /// stops when that segment fills.
    fn serialize_batch(&self, orders: &[Order]) -> usize {
        if orders.is_empty() {
            return 0;
        }
        let required = orders.len().saturating_mul(RECORD_SIZE);
        let Some(segment) = self.segment_for_batch(required) else {
            return 0;
        };

        let mut staged = [0u8; RECORD_SIZE];
        let mut arena = segment.arena.lock();
        let mut written = 0;
        for order in orders {
            encode_into(order, &mut staged);
            if !segment.append_locked(&mut arena, &staged) {
                break;
            }
            written += 1;
        }
        written
    }

    fn deserialize_at(&self, offset: usize) -> Option<Order> {
        let bytes = self.segment_for(offset)?.read(offset)?;
        decode(&bytes, 0).ok()
    }

    /// Falls back to recycling whole segments in index order once every
    /// segment is full; only the recycled segment's offset is rewound.
    fn serialize_ring(&self, order: &Order) -> bool {
        let mut staged = [0u8; RECORD_SIZE];
        encode_into(order, &mut staged);
        if self.place(&staged) {
            return true;
        }

        let n = self.segments.len();
        for _ in 0..n {
            let victim = &self.segments[self.recycle_cursor.fetch_add(1, Ordering::Relaxed) % n];
            if !victim.can_hold_record() {
                continue;
            }
            let mut arena = victim.arena.lock();
            if !victim.tracker.has_room_after(victim.tracker.position()) {
                debug!(segment_start = victim.start, "segment recycled");
                victim.tracker.reset();
            }
            return victim.append_locked(&mut arena, &staged);
        }
        false
    }

    fn reset(&self) {
        for segment in self.segments.iter() {
            let mut arena = segment.arena.lock();
            segment.tracker.reset();
            arena.clear();
        }
        debug!("segmented buffer reset");
    }

    fn force_reset(&self) {
        for segment in self.segments.iter() {
            let _arena = segment.arena.lock();
            segment.tracker.reset();
        }
    }

    fn used_bytes(&self) -> usize {
        self.segments.iter().map(|segment| segment.tracker.used()).sum()
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }

    fn name(&self) -> &'static str {
        "segmented"
    }

    fn description(&self) -> &'static str {
        "independently locked segments with round-robin writers"
    }
}
