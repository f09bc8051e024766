//! Behaviour every strategy must share.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use proptest::prelude::*;

use crate::{DirectMemoryStrategy, Order, OrderType, Side, StoreConfig, StrategyKind, RECORD_SIZE};

const CAPACITY: usize = 1024;
const SLOTS: usize = CAPACITY / RECORD_SIZE;

fn order(id: u32) -> Order {
    Order::new(id, format!("T{id}"), Side::Buy, OrderType::Limit, 100.0 + id as f64, 10, 1_700_000_000_000)
}

fn build_all(config: &StoreConfig) -> Vec<Box<dyn DirectMemoryStrategy>> {
    StrategyKind::ALL
        .iter()
        .map(|kind| kind.build(config).unwrap())
        .collect()
}

fn strategies() -> Vec<Box<dyn DirectMemoryStrategy>> {
    build_all(&StoreConfig::with_capacity(CAPACITY))
}

#[test]
fn test_basic_round_trip() {
    let original = Order::new(1, "AAPL", Side::Buy, OrderType::Limit, 150.25, 100, 1_700_000_000_000);
    for memory in strategies() {
        assert!(memory.serialize(&original), "{}", memory.name());
        assert_eq!(memory.deserialize_at(0), Some(original.clone()), "{}", memory.name());
    }
}

#[test]
fn test_sequential_orders_land_in_consecutive_slots() {
    for memory in strategies() {
        for id in 0..3 {
            assert!(memory.serialize(&order(id)));
        }
        for id in 0..3u32 {
            let read = memory.deserialize_at(id as usize * RECORD_SIZE);
            assert_eq!(read.map(|o| o.id), Some(id), "{}", memory.name());
        }
        assert_eq!(memory.used_bytes(), 192);
        assert_eq!(memory.remaining_record_capacity(), 13);
    }
}

#[test]
fn test_overflow_leaves_usage_unchanged() {
    for memory in strategies() {
        for id in 0..SLOTS as u32 {
            assert!(memory.serialize(&order(id)), "{} write {id}", memory.name());
        }
        assert_eq!(memory.used_bytes(), CAPACITY);
        assert!(!memory.serialize(&order(16)), "{}", memory.name());
        assert_eq!(memory.used_bytes(), CAPACITY);
        assert_eq!(memory.remaining_bytes(), 0);
    }
}

#[test]
fn test_ring_overwrites_oldest_slot() {
    for memory in strategies() {
        for id in 0..SLOTS as u32 {
            assert!(memory.serialize(&order(id)));
        }
        assert!(!memory.serialize(&order(16)));

        assert!(memory.serialize_ring(&order(999)), "{}", memory.name());
        assert_eq!(memory.deserialize_at(0).map(|o| o.id), Some(999), "{}", memory.name());
    }
}

#[test]
fn test_ring_before_full_appends() {
    for memory in strategies() {
        assert!(memory.serialize_ring(&order(1)));
        assert!(memory.serialize_ring(&order(2)));
        assert_eq!(memory.deserialize_at(0).map(|o| o.id), Some(1), "{}", memory.name());
        assert_eq!(memory.deserialize_at(64).map(|o| o.id), Some(2), "{}", memory.name());
    }
}

#[test]
fn test_reset_makes_everything_unreadable() {
    for memory in strategies() {
        for id in 0..5 {
            memory.serialize(&order(id));
        }
        memory.reset();

        assert_eq!(memory.used_bytes(), 0);
        assert_eq!(memory.remaining_record_capacity(), SLOTS);
        for slot in 0..5 {
            assert_eq!(memory.deserialize_at(slot * RECORD_SIZE), None, "{}", memory.name());
        }
    }
}

#[test]
fn test_force_reset_reuses_space() {
    for memory in strategies() {
        for id in 0..SLOTS as u32 {
            memory.serialize(&order(id));
        }
        memory.force_reset();

        assert_eq!(memory.used_bytes(), 0);
        assert_eq!(memory.deserialize_at(0), None);
        assert!(memory.serialize(&order(77)));
        assert_eq!(memory.deserialize_at(0).map(|o| o.id), Some(77), "{}", memory.name());
    }
}

#[test]
fn test_usage_queries() {
    for memory in strategies() {
        assert_eq!(memory.capacity_bytes(), CAPACITY);
        assert!(!memory.is_near_full(0.0));

        for id in 0..10 {
            memory.serialize(&order(id));
        }
        assert!(memory.is_near_full(0.5));
        assert!(!memory.is_near_full(0.75));

        for id in 10..13 {
            memory.serialize(&order(id));
        }
        assert!(memory.is_near_full(0.8), "{}", memory.name());
        assert_eq!(memory.remaining_record_capacity(), 3);
        assert_eq!(memory.status().records(), 13);
    }
}

#[test]
fn test_empty_symbol_survives() {
    let original = Order::new(5, "", Side::Sell, OrderType::Market, 0.0, 0, 0);
    for memory in strategies() {
        assert!(memory.serialize(&original));
        assert_eq!(memory.deserialize_at(0), Some(original.clone()), "{}", memory.name());
    }
}

#[test]
fn test_unwritten_offsets_are_not_found() {
    for memory in strategies() {
        assert_eq!(memory.deserialize_at(0), None);
        memory.serialize(&order(1));
        memory.serialize(&order(2));
        assert_eq!(memory.deserialize_at(1), None);
        assert_eq!(memory.deserialize_at(RECORD_SIZE / 2), None);
        assert_eq!(memory.deserialize_at(CAPACITY), None);
        assert_eq!(memory.deserialize_at(CAPACITY - 1), None);
        assert_eq!(memory.deserialize_at(usize::MAX - 8), None, "{}", memory.name());
    }
}

#[test]
fn test_batch_writes_what_fits() {
    // A single segment so the segmented batch can span the whole buffer
    let config = StoreConfig::with_capacity(CAPACITY).segments(1);
    let orders: Vec<_> = (0..20).map(order).collect();

    for memory in build_all(&config) {
        assert_eq!(memory.serialize_batch(&orders), SLOTS, "{}", memory.name());
        assert_eq!(memory.deserialize_at(15 * RECORD_SIZE).map(|o| o.id), Some(15));
        assert_eq!(memory.serialize_batch(&orders), 0);
        assert_eq!(memory.serialize_batch(&[]), 0);
    }
}

#[test]
fn test_concurrent_writers_allocate_disjoint_slots() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 4;
    let config = StoreConfig::with_capacity(2048).segments(16);

    for memory in build_all(&config) {
        let memory = memory.as_ref();
        thread::scope(|s| {
            for t in 0..THREADS {
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        assert!(memory.serialize(&order(t * PER_THREAD + i)), "{}", memory.name());
                    }
                });
            }
        });

        let total = (THREADS * PER_THREAD) as usize;
        assert_eq!(memory.used_bytes(), total * RECORD_SIZE);

        let mut ids: Vec<u32> = (0..total)
            .map(|slot| memory.deserialize_at(slot * RECORD_SIZE).expect("slot written").id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..total as u32).collect::<Vec<_>>(), "{}", memory.name());
    }
}

#[test]
fn test_concurrent_readers_see_written_records() {
    for memory in strategies() {
        let memory = memory.as_ref();
        for id in 0..SLOTS as u32 {
            memory.serialize(&order(id));
        }

        let hits = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for id in 0..SLOTS as u32 {
                        let read = memory.deserialize_at(id as usize * RECORD_SIZE);
                        assert_eq!(read, Some(order(id)), "{}", memory.name());
                        hits.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(hits.load(Ordering::Relaxed), 4 * SLOTS);
    }
}

/// Write until the buffer refuses; returns how many records fit.
fn fill(memory: &dyn DirectMemoryStrategy) -> usize {
    let mut written = 0;
    while memory.serialize(&order(written as u32)) {
        written += 1;
    }
    written
}

#[test]
fn test_uneven_splits_hold_every_record() {
    for (capacity, segments) in [(1024, 3), (1000, 3), (1000, 15), (4133, 7), (64, 1)] {
        let config = StoreConfig::with_capacity(capacity).segments(segments);
        let records = capacity / RECORD_SIZE;

        for memory in build_all(&config) {
            let name = memory.name();
            assert_eq!(memory.remaining_record_capacity(), records, "{name} {capacity}/{segments}");
            assert_eq!(fill(memory.as_ref()), records, "{name} {capacity}/{segments}");
            assert_eq!(memory.used_bytes(), records * RECORD_SIZE);
            assert_eq!(memory.remaining_bytes(), capacity - records * RECORD_SIZE);
            assert_eq!(memory.remaining_record_capacity(), 0);
            assert!(memory.serialize_ring(&order(999)), "{name} {capacity}/{segments}");
        }
    }
}

proptest! {
    #[test]
    fn prop_every_reported_record_is_writable(capacity in 64usize..8192, segments in 1usize..=32) {
        prop_assume!(capacity / segments >= RECORD_SIZE);
        let config = StoreConfig::with_capacity(capacity).segments(segments);

        for memory in build_all(&config) {
            let reported = memory.remaining_record_capacity();
            prop_assert_eq!(reported, capacity / RECORD_SIZE);
            prop_assert_eq!(fill(memory.as_ref()), reported, "{}", memory.name());
            prop_assert_eq!(memory.remaining_record_capacity(), 0);
        }
    }

    #[test]
    fn prop_usage_tracks_writes(k in 0usize..=SLOTS) {
        for memory in strategies() {
            for id in 0..k as u32 {
                prop_assert!(memory.serialize(&order(id)));
            }
            prop_assert_eq!(memory.used_bytes(), k * RECORD_SIZE);
            prop_assert_eq!(memory.remaining_record_capacity(), SLOTS - k);
        }
    }
}
