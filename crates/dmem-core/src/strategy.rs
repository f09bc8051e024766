//! The shared buffer contract and the strategy selector.

use core::fmt;
use core::str::FromStr;

use crate::config::StoreConfig;
use crate::error::ConfigError;
use crate::position::utilisation;
use crate::{ExclusiveLockMemory, OptimisticMemory, ReadWriteMemory, SegmentedMemory};
use dmem_proto::{Order, RECORD_SIZE};

/// Fixed-capacity order buffer with a particular concurrency discipline.
///
/// Every implementation appends 64-byte records, reports a full buffer
/// as `false` rather than an error, and never hands out an offset whose
/// record is not completely written.
///
/// `reset` and `force_reset` are destructive and must not race with
/// in-flight writers; this is not enforced.
pub trait DirectMemoryStrategy: Send + Sync {
    /// Append one record.
    ///
    /// Returns `false` when there is no room (or, for the optimistic
    /// strategy, when contention outlasted the retry budget). A failed
    /// call writes nothing.
    fn serialize(&self, order: &Order) -> bool;

    /// Append records until the first failure; returns how many were written.
    fn serialize_batch(&self, orders: &[Order]) -> usize;

    /// Decode the record at an absolute byte offset.
    ///
    /// Returns `None` for offsets that are not (yet) written.
    fn deserialize_at(&self, offset: usize) -> Option<Order>;

    /// Append one record, wrapping to the start and overwriting old
    /// records when the buffer is full.
    fn serialize_ring(&self, order: &Order) -> bool;

    /// Rewind to empty and zero the buffer.
    fn reset(&self);

    /// Rewind to empty without touching the bytes.
    fn force_reset(&self);

    /// Bytes written.
    fn used_bytes(&self) -> usize;

    /// Total buffer size in bytes.
    fn capacity_bytes(&self) -> usize;

    /// Short identifier for reports.
    fn name(&self) -> &'static str;

    /// One-line description of the discipline.
    fn description(&self) -> &'static str;

    /// Bytes still free.
    fn remaining_bytes(&self) -> usize {
        self.capacity_bytes().saturating_sub(self.used_bytes())
    }

    /// Whole records that still fit.
    fn remaining_record_capacity(&self) -> usize {
        self.remaining_bytes() / RECORD_SIZE
    }

    /// Check utilisation is strictly above `threshold` (0.0 - 1.0).
    fn is_near_full(&self, threshold: f64) -> bool {
        utilisation(self.used_bytes(), self.capacity_bytes()) > threshold
    }

    /// Point-in-time usage snapshot.
    fn status(&self) -> BufferStatus {
        let used = self.used_bytes();
        let capacity = self.capacity_bytes();
        BufferStatus {
            used,
            remaining: capacity.saturating_sub(used),
            capacity,
        }
    }
}

/// Usage snapshot of one buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferStatus {
    pub used: usize,
    pub remaining: usize,
    pub capacity: usize,
}

impl BufferStatus {
    /// Fraction of capacity in use.
    pub fn utilisation(&self) -> f64 {
        utilisation(self.used, self.capacity)
    }

    /// Records written.
    pub fn records(&self) -> usize {
        self.used / RECORD_SIZE
    }
}

impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {:.1}KB/{:.1}KB ({:.1}%)",
            self.records(),
            self.used as f64 / 1024.0,
            self.capacity as f64 / 1024.0,
            self.utilisation() * 100.0,
        )
    }
}

/// Available concurrency disciplines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// One mutex around everything.
    Exclusive,
    /// Lock-free CAS reservation with version-stamped reads.
    Optimistic,
    /// Shared readers, exclusive writers.
    ReadWrite,
    /// Independently locked segments with round-robin writers.
    Segmented,
}

impl StrategyKind {
    /// Every strategy, in report order.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Exclusive,
        StrategyKind::Optimistic,
        StrategyKind::ReadWrite,
        StrategyKind::Segmented,
    ];

    /// Name accepted by `FromStr`.
    pub const fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Exclusive => "exclusive",
            StrategyKind::Optimistic => "optimistic",
            StrategyKind::ReadWrite => "read-write",
            StrategyKind::Segmented => "segmented",
        }
    }

    /// Build a strategy instance from a validated configuration.
    pub fn build(self, config: &StoreConfig) -> Result<Box<dyn DirectMemoryStrategy>, ConfigError> {
        config.validate()?;
        Ok(match self {
            StrategyKind::Exclusive => Box::new(ExclusiveLockMemory::new(config.capacity)),
            StrategyKind::Optimistic => Box::new(OptimisticMemory::with_config(
                config.capacity,
                config.optimistic.clone(),
            )),
            StrategyKind::ReadWrite => Box::new(ReadWriteMemory::new(config.capacity)),
            StrategyKind::Segmented => Box::new(SegmentedMemory::with_segments(
                config.capacity,
                config.segment_count,
            )),
        })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exclusive" | "mutex" | "synchronized" => Ok(StrategyKind::Exclusive),
            "optimistic" | "cas" => Ok(StrategyKind::Optimistic),
            "read-write" | "rw" | "rwlock" => Ok(StrategyKind::ReadWrite),
            "segmented" | "striped" => Ok(StrategyKind::Segmented),
            _ => Err(ConfigError::UnknownStrategy(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.to_string().parse::<StrategyKind>(), Ok(kind));
        }
        assert_eq!("CAS".parse::<StrategyKind>(), Ok(StrategyKind::Optimistic));
        assert_eq!(
            "ringbuffer".parse::<StrategyKind>(),
            Err(ConfigError::UnknownStrategy("ringbuffer".into()))
        );
    }

    #[test]
    fn test_build_validates_config() {
        let config = StoreConfig::with_capacity(32);
        for kind in StrategyKind::ALL {
            assert!(matches!(kind.build(&config), Err(ConfigError::CapacityTooSmall(32))));
        }
    }

    #[test]
    fn test_build_names() {
        let config = StoreConfig::with_capacity(1024);
        let names: Vec<_> = StrategyKind::ALL
            .iter()
            .map(|kind| kind.build(&config).unwrap().name())
            .collect();
        assert_eq!(names, ["exclusive", "optimistic", "read-write", "segmented"]);

        let mut descriptions: Vec<_> = StrategyKind::ALL
            .iter()
            .map(|kind| kind.build(&config).unwrap().description())
            .collect();
        assert!(descriptions.iter().all(|d| !d.is_empty()));
        descriptions.sort_unstable();
        descriptions.dedup();
        assert_eq!(descriptions.len(), StrategyKind::ALL.len());
    }

    #[test]
    fn test_status_display() {
        let status = BufferStatus { used: 512, remaining: 512, capacity: 1024 };
        assert_eq!(status.records(), 8);
        assert_eq!(status.to_string(), "8 records, 0.5KB/1.0KB (50.0%)");
    }
}
