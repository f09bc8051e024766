//! Construction-time error types.
//!
//! Buffer operations themselves never fail with an error: a full buffer,
//! a lost race or an unwritten offset is reported through `bool`,
//! `usize` or `Option` return values.

use thiserror::Error;

use dmem_proto::RECORD_SIZE;

/// Invalid buffer configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Capacity cannot hold a single record.
    #[error("capacity {0} bytes is smaller than one {RECORD_SIZE}-byte record")]
    CapacityTooSmall(usize),
    /// Segmented buffer needs at least one segment.
    #[error("segment count must be at least 1")]
    NoSegments,
    /// Splitting the capacity leaves segments smaller than one record.
    #[error("{capacity} bytes over {segment_count} segments leaves less than one {RECORD_SIZE}-byte record per segment")]
    SegmentTooSmall { capacity: usize, segment_count: usize },
    /// Optimistic writer needs at least one reservation attempt.
    #[error("optimistic max_attempts must be at least 1")]
    NoWriteAttempts,
    /// Optimistic reader needs at least one read attempt.
    #[error("optimistic read_retries must be at least 1")]
    NoReadAttempts,
    /// Unrecognised strategy name.
    #[error("unknown strategy `{0}` (expected exclusive, optimistic, read-write or segmented)")]
    UnknownStrategy(String),
}
