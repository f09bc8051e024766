//! Buffer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use dmem_proto::RECORD_SIZE;

/// Default buffer size (1 MiB = 16384 records).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Default number of independently locked segments.
pub const DEFAULT_SEGMENT_COUNT: usize = 16;

/// Configuration shared by every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Buffer capacity in bytes.
    pub capacity: usize,
    /// Segment count for the segmented strategy; each segment must hold
    /// at least one record.
    pub segment_count: usize,
    /// Retry tuning for the optimistic strategy.
    pub optimistic: OptimisticConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            segment_count: DEFAULT_SEGMENT_COUNT,
            optimistic: OptimisticConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Default configuration with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Builder-style segment count override.
    pub fn segments(mut self, segment_count: usize) -> Self {
        self.segment_count = segment_count;
        self
    }

    /// Capacity expressed in whole records.
    pub fn record_capacity(&self) -> usize {
        self.capacity / RECORD_SIZE
    }

    /// Check every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < RECORD_SIZE {
            return Err(ConfigError::CapacityTooSmall(self.capacity));
        }
        if self.segment_count == 0 {
            return Err(ConfigError::NoSegments);
        }
        if self.capacity / self.segment_count < RECORD_SIZE {
            return Err(ConfigError::SegmentTooSmall {
                capacity: self.capacity,
                segment_count: self.segment_count,
            });
        }
        self.optimistic.validate()
    }
}

/// Retry and backoff tuning for the CAS strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimisticConfig {
    /// Failed reservations retried with CPU spinning before sleeping.
    pub spin_retries: u32,
    /// Absolute ceiling on reservation attempts per write.
    pub max_attempts: u32,
    /// Read attempts before giving up on a record under write pressure.
    pub read_retries: u32,
    /// Sleep per attempt once spinning is exhausted (grows linearly).
    pub backoff_step_nanos: u64,
}

impl Default for OptimisticConfig {
    fn default() -> Self {
        Self {
            spin_retries: 10,
            max_attempts: 100,
            read_retries: 10,
            backoff_step_nanos: 1_000,
        }
    }
}

impl OptimisticConfig {
    /// Sleep duration for the given attempt number.
    #[inline]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_nanos(self.backoff_step_nanos.saturating_mul(u64::from(attempt)))
    }

    /// Check the retry budget is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::NoWriteAttempts);
        }
        if self.read_retries == 0 {
            return Err(ConfigError::NoReadAttempts);
        }
        Ok(())
    }
}
