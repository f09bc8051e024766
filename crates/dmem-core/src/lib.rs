//! # dmem Core
//!
//! Fixed-capacity, append-only order buffers shared between threads.
//!
//! Four strategies implement the same [`DirectMemoryStrategy`] contract
//! and differ only in how they coordinate concurrent access:
//! - [`ExclusiveLockMemory`]: one mutex around everything
//! - [`OptimisticMemory`]: CAS offset reservation, version-stamped reads
//! - [`ReadWriteMemory`]: shared readers, exclusive writers
//! - [`SegmentedMemory`]: independently locked segments
//!
//! ## Design Principles
//! - 64-byte records, never torn, never exposed before fully written
//! - A full buffer is a `false`, not an error
//! - No allocation on the single-record write path

pub mod arena;
pub mod config;
pub mod error;
pub mod position;
pub mod strategy;

pub mod exclusive;
pub mod optimistic;
pub mod read_write;
pub mod segmented;

#[cfg(test)]
mod tests;

pub use arena::Arena;
pub use config::{OptimisticConfig, StoreConfig, DEFAULT_CAPACITY, DEFAULT_SEGMENT_COUNT};
pub use error::ConfigError;
pub use position::PositionTracker;
pub use strategy::{BufferStatus, DirectMemoryStrategy, StrategyKind};

pub use exclusive::ExclusiveLockMemory;
pub use optimistic::OptimisticMemory;
pub use read_write::ReadWriteMemory;
pub use segmented::SegmentedMemory;

pub use dmem_proto::{Order, OrderType, Side, RECORD_SIZE};
