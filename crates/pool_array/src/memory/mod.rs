//! # Memory Management
//!
//! The allocation registry behind every pool array.
//!
//! ## Design Philosophy
//!
//! The slot table is allocated once at startup. During gameplay:
//! - Acquiring or releasing a slot is O(1) and allocation-free
//! - The number of distinct live buffers has a fixed ceiling
//! - Running out of slots is a deterministic, recoverable error

mod pool;
pub(crate) mod record;

pub use pool::{MemoryPool, PoolStats, SlotId};
