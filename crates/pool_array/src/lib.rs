//! # Pool Array
//!
//! Shared, reference-counted, copy-on-write arrays for bulk engine data:
//! - Pixel, vertex and audio buffers passed by value between subsystems
//! - **O(1)** clone: handles share one buffer until the first write
//! - Bounded registry: a fixed table of allocation slots, set up once
//!
//! ## Architecture
//!
//! ```text
//! Arc<MemoryPool> (slot table + free list + usage counters, one mutex)
//! └── Record<T>  (one per distinct buffer: refcount, busy counter, Vec<T>)
//!     ├── PoolArray<T> × refcount   (handles, cloned by reference)
//!     └── ReadGuard / WriteGuard    (scoped element access)
//! ```
//!
//! ## Rules
//!
//! 1. **Assignment shares, writing copies** - `clone()` never copies elements
//! 2. **Guards lock structure** - `resize` fails with `Busy` while a guard is alive
//! 3. **Bad indices are fatal** - out-of-range access panics
//!
//! ## Example
//!
//! ```rust
//! use pool_array::{MemoryPool, PoolArray, PoolConfig};
//!
//! let pool = MemoryPool::setup(PoolConfig::default());
//!
//! let mut a = PoolArray::from_slice(&pool, &[1, 2, 3]).unwrap();
//! let b = a.clone();
//!
//! let guard = a.read().unwrap();
//! assert!(a.resize(5).is_err()); // Busy: a guard is alive
//! drop(guard);
//!
//! a.resize(5).unwrap();
//! assert_eq!(a.len(), 5);
//! assert_eq!(b.len(), 3); // b kept the original buffer
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod array;
pub mod config;
pub mod error;
pub mod memory;
pub mod sync;

pub use array::{PoolArray, PoolByteArray, PoolIntArray, PoolRealArray, PoolStringArray};
pub use config::PoolConfig;
pub use error::{PoolArrayError, PoolArrayResult};
pub use memory::{MemoryPool, PoolStats, SlotId};
pub use sync::{ReadGuard, WriteGuard};
