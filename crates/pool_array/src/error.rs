//! # Pool Array Error Types
//!
//! All recoverable errors that can occur in the pool and its arrays.
//!
//! Index violations are not represented here: they panic, because no
//! meaningful recovery exists once a bounds invariant is broken.

use thiserror::Error;

/// Errors that can occur in the allocation pool and its arrays.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolArrayError {
    /// Every slot of the pool's fixed allocation table is in use.
    #[error("all {capacity} memory pool allocations are in use")]
    OutOfCapacity {
        /// Total number of slots in the pool.
        capacity: u32,
    },

    /// A structural change or guard acquisition hit an outstanding guard.
    #[error("array is locked by {guards} outstanding access guard(s), try again")]
    Busy {
        /// Number of guards alive on the record at the time of the failure.
        guards: usize,
    },

    /// The pool was torn down while arrays still referenced its slots.
    #[error("memory pool still has {in_use} live allocation(s)")]
    StillInUse {
        /// Number of slots still in use.
        in_use: u32,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for pool array operations.
pub type PoolArrayResult<T> = Result<T, PoolArrayError>;

/// Panics with an out-of-bounds message unless `index < len`.
#[inline]
#[track_caller]
pub(crate) fn check_index(index: usize, len: usize) {
    assert!(index < len, "index out of bounds: the len is {len} but the index is {index}");
}
