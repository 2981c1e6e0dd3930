//! # Pool Arrays
//!
//! The shared copy-on-write array and its common element types.

mod pool_array;

pub use pool_array::PoolArray;

/// Raw bytes: pixel data, file contents, network payloads.
pub type PoolByteArray = PoolArray<u8>;

/// 32-bit integers: indices, ids.
pub type PoolIntArray = PoolArray<i32>;

/// 32-bit floats: vertex attributes, audio samples.
pub type PoolRealArray = PoolArray<f32>;

/// Owned strings.
pub type PoolStringArray = PoolArray<String>;
