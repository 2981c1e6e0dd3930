//! # Synchronization for Shared Arrays
//!
//! ## The Problem
//!
//! ```text
//! Handle A, Handle B ──share──▶ one buffer
//!
//! Resize while someone holds a pointer:  DANGLING → CRASH
//! Write while the buffer is shared:      B SEES A'S CHANGES
//! ```
//!
//! ## The Solution: Guards + Busy Counter
//!
//! Every element access goes through a guard. Guards count themselves on
//! the buffer's record; structural changes refuse to run while the count is
//! non-zero. Write guards split shared buffers before handing out `&mut`.

mod access;

pub use access::{ReadGuard, WriteGuard};
