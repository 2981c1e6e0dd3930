//! # Memory Pool
//!
//! Fixed table of allocation slots shared by every array drawing from it.
//!
//! A slot is the registry entry for one distinct buffer. Arrays that share
//! a buffer share its slot, so the table bounds the number of distinct live
//! buffers, not the number of handles.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::{PoolArrayError, PoolArrayResult};

/// Identifies one slot of a [`MemoryPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    /// Index into the slot table.
    index: u32,
}

impl SlotId {
    /// Returns the slot's index in the table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

/// Snapshot of pool usage counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of slots.
    pub capacity: u32,
    /// Slots currently backing a buffer.
    pub slots_in_use: u32,
    /// Bytes held by all live buffers.
    pub bytes_in_use: usize,
    /// Highest value `bytes_in_use` has reached.
    pub peak_bytes: usize,
}

/// One entry of the slot table.
#[derive(Clone, Copy, Debug, Default)]
struct SlotEntry {
    /// Next free slot while this one is on the free list.
    next_free: Option<u32>,
    /// Whether a record currently owns this slot.
    in_use: bool,
    /// Byte size of the buffer the owning record holds.
    byte_size: usize,
}

/// Everything guarded by the pool mutex.
#[derive(Debug)]
struct PoolState {
    slots: Box<[SlotEntry]>,
    free_head: Option<u32>,
    slots_in_use: u32,
    bytes_in_use: usize,
    peak_bytes: usize,
}

/// Registry of reusable allocation slots with an intrusive free list.
///
/// Acquire and release are **O(1)** and never allocate: the table is
/// built once by [`MemoryPool::setup`]. A single mutex serialises the free
/// list and the usage counters; it is the only mutual-exclusion point shared
/// by all arrays.
///
/// # Example
///
/// ```rust
/// use pool_array::{MemoryPool, PoolArray, PoolConfig};
///
/// let pool = MemoryPool::setup(PoolConfig::with_capacity(16));
/// let mut pixels: PoolArray<u8> = PoolArray::new(&pool);
/// pixels.resize(64).unwrap();
/// assert_eq!(pool.slots_in_use(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryPool {
    capacity: u32,
    state: Mutex<PoolState>,
}

impl MemoryPool {
    /// Creates a pool with its full slot table pre-allocated.
    ///
    /// # Panics
    ///
    /// Panics if the configured capacity is zero.
    #[must_use]
    pub fn setup(config: PoolConfig) -> Arc<Self> {
        let capacity = config.capacity;
        assert!(capacity > 0, "Capacity must be greater than zero");

        // Chain every slot into the free list, lowest index first.
        let slots: Box<[SlotEntry]> = (0..capacity)
            .map(|index| SlotEntry {
                next_free: index.checked_add(1).filter(|next| *next < capacity),
                in_use: false,
                byte_size: 0,
            })
            .collect();

        tracing::debug!("memory pool set up with {} allocation slots", capacity);

        Arc::new(Self {
            capacity,
            state: Mutex::new(PoolState {
                slots,
                free_head: Some(0),
                slots_in_use: 0,
                bytes_in_use: 0,
                peak_bytes: 0,
            }),
        })
    }

    /// Creates a pool with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Arc<Self> {
        Self::setup(PoolConfig::with_capacity(capacity))
    }

    /// Returns the total number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of slots currently backing a buffer.
    #[must_use]
    pub fn slots_in_use(&self) -> u32 {
        self.state.lock().slots_in_use
    }

    /// Returns the number of free slots.
    #[must_use]
    pub fn free_slots(&self) -> u32 {
        self.capacity - self.slots_in_use()
    }

    /// Returns a snapshot of the usage counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.capacity,
            slots_in_use: state.slots_in_use,
            bytes_in_use: state.bytes_in_use,
            peak_bytes: state.peak_bytes,
        }
    }

    /// Takes a slot off the free list.
    ///
    /// # Errors
    ///
    /// Returns [`PoolArrayError::OutOfCapacity`] if every slot is in use.
    pub fn acquire(&self) -> PoolArrayResult<SlotId> {
        let mut state = self.state.lock();

        let Some(index) = state.free_head else {
            drop(state);
            tracing::warn!(
                "all {} memory pool allocations are in use, can't allocate",
                self.capacity
            );
            return Err(PoolArrayError::OutOfCapacity {
                capacity: self.capacity,
            });
        };

        let entry = &mut state.slots[index as usize];
        let next_free = entry.next_free.take();
        entry.in_use = true;
        entry.byte_size = 0;

        state.free_head = next_free;
        state.slots_in_use += 1;

        Ok(SlotId { index })
    }

    /// Pushes a slot back onto the free list.
    ///
    /// The caller must already have dropped the slot's buffer; any bytes
    /// still recorded against the slot are removed from the usage counters.
    ///
    /// # Panics
    ///
    /// Panics if the slot does not belong to this pool or is not in use.
    pub fn release(&self, slot: SlotId) {
        let mut state = self.state.lock();
        let free_head = state.free_head;

        let entry = state
            .slots
            .get_mut(slot.index as usize)
            .unwrap_or_else(|| panic!("slot {} does not belong to this pool", slot.index));
        assert!(entry.in_use, "slot {} released twice", slot.index);

        let byte_size = entry.byte_size;
        entry.in_use = false;
        entry.byte_size = 0;
        entry.next_free = free_head;

        state.free_head = Some(slot.index);
        state.slots_in_use -= 1;
        state.bytes_in_use -= byte_size;
    }

    /// Records a change in the byte size of the buffer owned by `slot`.
    pub(crate) fn track_resize(&self, slot: SlotId, old_bytes: usize, new_bytes: usize) {
        let mut state = self.state.lock();

        if let Some(entry) = state.slots.get_mut(slot.index as usize) {
            debug_assert!(entry.in_use, "resizing a free slot");
            debug_assert_eq!(entry.byte_size, old_bytes);
            entry.byte_size = new_bytes;
        }

        state.bytes_in_use = state.bytes_in_use - old_bytes + new_bytes;
        state.peak_bytes = state.peak_bytes.max(state.bytes_in_use);
    }

    /// Tears the pool down.
    ///
    /// # Errors
    ///
    /// Returns [`PoolArrayError::StillInUse`] if any array still holds a
    /// slot. The pool stays alive in that case: the arrays keep their own
    /// reference to it.
    pub fn cleanup(self: Arc<Self>) -> PoolArrayResult<()> {
        let in_use = self.slots_in_use();
        if in_use > 0 {
            tracing::warn!("memory pool cleanup with {} live allocation(s)", in_use);
            return Err(PoolArrayError::StillInUse { in_use });
        }

        tracing::debug!(
            "memory pool cleaned up (peak usage {} bytes)",
            self.stats().peak_bytes
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_acquire_release() {
        let pool = MemoryPool::with_capacity(4);

        let slot = pool.acquire().unwrap();
        assert_eq!(pool.slots_in_use(), 1);
        assert_eq!(pool.free_slots(), 3);

        pool.release(slot);
        assert_eq!(pool.slots_in_use(), 0);
        assert_eq!(pool.free_slots(), 4);
    }

    #[test]
    fn test_pool_full() {
        let pool = MemoryPool::with_capacity(2);

        let _ = pool.acquire().unwrap();
        let _ = pool.acquire().unwrap();
        assert_eq!(
            pool.acquire(),
            Err(PoolArrayError::OutOfCapacity { capacity: 2 })
        );
    }

    #[test]
    fn test_pool_reuse() {
        let pool = MemoryPool::with_capacity(1);

        let s1 = pool.acquire().unwrap();
        pool.release(s1);

        let s2 = pool.acquire().unwrap();
        assert_eq!(s1, s2); // Same slot reused
    }

    #[test]
    fn test_pool_free_list_is_lifo() {
        let pool = MemoryPool::with_capacity(3);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.acquire().unwrap(), b);
        assert_eq!(pool.acquire().unwrap(), a);
        assert_eq!(pool.acquire().unwrap().index(), 2);
    }

    #[test]
    fn test_pool_byte_tracking() {
        let pool = MemoryPool::with_capacity(2);

        let slot = pool.acquire().unwrap();
        pool.track_resize(slot, 0, 100);
        pool.track_resize(slot, 100, 40);

        let stats = pool.stats();
        assert_eq!(stats.bytes_in_use, 40);
        assert_eq!(stats.peak_bytes, 100);

        pool.release(slot);
        let stats = pool.stats();
        assert_eq!(stats.bytes_in_use, 0);
        assert_eq!(stats.peak_bytes, 100);
    }

    #[test]
    #[should_panic(expected = "released twice")]
    fn test_pool_double_release_panics() {
        let pool = MemoryPool::with_capacity(1);

        let slot = pool.acquire().unwrap();
        pool.release(slot);
        pool.release(slot);
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than zero")]
    fn test_pool_zero_capacity_panics() {
        let _ = MemoryPool::with_capacity(0);
    }

    #[test]
    fn test_pool_cleanup() {
        let pool = MemoryPool::with_capacity(2);
        let slot = pool.acquire().unwrap();

        assert_eq!(
            Arc::clone(&pool).cleanup(),
            Err(PoolArrayError::StillInUse { in_use: 1 })
        );

        pool.release(slot);
        assert_eq!(pool.cleanup(), Ok(()));
    }
}
