//! # Allocation Record
//!
//! The typed buffer behind one pool slot, plus its sharing counters.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{RawRwLock, RwLock};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};

use super::pool::{MemoryPool, SlotId};
use crate::error::{PoolArrayError, PoolArrayResult};

/// One shared buffer.
///
/// - `refcount` counts the [`PoolArray`](crate::PoolArray) handles sharing
///   the buffer. Copy-on-write keys off it.
/// - `access_count` counts live guards. Structural changes refuse to run
///   while it is non-zero.
///
/// Guards keep their own `Arc` to the record, so the record (and its slot)
/// lives until the last handle *and* the last guard are gone.
pub(crate) struct Record<T> {
    pool: Arc<MemoryPool>,
    slot: SlotId,
    refcount: AtomicUsize,
    access_count: AtomicUsize,
    /// Element count, readable without taking the element lock.
    len: AtomicUsize,
    elements: Arc<RwLock<Vec<T>>>,
}

impl<T> Record<T> {
    /// Takes a slot from `pool` and moves `elements` into it.
    ///
    /// The new record has a refcount of one.
    pub(crate) fn new(pool: &Arc<MemoryPool>, elements: Vec<T>) -> PoolArrayResult<Self> {
        let slot = pool.acquire()?;
        let len = elements.len();
        pool.track_resize(slot, 0, byte_size_of::<T>(len));

        Ok(Self {
            pool: Arc::clone(pool),
            slot,
            refcount: AtomicUsize::new(1),
            access_count: AtomicUsize::new(0),
            len: AtomicUsize::new(len),
            elements: Arc::new(RwLock::new(elements)),
        })
    }

    #[inline]
    pub(crate) fn slot(&self) -> SlotId {
        self.slot
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn byte_size(&self) -> usize {
        byte_size_of::<T>(self.len())
    }

    #[inline]
    pub(crate) fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn access_count(&self) -> usize {
        self.access_count.load(Ordering::Acquire)
    }

    /// Registers one more handle sharing this record.
    #[inline]
    pub(crate) fn add_ref(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Unregisters a handle. Returns `true` if it was the last one.
    #[inline]
    pub(crate) fn release_ref(&self) -> bool {
        let previous = self.refcount.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "record refcount underflow");
        previous == 1
    }

    /// Fails with `Busy` while any guard is alive on this record.
    #[inline]
    pub(crate) fn ensure_idle(&self) -> PoolArrayResult<()> {
        match self.access_count() {
            0 => Ok(()),
            guards => Err(PoolArrayError::Busy { guards }),
        }
    }

    /// Shared element lock for a read guard.
    ///
    /// Fails with `Busy` if a write guard holds the elements.
    pub(crate) fn lock_read(&self) -> PoolArrayResult<ArcRwLockReadGuard<RawRwLock, Vec<T>>> {
        let elements = self.elements.try_read_arc().ok_or_else(|| self.busy())?;
        self.access_count.fetch_add(1, Ordering::AcqRel);
        Ok(elements)
    }

    /// Another shared element lock for a cloned read guard.
    ///
    /// The caller already holds a read lock, so the recursive read cannot
    /// be refused even with a writer waiting.
    pub(crate) fn relock_read(&self) -> ArcRwLockReadGuard<RawRwLock, Vec<T>> {
        let elements = self.elements.read_arc_recursive();
        self.access_count.fetch_add(1, Ordering::AcqRel);
        elements
    }

    /// Exclusive element lock for a write guard.
    ///
    /// Fails with `Busy` if any other guard holds the elements.
    pub(crate) fn lock_write(&self) -> PoolArrayResult<ArcRwLockWriteGuard<RawRwLock, Vec<T>>> {
        let elements = self.elements.try_write_arc().ok_or_else(|| self.busy())?;
        self.access_count.fetch_add(1, Ordering::AcqRel);
        Ok(elements)
    }

    /// Called by a guard as it is dropped.
    #[inline]
    pub(crate) fn end_access(&self) {
        let previous = self.access_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "record access count underflow");
    }

    /// Clones every element into a fresh record from the same pool.
    ///
    /// The source is only read; it stays valid for the other handles.
    pub(crate) fn duplicate(&self) -> PoolArrayResult<Self>
    where
        T: Clone,
    {
        let copy = {
            let elements = self.elements.try_read().ok_or_else(|| self.busy())?;
            elements.to_vec()
        };
        Self::new(&self.pool, copy)
    }

    /// Changes the element count.
    ///
    /// Growing reserves exactly the new size and fills the tail with
    /// `fill`; shrinking drops the trailing elements and gives the
    /// surplus memory back. The caller must be the only handle.
    pub(crate) fn resize_with<F>(&self, new_len: usize, fill: F) -> PoolArrayResult<()>
    where
        F: FnMut() -> T,
    {
        debug_assert_eq!(self.refcount(), 1, "resizing a shared record");
        self.ensure_idle()?;

        let mut elements = self.elements.try_write().ok_or_else(|| self.busy())?;
        let old_len = elements.len();

        if new_len > old_len {
            elements.reserve_exact(new_len - old_len);
            elements.resize_with(new_len, fill);
        } else {
            elements.truncate(new_len);
            elements.shrink_to_fit();
        }

        self.len.store(new_len, Ordering::Release);
        self.pool
            .track_resize(self.slot, byte_size_of::<T>(old_len), byte_size_of::<T>(new_len));
        Ok(())
    }

    fn busy(&self) -> PoolArrayError {
        PoolArrayError::Busy {
            guards: self.access_count(),
        }
    }
}

impl<T> Drop for Record<T> {
    fn drop(&mut self) {
        // Drop the elements before the slot goes back on the free list.
        let byte_size = self.byte_size();
        self.elements.write().clear();
        self.pool.track_resize(self.slot, byte_size, 0);
        self.pool.release(self.slot);
    }
}

impl<T> std::fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("slot", &self.slot.index())
            .field("len", &self.len())
            .field("refcount", &self.refcount())
            .field("access_count", &self.access_count())
            .finish_non_exhaustive()
    }
}

#[inline]
fn byte_size_of<T>(len: usize) -> usize {
    len * mem::size_of::<T>()
}
