//! # Pool Array
//!
//! Reference-counted, copy-on-write array backed by a [`MemoryPool`] slot.
//!
//! ## State machine
//!
//! ```text
//!            resize(n > 0)             clone / assign
//!   Empty ─────────────────▶ Owned(1) ───────────────▶ Shared(n)
//!     ▲                         ▲                          │
//!     │       resize(0)         │      first write (COW)   │
//!     └─────────────────────────┴──────────────────────────┘
//! ```

use std::sync::Arc;

use crate::error::{check_index, PoolArrayResult};
use crate::memory::record::Record;
use crate::memory::MemoryPool;
use crate::sync::{ReadGuard, WriteGuard};

/// A shared, copy-on-write array of `T`.
///
/// Cloning a `PoolArray` is **O(1)**: the clone shares the buffer and bumps
/// its refcount. The buffer is duplicated on the first mutating access
/// through either handle, never at clone time.
///
/// All element access goes through [`ReadGuard`] and [`WriteGuard`]. While
/// a guard is alive the array is *locked*: `resize` and the operations built
/// on it fail with [`Busy`](crate::PoolArrayError::Busy) instead of invalidating the
/// guard's view.
///
/// Out-of-range indices are fatal and panic.
///
/// # Example
///
/// ```rust
/// use pool_array::{MemoryPool, PoolArray};
///
/// let pool = MemoryPool::with_capacity(16);
///
/// let mut a: PoolArray<i32> = PoolArray::new(&pool);
/// a.resize(3).unwrap();
/// a.set(0, 10).unwrap();
///
/// let b = a.clone(); // shares the buffer
/// assert!(a.shares_buffer_with(&b));
///
/// a.set(1, 20).unwrap(); // copy-on-write happens here
/// assert!(!a.shares_buffer_with(&b));
/// assert_eq!(b.to_vec().unwrap(), [10, 0, 0]);
/// assert_eq!(a.to_vec().unwrap(), [10, 20, 0]);
/// ```
pub struct PoolArray<T> {
    pool: Arc<MemoryPool>,
    record: Option<Arc<Record<T>>>,
}

impl<T> PoolArray<T> {
    /// Creates an empty array drawing from `pool`.
    ///
    /// No slot is taken until the array first becomes non-empty.
    #[must_use]
    pub fn new(pool: &Arc<MemoryPool>) -> Self {
        Self {
            pool: Arc::clone(pool),
            record: None,
        }
    }

    /// Creates an array that owns `elements`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfCapacity`](crate::PoolArrayError::OutOfCapacity) if the pool has no free slot.
    pub fn from_vec(pool: &Arc<MemoryPool>, mut elements: Vec<T>) -> PoolArrayResult<Self> {
        if elements.is_empty() {
            return Ok(Self::new(pool));
        }

        elements.shrink_to_fit();

        Ok(Self {
            pool: Arc::clone(pool),
            record: Some(Arc::new(Record::new(pool, elements)?)),
        })
    }

    /// Returns the pool this array draws its slots from.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.record.as_ref().map_or(0, |record| record.len())
    }

    /// Returns `true` if the array has no elements (and holds no slot).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record.is_none()
    }

    /// Returns the size of the buffer in bytes.
    #[inline]
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.record.as_ref().map_or(0, |record| record.byte_size())
    }

    /// Returns how many arrays share this array's buffer (0 when empty).
    #[inline]
    #[must_use]
    pub fn refcount(&self) -> usize {
        self.record.as_ref().map_or(0, |record| record.refcount())
    }

    /// Returns `true` while any guard is alive on this array's buffer.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.record
            .as_ref()
            .is_some_and(|record| record.access_count() > 0)
    }

    /// Returns `true` if both arrays currently share one buffer.
    #[must_use]
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        match (&self.record, &other.record) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Makes this array share `other`'s buffer.
    ///
    /// This is reference sharing, not a deep copy. The array's previous
    /// buffer is released, and freed if this was its last array. Assigning
    /// from an array that already shares the buffer does nothing.
    pub fn assign(&mut self, other: &Self) {
        if self.shares_buffer_with(other) {
            return;
        }

        self.unreference();
        self.pool = Arc::clone(&other.pool);

        if let Some(record) = &other.record {
            record.add_ref();
            self.record = Some(Arc::clone(record));
        }
    }

    /// Takes a read guard over the elements.
    ///
    /// On an empty array this is a null guard.
    ///
    /// # Errors
    ///
    /// Returns [`Busy`](crate::PoolArrayError::Busy) if a write guard is alive on the
    /// buffer.
    pub fn read(&self) -> PoolArrayResult<ReadGuard<T>> {
        match &self.record {
            Some(record) => ReadGuard::acquire(record),
            None => Ok(ReadGuard::null()),
        }
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Busy`](crate::PoolArrayError::Busy) if a write guard is alive on the
    /// buffer.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[track_caller]
    pub fn get(&self, index: usize) -> PoolArrayResult<T>
    where
        T: Clone,
    {
        check_index(index, self.len());
        let read = self.read()?;
        Ok(read[index].clone())
    }

    /// Copies the elements into a `Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`Busy`](crate::PoolArrayError::Busy) if a write guard is alive on the
    /// buffer.
    pub fn to_vec(&self) -> PoolArrayResult<Vec<T>>
    where
        T: Clone,
    {
        Ok(self.read()?.to_vec())
    }

    /// Drops this array's reference to its buffer, leaving it empty.
    fn unreference(&mut self) {
        if let Some(record) = self.record.take() {
            // The record frees its elements and slot when its last `Arc`
            // (handle or guard) goes away.
            record.release_ref();
        }
    }
}

impl<T: Clone> PoolArray<T> {
    /// Creates an array holding a copy of `elements`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfCapacity`](crate::PoolArrayError::OutOfCapacity) if the pool has no free slot.
    pub fn from_slice(pool: &Arc<MemoryPool>, elements: &[T]) -> PoolArrayResult<Self> {
        Self::from_vec(pool, elements.to_vec())
    }

    /// Creates an array from an iterator.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfCapacity`](crate::PoolArrayError::OutOfCapacity) if the pool has no free slot.
    pub fn from_iter_in<I>(pool: &Arc<MemoryPool>, iter: I) -> PoolArrayResult<Self>
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_vec(pool, iter.into_iter().collect())
    }

    /// Takes a write guard over the elements.
    ///
    /// If the buffer is shared, it is duplicated first so this array is
    /// its sole owner. On an empty array this is a null guard.
    ///
    /// # Errors
    ///
    /// - [`Busy`](crate::PoolArrayError::Busy) if any guard is alive on the buffer.
    /// - [`OutOfCapacity`](crate::PoolArrayError::OutOfCapacity) if the duplicate needs a slot and
    ///   the pool has none.
    pub fn write(&mut self) -> PoolArrayResult<WriteGuard<T>> {
        self.copy_on_write()?;
        match &self.record {
            Some(record) => WriteGuard::acquire(record),
            None => Ok(WriteGuard::null()),
        }
    }

    /// Replaces the element at `index`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write`].
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[track_caller]
    pub fn set(&mut self, index: usize, value: T) -> PoolArrayResult<()> {
        check_index(index, self.len());
        let mut write = self.write()?;
        write[index] = value;
        Ok(())
    }

    /// Reverses the elements in place.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write`].
    pub fn invert(&mut self) -> PoolArrayResult<()> {
        self.write()?.reverse();
        Ok(())
    }

    /// Copies the inclusive range `from..=to` into a new array.
    ///
    /// Negative indices count from the end: `-1` is the last element.
    /// A range with `to < from` yields an empty array.
    ///
    /// # Errors
    ///
    /// - [`Busy`](crate::PoolArrayError::Busy) if a write guard is alive on the buffer.
    /// - [`OutOfCapacity`](crate::PoolArrayError::OutOfCapacity) if the pool has no free slot.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds after normalisation.
    #[track_caller]
    pub fn subarray(&self, from: isize, to: isize) -> PoolArrayResult<Self> {
        let len = self.len();
        let from = normalize_index(from, len);
        let to = normalize_index(to, len);

        if to < from {
            return Ok(Self::new(&self.pool));
        }

        let read = self.read()?;
        Self::from_slice(&self.pool, &read[from..=to])
    }

    /// Makes this array the sole owner of its buffer.
    ///
    /// Does nothing if the array is empty or already the sole owner.
    /// Otherwise takes a new slot, clones every element into it, and drops
    /// this array's reference to the shared buffer.
    fn copy_on_write(&mut self) -> PoolArrayResult<()> {
        let Some(record) = &self.record else {
            return Ok(());
        };

        record.ensure_idle()?;
        if record.refcount() == 1 {
            return Ok(());
        }

        let copy = Arc::new(record.duplicate()?);
        tracing::trace!(
            "copy-on-write: slot {} -> slot {} ({} bytes)",
            record.slot().index(),
            copy.slot().index(),
            copy.byte_size()
        );

        self.unreference();
        self.record = Some(copy);
        Ok(())
    }
}

impl<T: Clone + Default> PoolArray<T> {
    /// Changes the number of elements.
    ///
    /// - Empty array, `new_len == 0`: nothing to do.
    /// - Empty array, `new_len > 0`: takes a slot and fills it with
    ///   `T::default()`.
    /// - `new_len == 0`: releases the buffer; the array becomes empty.
    /// - Otherwise: copy-on-write, then grow (new tail elements are
    ///   `T::default()`) or shrink (trailing elements are dropped).
    ///
    /// # Errors
    ///
    /// - [`Busy`](crate::PoolArrayError::Busy) if any guard is alive on the buffer.
    /// - [`OutOfCapacity`](crate::PoolArrayError::OutOfCapacity) if a slot is needed and the pool
    ///   has none.
    pub fn resize(&mut self, new_len: usize) -> PoolArrayResult<()> {
        let Some(record) = &self.record else {
            if new_len == 0 {
                return Ok(());
            }

            let mut elements = Vec::with_capacity(new_len);
            elements.resize_with(new_len, T::default);
            self.record = Some(Arc::new(Record::new(&self.pool, elements)?));
            return Ok(());
        };

        // Can't resize while locked.
        record.ensure_idle()?;

        if new_len == 0 {
            self.unreference();
            return Ok(());
        }

        if record.len() == new_len {
            return Ok(());
        }

        self.copy_on_write()?;

        match &self.record {
            Some(record) => record.resize_with(new_len, T::default),
            None => Ok(()),
        }
    }

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resize`].
    pub fn push(&mut self, value: T) -> PoolArrayResult<()> {
        let len = self.len();
        self.resize(len + 1)?;

        let mut write = self.write()?;
        write[len] = value;
        Ok(())
    }

    /// Appends an element. Alias of [`Self::push`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::resize`].
    pub fn append(&mut self, value: T) -> PoolArrayResult<()> {
        self.push(value)
    }

    /// Inserts `value` at `index`, shifting later elements up.
    ///
    /// `index == len()` appends.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resize`].
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    #[track_caller]
    pub fn insert(&mut self, index: usize, value: T) -> PoolArrayResult<()> {
        let len = self.len();
        check_index(index, len + 1);

        self.resize(len + 1)?;
        let mut write = self.write()?;
        write[index..].rotate_right(1);
        write[index] = value;
        Ok(())
    }

    /// Removes the element at `index`, shifting later elements down.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resize`].
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[track_caller]
    pub fn remove(&mut self, index: usize) -> PoolArrayResult<()> {
        let len = self.len();
        check_index(index, len);

        // Shift through a unique, idle buffer so the resize below can't fail.
        {
            let mut write = self.write()?;
            write[index..].rotate_left(1);
        }
        self.resize(len - 1)
    }

    /// Appends copies of every element of `other`.
    ///
    /// # Errors
    ///
    /// - Same as [`Self::resize`].
    /// - [`Busy`](crate::PoolArrayError::Busy) if a write guard is alive on `other`.
    pub fn append_array(&mut self, other: &Self) -> PoolArrayResult<()> {
        let other_len = other.len();
        if other_len == 0 {
            return Ok(());
        }

        // Copy out first: `other` may share this buffer, and a failed read
        // must leave `self` untouched.
        let tail = other.to_vec()?;

        let len = self.len();
        self.resize(len + other_len)?;

        let mut write = self.write()?;
        write[len..].clone_from_slice(&tail);
        Ok(())
    }

    /// Replaces the contents with the items of `iter`.
    ///
    /// Resizes to the iterator's length, then copies element by element.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resize`].
    pub fn fill_with<I>(&mut self, iter: I) -> PoolArrayResult<()>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = iter.into_iter();
        self.resize(iter.len())?;

        let mut write = self.write()?;
        for (slot, value) in write.iter_mut().zip(iter) {
            *slot = value;
        }
        Ok(())
    }
}

impl<T: AsRef<str>> PoolArray<T> {
    /// Concatenates the elements, separated by `delimiter`.
    ///
    /// # Errors
    ///
    /// Returns [`Busy`](crate::PoolArrayError::Busy) if a write guard is alive on the
    /// buffer.
    pub fn join(&self, delimiter: &str) -> PoolArrayResult<String> {
        let read = self.read()?;

        let mut joined = String::new();
        for (i, element) in read.iter().enumerate() {
            if i > 0 {
                joined.push_str(delimiter);
            }
            joined.push_str(element.as_ref());
        }
        Ok(joined)
    }
}

impl<T> Clone for PoolArray<T> {
    /// Shares the buffer; no elements are copied.
    fn clone(&self) -> Self {
        if let Some(record) = &self.record {
            record.add_ref();
        }

        Self {
            pool: Arc::clone(&self.pool),
            record: self.record.clone(),
        }
    }
}

impl<T> Drop for PoolArray<T> {
    fn drop(&mut self) {
        self.unreference();
    }
}

impl<T> std::fmt::Debug for PoolArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolArray")
            .field("len", &self.len())
            .field("slot", &self.record.as_ref().map(|record| record.slot().index()))
            .field("refcount", &self.refcount())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Maps a possibly negative index onto `0..len`, panicking if it is out of
/// range.
#[track_caller]
fn normalize_index(index: isize, len: usize) -> usize {
    let normalized = if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        Some(index.unsigned_abs())
    };

    match normalized {
        Some(i) if i < len => i,
        _ => panic!("index out of bounds: the len is {len} but the index is {index}"),
    }
}
