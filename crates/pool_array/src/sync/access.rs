//! # Access Guards
//!
//! Scoped read and write access to the elements of a pool array.
//!
//! ```text
//!   PoolArray ──read()──▶ ReadGuard  ──┐
//!       │                              ├──▶ Record (access_count += 1)
//!       └──write()──▶ copy_on_write ─▶ WriteGuard ┘
//! ```
//!
//! Both guard kinds bump the record's busy counter while alive, which is
//! what makes `resize` on the same array fail with `Busy`. Element access
//! itself sits behind a reader/writer lock: read guards share, a write
//! guard is exclusive, and a guard that cannot get its lock fails at once.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::error::PoolArrayResult;
use crate::memory::record::Record;

/// Shared, read-only access to a pool array's elements.
///
/// Multiple read guards can exist at once. A guard taken on an empty
/// array is a null guard: it derefs to an empty slice and counts nothing.
///
/// ## Usage
///
/// ```rust
/// use pool_array::{MemoryPool, PoolArray};
///
/// let pool = MemoryPool::with_capacity(8);
/// let samples = PoolArray::from_slice(&pool, &[0.25f32, 0.5, 0.75]).unwrap();
///
/// let read = samples.read().unwrap();
/// let peak = read.iter().copied().fold(0.0, f32::max);
/// assert!(samples.is_locked());
/// drop(read);
///
/// assert!((peak - 0.75).abs() < f32::EPSILON);
/// assert!(!samples.is_locked());
/// ```
pub struct ReadGuard<T> {
    access: Option<ReadAccess<T>>,
}

struct ReadAccess<T> {
    elements: ArcRwLockReadGuard<RawRwLock, Vec<T>>,
    record: Arc<Record<T>>,
}

impl<T> ReadGuard<T> {
    pub(crate) fn null() -> Self {
        Self { access: None }
    }

    pub(crate) fn acquire(record: &Arc<Record<T>>) -> PoolArrayResult<Self> {
        let elements = record.lock_read()?;
        Ok(Self {
            access: Some(ReadAccess {
                elements,
                record: Arc::clone(record),
            }),
        })
    }

    /// Returns whether this guard was taken on an empty array.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.access.is_none()
    }

    /// Returns the elements as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match &self.access {
            Some(access) => access.elements.as_slice(),
            None => &[],
        }
    }
}

impl<T: Pod> ReadGuard<T> {
    /// Returns the elements as raw bytes, e.g. for a GPU upload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }
}

impl<T> Deref for ReadGuard<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> Drop for ReadGuard<T> {
    fn drop(&mut self) {
        if let Some(access) = &self.access {
            access.record.end_access();
        }
    }
}

impl<T> Clone for ReadGuard<T> {
    /// Takes one more shared lock on the same buffer.
    fn clone(&self) -> Self {
        Self {
            access: self.access.as_ref().map(|access| ReadAccess {
                elements: access.record.relock_read(),
                record: Arc::clone(&access.record),
            }),
        }
    }
}

impl<T> std::fmt::Debug for ReadGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadGuard")
            .field("len", &self.as_slice().len())
            .field("null", &self.is_null())
            .finish()
    }
}

/// Exclusive, mutable access to a pool array's elements.
///
/// Taking a write guard first makes the array the sole owner of its
/// buffer (copy-on-write), so sharing is broken before the first byte is
/// mutated. The slice length is fixed; only `resize` changes it.
///
/// Copy-on-write runs once, when the guard is taken. An array cloned from
/// this one while the guard is alive shares the guarded buffer and sees
/// every write made through the guard. Clone after dropping the guard to
/// get a snapshot.
///
/// Write guards are not `Clone`: the element lock they hold is exclusive.
///
/// ## Usage
///
/// ```rust
/// use pool_array::{MemoryPool, PoolArray};
///
/// let pool = MemoryPool::with_capacity(8);
/// let mut vertices = PoolArray::from_slice(&pool, &[1.0f32, 2.0, 3.0]).unwrap();
/// let snapshot = vertices.clone();
///
/// {
///     let mut write = vertices.write().unwrap();
///     for v in write.iter_mut() {
///         *v *= 2.0;
///     }
/// }
///
/// assert_eq!(vertices.to_vec().unwrap(), [2.0, 4.0, 6.0]);
/// assert_eq!(snapshot.to_vec().unwrap(), [1.0, 2.0, 3.0]);
/// ```
pub struct WriteGuard<T> {
    access: Option<WriteAccess<T>>,
}

struct WriteAccess<T> {
    elements: ArcRwLockWriteGuard<RawRwLock, Vec<T>>,
    record: Arc<Record<T>>,
}

impl<T> WriteGuard<T> {
    pub(crate) fn null() -> Self {
        Self { access: None }
    }

    /// The caller must already have made `record` unique.
    pub(crate) fn acquire(record: &Arc<Record<T>>) -> PoolArrayResult<Self> {
        let elements = record.lock_write()?;
        Ok(Self {
            access: Some(WriteAccess {
                elements,
                record: Arc::clone(record),
            }),
        })
    }

    /// Returns whether this guard was taken on an empty array.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.access.is_none()
    }

    /// Returns the elements as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match &self.access {
            Some(access) => access.elements.as_slice(),
            None => &[],
        }
    }

    /// Returns the elements as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.access {
            Some(access) => access.elements.as_mut_slice(),
            None => &mut [],
        }
    }
}

impl<T: Pod> WriteGuard<T> {
    /// Returns the elements as raw mutable bytes, e.g. to fill from a file.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(self.as_mut_slice())
    }
}

impl<T> Deref for WriteGuard<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for WriteGuard<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T> Drop for WriteGuard<T> {
    fn drop(&mut self) {
        if let Some(access) = &self.access {
            access.record.end_access();
        }
    }
}

impl<T> std::fmt::Debug for WriteGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGuard")
            .field("len", &self.as_slice().len())
            .field("null", &self.is_null())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoolArrayError;
    use crate::memory::MemoryPool;

    fn record_of(values: Vec<u32>) -> Arc<Record<u32>> {
        let pool = MemoryPool::with_capacity(4);
        Arc::new(Record::new(&pool, values).unwrap())
    }

    #[test]
    fn test_null_guards() {
        let read = ReadGuard::<u32>::null();
        assert!(read.is_null());
        assert!(read.is_empty());

        let mut write = WriteGuard::<u32>::null();
        assert!(write.is_null());
        assert!(write.as_mut_slice().is_empty());
    }

    #[test]
    fn test_read_guard_counts() {
        let record = record_of(vec![1, 2, 3]);

        let r1 = ReadGuard::acquire(&record).unwrap();
        let r2 = ReadGuard::acquire(&record).unwrap();
        assert_eq!(record.access_count(), 2);
        assert_eq!(&*r1, &[1, 2, 3]);
        assert_eq!(r2[1], 2);

        drop(r1);
        assert_eq!(record.access_count(), 1);

        drop(r2);
        assert_eq!(record.access_count(), 0);
    }

    #[test]
    fn test_write_guard_is_exclusive() {
        let record = record_of(vec![0; 4]);

        let mut write = WriteGuard::acquire(&record).unwrap();
        write[2] = 7;

        assert!(matches!(
            ReadGuard::acquire(&record),
            Err(PoolArrayError::Busy { guards: 1 })
        ));
        assert!(matches!(
            WriteGuard::acquire(&record),
            Err(PoolArrayError::Busy { guards: 1 })
        ));

        drop(write);
        let read = ReadGuard::acquire(&record).unwrap();
        assert_eq!(&*read, &[0, 0, 7, 0]);
    }

    #[test]
    fn test_rebinding_adjusts_counts() {
        let a = record_of(vec![1]);
        let b = record_of(vec![2]);

        let mut guard = ReadGuard::acquire(&a).unwrap();
        assert_eq!(guard[0], 1);
        assert_eq!(a.access_count(), 1);

        guard = ReadGuard::acquire(&b).unwrap();
        assert_eq!(a.access_count(), 0);
        assert_eq!(b.access_count(), 1);
        assert_eq!(guard[0], 2);
    }

    #[test]
    fn test_read_guard_clone_counts() {
        let record = record_of(vec![5, 6]);

        let read = ReadGuard::acquire(&record).unwrap();
        let copy = read.clone();
        assert_eq!(record.access_count(), 2);
        assert_eq!(&*copy, &[5, 6]);

        drop(read);
        assert_eq!(record.access_count(), 1);
        assert!(matches!(
            WriteGuard::acquire(&record),
            Err(PoolArrayError::Busy { guards: 1 })
        ));

        drop(copy);
        assert_eq!(record.access_count(), 0);
        assert!(WriteGuard::acquire(&record).is_ok());
    }

    #[test]
    fn test_null_read_guard_clones_null() {
        let read = ReadGuard::<u32>::null();
        let copy = read.clone();
        assert!(copy.is_null());
    }

    #[test]
    fn test_byte_views() {
        let record = record_of(vec![0x0403_0201, 0]);

        {
            let read = ReadGuard::acquire(&record).unwrap();
            assert_eq!(read.as_bytes().len(), 8);
        }

        let mut write = WriteGuard::acquire(&record).unwrap();
        write.as_bytes_mut()[4..].copy_from_slice(&0xAABB_CCDDu32.to_ne_bytes());
        assert_eq!(write[1], 0xAABB_CCDD);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_guard_index_out_of_bounds() {
        let record = record_of(vec![1, 2]);
        let read = ReadGuard::acquire(&record).unwrap();
        let _ = read[2];
    }
}
