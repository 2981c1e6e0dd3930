//! Integration tests for pool-backed copy-on-write arrays.
//!
//! Run with: cargo test -p pool_array --test pool_array_test

use std::sync::Arc;
use std::thread;

use pool_array::{
    MemoryPool, PoolArray, PoolArrayError, PoolByteArray, PoolConfig, PoolRealArray,
    PoolStringArray,
};

#[test]
fn test_busy_resize_scenario() {
    let pool = MemoryPool::setup(PoolConfig::small());

    let mut a: PoolArray<i32> = PoolArray::new(&pool);
    a.fill_with([1, 2, 3]).unwrap();
    let b = a.clone();

    let guard = a.read().unwrap();
    assert_eq!(a.resize(5), Err(PoolArrayError::Busy { guards: 1 }));
    assert_eq!(&*guard, &[1, 2, 3]);
    drop(guard);

    assert_eq!(a.to_vec().unwrap(), [1, 2, 3]);

    a.resize(5).unwrap();
    assert_eq!(a.to_vec().unwrap(), [1, 2, 3, 0, 0]);

    // b still has its 3 elements, on a record of its own
    assert_eq!(b.len(), 3);
    assert_eq!(b.to_vec().unwrap(), [1, 2, 3]);
    assert!(!a.shares_buffer_with(&b));
    assert_eq!(b.refcount(), 1);
    assert_eq!(pool.slots_in_use(), 2);
}

#[test]
fn test_capacity_exhaustion_is_deterministic() {
    let capacity = 8;
    let pool = MemoryPool::with_capacity(capacity);

    let mut live = Vec::new();
    for i in 0..capacity {
        live.push(PoolByteArray::from_slice(&pool, &[i as u8]).unwrap());
    }
    assert_eq!(pool.free_slots(), 0);

    let mut one_more = PoolByteArray::new(&pool);
    assert_eq!(
        one_more.resize(1),
        Err(PoolArrayError::OutOfCapacity { capacity })
    );
    assert!(one_more.is_empty());

    // Sharing an existing buffer needs no new slot.
    let shared = live[0].clone();
    assert_eq!(shared.len(), 1);

    // Freeing one slot lets the next allocation through.
    live.pop();
    one_more.resize(1).unwrap();
    assert_eq!(pool.free_slots(), 0);
}

#[test]
fn test_usage_counters() {
    let pool = MemoryPool::with_capacity(4);

    let mut pixels = PoolByteArray::new(&pool);
    pixels.resize(1024).unwrap();

    let mut samples = PoolRealArray::new(&pool);
    samples.resize(256).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.slots_in_use, 2);
    assert_eq!(stats.bytes_in_use, 1024 + 256 * 4);

    pixels.resize(0).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.slots_in_use, 1);
    assert_eq!(stats.bytes_in_use, 1024);
    assert_eq!(stats.peak_bytes, 2048);

    drop(samples);
    assert_eq!(pool.stats().bytes_in_use, 0);
}

#[test]
fn test_cleanup_after_all_arrays_dropped() {
    let pool = MemoryPool::with_capacity(4);
    let array = PoolStringArray::from_slice(&pool, &["a".to_string()]).unwrap();

    assert_eq!(
        Arc::clone(&pool).cleanup(),
        Err(PoolArrayError::StillInUse { in_use: 1 })
    );

    drop(array);
    assert_eq!(pool.cleanup(), Ok(()));
}

#[test]
fn test_string_array_join() {
    let pool = MemoryPool::with_capacity(4);

    let mut names = PoolStringArray::new(&pool);
    for name in ["render", "physics", "audio"] {
        names.push(name.to_string()).unwrap();
    }

    assert_eq!(names.join(" | ").unwrap(), "render | physics | audio");

    names.invert().unwrap();
    assert_eq!(names.join(",").unwrap(), "audio,physics,render");
}

#[test]
fn test_pod_byte_view() {
    let pool = MemoryPool::with_capacity(4);
    let vertices = PoolRealArray::from_slice(&pool, &[1.0, 2.0, 3.0]).unwrap();

    let read = vertices.read().unwrap();
    let bytes = read.as_bytes();
    assert_eq!(bytes.len(), 12);
    assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
}

#[test]
fn test_threads_share_then_diverge() {
    let pool = MemoryPool::with_capacity(64);
    let base = PoolArray::from_iter_in(&pool, 0..1000u32).unwrap();

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let mut local = base.clone();
            thread::spawn(move || {
                let mut write = local.write().unwrap();
                for v in write.iter_mut() {
                    *v += t;
                }
                drop(write);
                local.get(999).unwrap()
            })
        })
        .collect();

    let results: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (t, last) in results.into_iter().enumerate() {
        assert_eq!(last, 999 + t as u32);
    }

    // Every thread copied before writing; the base never changed.
    assert_eq!(base.get(999).unwrap(), 999);
    assert_eq!(base.refcount(), 1);
    assert_eq!(pool.slots_in_use(), 1);
}

#[test]
fn test_concurrent_readers() {
    let pool = MemoryPool::with_capacity(4);
    let data = PoolArray::from_iter_in(&pool, 1..=100u64).unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let read = data.read().unwrap();
                assert_eq!(read.iter().sum::<u64>(), 5050);
            });
        }
    });

    assert!(!data.is_locked());
}
