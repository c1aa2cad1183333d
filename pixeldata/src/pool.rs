//! A process-wide pool of reusable numeric buffers.
//!
//! Pixel extraction allocates short-lived scratch buffers
//! whose sizes cluster around a handful of common image dimensions.
//! The pool keeps a bounded number of them per size bucket
//! so repeated reads do not churn the allocator.
//!
//! Buffers are handed out as [`PooledBuffer`] leases
//! whose destructor returns the storage to the pool,
//! so release happens on every exit path, including unwinding.
//! Handed-out buffers are always re-zeroed to their logical length.

use once_cell::sync::Lazy;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Bucket capacities, in element count.
pub const BUCKET_SIZES: [usize; 4] = [65_536, 262_144, 1_048_576, 4_194_304];

/// How many buffers each bucket retains; beyond this, releases drop.
const BUCKET_RETENTION: usize = 4;

static POOL_U8: Lazy<Mutex<Buckets<u8>>> = Lazy::new(|| Mutex::new(Buckets::new()));
static POOL_U16: Lazy<Mutex<Buckets<u16>>> = Lazy::new(|| Mutex::new(Buckets::new()));

#[doc(hidden)]
pub struct Buckets<T> {
    slots: [Vec<Vec<T>>; 4],
}

impl<T> Buckets<T> {
    fn new() -> Self {
        Buckets {
            slots: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        }
    }

    fn take(&mut self, bucket: usize) -> Option<Vec<T>> {
        self.slots[bucket].pop()
    }

    fn put(&mut self, bucket: usize, buffer: Vec<T>) {
        if self.slots[bucket].len() < BUCKET_RETENTION {
            self.slots[bucket].push(buffer);
        }
    }
}

/// An element type the pool can hold.
pub trait PoolElement: Copy + Default + Send + 'static {
    #[doc(hidden)]
    fn pool() -> &'static Mutex<Buckets<Self>>;
}

impl PoolElement for u8 {
    fn pool() -> &'static Mutex<Buckets<u8>> {
        &POOL_U8
    }
}

impl PoolElement for u16 {
    fn pool() -> &'static Mutex<Buckets<u16>> {
        &POOL_U16
    }
}

/// The index of the smallest bucket holding `count` elements.
fn bucket_for(count: usize) -> Option<usize> {
    BUCKET_SIZES.iter().position(|&size| count <= size)
}

/// Acquire a zeroed buffer of `count` elements.
///
/// Counts above the largest bucket are served by a plain allocation
/// which is not returned to the pool on drop.
pub fn acquire<T: PoolElement>(count: usize) -> PooledBuffer<T> {
    let Some(bucket) = bucket_for(count) else {
        return PooledBuffer {
            buffer: vec![T::default(); count],
            bucket: None,
        };
    };

    let recycled = T::pool().lock().unwrap().take(bucket);
    let mut buffer = recycled.unwrap_or_else(|| Vec::with_capacity(BUCKET_SIZES[bucket]));
    // stale content from the previous user must not leak through
    buffer.clear();
    buffer.resize(count, T::default());
    PooledBuffer {
        buffer,
        bucket: Some(bucket),
    }
}

/// A lease on a pooled buffer.
///
/// Dereferences to a slice of the requested length.
/// Dropping the lease returns the storage to its bucket.
#[derive(Debug)]
pub struct PooledBuffer<T: PoolElement> {
    buffer: Vec<T>,
    bucket: Option<usize>,
}

impl<T: PoolElement> PooledBuffer<T> {
    /// Copy the contents out into a right-sized vector,
    /// releasing the lease.
    pub fn into_exact_vec(self) -> Vec<T> {
        self.buffer.as_slice().to_vec()
    }
}

impl<T: PoolElement> Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.buffer
    }
}

impl<T: PoolElement> DerefMut for PooledBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.buffer
    }
}

impl<T: PoolElement> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        if let Some(bucket) = self.bucket {
            let storage = std::mem::take(&mut self.buffer);
            T::pool().lock().unwrap().put(bucket, storage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_come_back_zeroed() {
        {
            let mut lease = acquire::<u16>(100);
            lease[0] = 0xBEEF;
            lease[99] = 0x1234;
        }
        let lease = acquire::<u16>(100);
        assert!(lease.iter().all(|&v| v == 0));
    }

    #[test]
    fn lease_has_requested_length() {
        let lease = acquire::<u8>(12_345);
        assert_eq!(lease.len(), 12_345);
        assert!(lease.into_exact_vec().len() == 12_345);
    }

    #[test]
    fn oversized_requests_bypass_the_pool() {
        let lease = acquire::<u8>(BUCKET_SIZES[3] + 1);
        assert_eq!(lease.len(), BUCKET_SIZES[3] + 1);
        assert!(lease.bucket.is_none());
    }

    #[test]
    fn bucket_selection_is_ceiling() {
        assert_eq!(bucket_for(1), Some(0));
        assert_eq!(bucket_for(65_536), Some(0));
        assert_eq!(bucket_for(65_537), Some(1));
        assert_eq!(bucket_for(4_194_304), Some(3));
        assert_eq!(bucket_for(4_194_305), None);
    }
}
