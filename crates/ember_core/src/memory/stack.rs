//! # Stack Allocator
//!
//! Contiguous bump allocator with marker-based rollback. Allocation is a
//! marker bump; freeing is rolling the marker back to a previously
//! observed position, or clearing outright. Meant for per-frame,
//! largely single-writer allocation bursts - the single mutex is not a
//! high-contention design.

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

/// An opaque checkpoint into a [`StackAllocator`].
///
/// Markers are byte offsets from the stack's bottom. They are produced
/// by [`StackAllocator::alloc`] (the start of the fresh region) and
/// [`StackAllocator::marker`] (the current top), and consumed by
/// [`StackAllocator::free_to`] for bulk rollback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StackMarker {
    /// Byte offset from the bottom of the stack.
    offset: usize,
}

impl StackMarker {
    /// Returns the byte offset from the bottom of the stack.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }
}

/// Interior state, guarded by the allocator mutex.
struct StackInner {
    /// The backing storage.
    storage: Box<[u8]>,
    /// Current top of the stack as a byte offset; everything below is
    /// live, everything at or above is free.
    marker: usize,
}

/// A bump allocator over one contiguous buffer.
///
/// `alloc` bumps the marker and returns the pre-bump position, or `None`
/// if the bump would pass the top. The marker only moves backward
/// through explicit [`Self::free_to`]/[`Self::clear`] calls; rolling it
/// *forward* is a contract violation and fails a fatal assert.
///
/// # Example
///
/// ```rust,ignore
/// let stack = StackAllocator::new(1024);
///
/// let checkpoint = stack.marker();
/// let region = stack.alloc(64).expect("stack full");
/// stack.bytes_mut(region, 64).fill(0);
/// stack.free_to(checkpoint); // bulk rollback
/// ```
pub struct StackAllocator {
    inner: Mutex<StackInner>,
}

impl StackAllocator {
    /// Creates a stack with a fixed byte capacity, reserved up front.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        Self {
            inner: Mutex::new(StackInner {
                storage: vec![0u8; capacity].into_boxed_slice(),
                marker: 0,
            }),
        }
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().storage.len()
    }

    /// Returns the currently used space in bytes.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.inner.lock().marker
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        let inner = self.inner.lock();
        inner.storage.len() - inner.marker
    }

    /// Returns the current marker, a valid rollback target.
    #[inline]
    #[must_use]
    pub fn marker(&self) -> StackMarker {
        StackMarker {
            offset: self.inner.lock().marker,
        }
    }

    /// Reserves `size` bytes and returns the start of the region.
    ///
    /// O(1). Returns `None` if the stack would overflow.
    #[must_use]
    pub fn alloc(&self, size: usize) -> Option<StackMarker> {
        let mut inner = self.inner.lock();

        let new_marker = inner.marker + size;
        if new_marker > inner.storage.len() {
            return None;
        }

        let mark = StackMarker {
            offset: inner.marker,
        };
        inner.marker = new_marker;
        Some(mark)
    }

    /// Reserves an aligned region of `size` bytes.
    ///
    /// Allocates `size + alignment` bytes and bumps the returned offset
    /// up to the next alignment boundary (relative to the stack's
    /// bottom). The byte immediately before the returned offset records
    /// the adjustment so [`Self::free_to_aligned`] can recover the true
    /// region start. Returns `None` if the stack would overflow.
    ///
    /// # Panics
    ///
    /// Panics unless `alignment` is a power of two in `1..=128`.
    #[must_use]
    pub fn alloc_aligned(&self, size: usize, alignment: usize) -> Option<StackMarker> {
        assert!(alignment >= 1, "alignment must be at least one byte");
        assert!(alignment <= 128, "alignment above 128 bytes is unsupported");
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");

        let mut inner = self.inner.lock();

        let expanded = size + alignment;
        let new_marker = inner.marker + expanded;
        if new_marker > inner.storage.len() {
            return None;
        }

        let raw = inner.marker;
        inner.marker = new_marker;

        let mask = alignment - 1;
        let misalignment = raw & mask;
        let adjustment = alignment - misalignment;

        let aligned = raw + adjustment;
        inner.storage[aligned - 1] = adjustment as u8;

        Some(StackMarker { offset: aligned })
    }

    /// Rolls the marker back to a previously observed position.
    ///
    /// # Panics
    ///
    /// Panics if `marker` lies above the current top - rolling forward
    /// is rejected.
    pub fn free_to(&self, marker: StackMarker) {
        let mut inner = self.inner.lock();

        assert!(
            marker.offset <= inner.marker,
            "cannot roll a stack marker forward"
        );

        inner.marker = marker.offset;
    }

    /// Rolls back to a marker produced by [`Self::alloc_aligned`].
    ///
    /// Reads the stored adjustment byte to recover the unaligned region
    /// start, then rolls back to it.
    ///
    /// # Panics
    ///
    /// Panics if the marker lies above the current top or at offset zero.
    pub fn free_to_aligned(&self, marker: StackMarker) {
        let mut inner = self.inner.lock();

        assert!(
            marker.offset <= inner.marker,
            "cannot roll a stack marker forward"
        );
        assert!(marker.offset >= 1, "aligned marker offset cannot be zero");

        let adjustment = inner.storage[marker.offset - 1] as usize;
        inner.marker = marker.offset - adjustment;
    }

    /// Resets the marker to the bottom, invalidating every region.
    pub fn clear(&self) {
        self.inner.lock().marker = 0;
    }

    /// Returns a read view of `len` bytes starting at a region marker.
    ///
    /// The view holds the allocator lock until dropped.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the stack's storage.
    #[must_use]
    pub fn bytes(&self, marker: StackMarker, len: usize) -> MappedMutexGuard<'_, [u8]> {
        let inner = self.inner.lock();
        assert!(
            marker.offset + len <= inner.storage.len(),
            "byte view runs past stack storage"
        );
        MutexGuard::map(inner, |i| &mut i.storage[marker.offset..marker.offset + len])
    }

    /// Returns a write view of `len` bytes starting at a region marker.
    ///
    /// The view holds the allocator lock until dropped.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the stack's storage.
    #[must_use]
    pub fn bytes_mut(&self, marker: StackMarker, len: usize) -> MappedMutexGuard<'_, [u8]> {
        self.bytes(marker, len)
    }
}
