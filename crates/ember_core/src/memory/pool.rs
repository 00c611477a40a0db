//! # Pool Allocator
//!
//! Fixed-size block allocator for objects that are frequently allocated
//! and freed. All storage is reserved up front; `alloc`/`free_block` are
//! O(1) and never touch the heap.
//!
//! Two renditions live here:
//!
//! - [`PoolAllocator`] - byte-oriented blocks with optional
//!   alignment-adjusted variants, guarded by one pool-wide lock
//! - [`SlotPool`] - typed slots for object storage (jobs, file state),
//!   left unlocked so an owner can fold it under its own mutex
//!
//! Freed blocks are recycled most-recently-freed-first, so a burst of N
//! frees followed by N allocations hands the same blocks back in exactly
//! reverse order.

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

/// Reference to one allocated block inside a [`PoolAllocator`].
///
/// This is a plain byte offset from the pool's storage base, wrapped so
/// it cannot be confused with markers from other allocators. It is only
/// meaningful to the pool that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockRef {
    /// Byte offset of the block (or of its aligned interior) from base.
    offset: usize,
}

impl BlockRef {
    /// Returns the byte offset from the pool's storage base.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }
}

/// Interior state, guarded by the pool-wide mutex.
struct PoolInner {
    /// The backing storage: `item_size * capacity` bytes.
    storage: Box<[u8]>,
    /// Size of each block in bytes.
    item_size: usize,
    /// Free slot indices, most recently freed on top.
    free: Vec<u32>,
}

/// A pool allocator handing out fixed-size byte blocks.
///
/// Constructed with an item size and capacity; never resizes. `alloc`
/// returns `None` on exhaustion - exhaustion is a value, not a panic.
/// Freeing a block the pool did not produce, or freeing twice, violates
/// the pool contract and trips debug-build assertions.
///
/// # Thread Safety
///
/// Every public operation takes the pool-wide lock. The bodies are O(1),
/// so the coarse lock is the baseline design; it serializes all traffic
/// through one pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = PoolAllocator::new(16, 5);
///
/// let block = pool.alloc().expect("pool exhausted");
/// pool.block_mut(block, 16).fill(0xAB);
/// pool.free_block(block);
/// ```
pub struct PoolAllocator {
    inner: Mutex<PoolInner>,
}

impl PoolAllocator {
    /// Creates a pool of `capacity` blocks of `item_size` bytes each.
    ///
    /// All storage is reserved here; nothing is allocated afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `item_size < 2` or `capacity == 0`.
    #[must_use]
    pub fn new(item_size: usize, capacity: usize) -> Self {
        assert!(item_size >= 2, "pool items must be at least two bytes");
        assert!(capacity > 0, "capacity must be greater than zero");
        assert!(
            u32::try_from(capacity).is_ok(),
            "capacity must fit a 32-bit slot index"
        );

        let storage = vec![0u8; item_size * capacity].into_boxed_slice();
        // Reverse order so a fresh pool hands out slot 0 first.
        let free: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            inner: Mutex::new(PoolInner {
                storage,
                item_size,
                free,
            }),
        }
    }

    /// Returns the fixed block size in bytes.
    #[inline]
    #[must_use]
    pub fn item_size(&self) -> usize {
        self.inner.lock().item_size
    }

    /// Returns the total number of blocks.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        let inner = self.inner.lock();
        inner.storage.len() / inner.item_size
    }

    /// Returns the number of currently free blocks.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Allocates one block.
    ///
    /// O(1). Returns `None` when the pool is exhausted.
    #[must_use]
    pub fn alloc(&self) -> Option<BlockRef> {
        let mut inner = self.inner.lock();
        let slot = inner.free.pop()?;
        Some(BlockRef {
            offset: slot as usize * inner.item_size,
        })
    }

    /// Allocates one block and aligns the returned offset.
    ///
    /// The pool's item size must already account for the worst case:
    /// `size + alignment == item_size`. One byte recording how far the
    /// offset was adjusted is written immediately before the returned
    /// offset; [`Self::free_block_aligned`] reads it back. Alignment is
    /// measured relative to the pool's storage base.
    ///
    /// Returns `None` when the pool is exhausted.
    ///
    /// # Panics
    ///
    /// Panics unless `alignment` is a power of two in `1..=128` and
    /// `size + alignment == item_size`.
    #[must_use]
    pub fn alloc_aligned(&self, size: usize, alignment: usize) -> Option<BlockRef> {
        let mut inner = self.inner.lock();

        assert!(alignment >= 1, "alignment must be at least one byte");
        assert!(alignment <= 128, "alignment above 128 bytes is unsupported");
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        assert!(
            size + alignment == inner.item_size,
            "item size must equal requested size plus alignment"
        );

        let slot = inner.free.pop()?;
        let raw = slot as usize * inner.item_size;

        let mask = alignment - 1;
        let misalignment = raw & mask;
        let adjustment = alignment - misalignment;

        let aligned = raw + adjustment;
        // The byte before the aligned offset records the skip distance.
        inner.storage[aligned - 1] = adjustment as u8;

        Some(BlockRef { offset: aligned })
    }

    /// Returns a block to the free list.
    ///
    /// O(1). The block becomes the next one handed out.
    ///
    /// # Panics
    ///
    /// Debug builds assert that the offset is in bounds, block-aligned,
    /// and not already free; violating any of these outside debug builds
    /// is undefined pool behavior.
    pub fn free_block(&self, block: BlockRef) {
        let mut inner = self.inner.lock();

        debug_assert!(
            block.offset < inner.storage.len(),
            "freed block is outside this pool"
        );
        debug_assert!(
            block.offset % inner.item_size == 0,
            "freed offset is not a block start"
        );

        let slot = (block.offset / inner.item_size) as u32;
        // Membership scan is expensive; debug tier only.
        debug_assert!(!inner.free.contains(&slot), "block freed twice");

        inner.free.push(slot);
    }

    /// Returns an aligned block to the free list.
    ///
    /// Reads the adjustment byte stored just before the aligned offset
    /// to recover the true block start, then frees normally.
    ///
    /// # Panics
    ///
    /// Panics if the offset is zero; debug builds additionally apply the
    /// [`Self::free_block`] checks to the recovered block start.
    pub fn free_block_aligned(&self, block: BlockRef) {
        let mut inner = self.inner.lock();

        assert!(block.offset >= 1, "aligned block offset cannot be zero");
        debug_assert!(
            block.offset < inner.storage.len(),
            "freed block is outside this pool"
        );

        let adjustment = inner.storage[block.offset - 1] as usize;
        let raw = block.offset - adjustment;

        debug_assert!(raw % inner.item_size == 0, "stored adjustment is corrupt");
        let slot = (raw / inner.item_size) as u32;
        debug_assert!(!inner.free.contains(&slot), "block freed twice");

        inner.free.push(slot);
    }

    /// Returns a read view of `len` bytes starting at an allocated block.
    ///
    /// The view holds the pool-wide lock until dropped.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the pool's storage.
    #[must_use]
    pub fn block(&self, block: BlockRef, len: usize) -> MappedMutexGuard<'_, [u8]> {
        let inner = self.inner.lock();
        assert!(
            block.offset + len <= inner.storage.len(),
            "block view runs past pool storage"
        );
        MutexGuard::map(inner, |i| &mut i.storage[block.offset..block.offset + len])
    }

    /// Returns a write view of `len` bytes starting at an allocated block.
    ///
    /// The view holds the pool-wide lock until dropped.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the pool's storage.
    #[must_use]
    pub fn block_mut(&self, block: BlockRef, len: usize) -> MappedMutexGuard<'_, [u8]> {
        self.block(block, len)
    }
}

/// Handle to an object stored in a [`SlotPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Index into the pool.
    index: u32,
}

/// A typed slot pool: the object-storage counterpart of
/// [`PoolAllocator`].
///
/// Same pre-allocated storage, same LIFO slot reuse, but slots hold
/// values of `T` instead of raw bytes, so the scheduler and file layer
/// can pool-allocate closures and file state in safe code. The pool is
/// deliberately not locked internally; owners fold it under the mutex
/// that already guards their own state.
pub struct SlotPool<T> {
    /// The storage array.
    slots: Box<[Option<T>]>,
    /// Free slot indices, most recently freed on top.
    free: Vec<u32>,
}

impl<T> SlotPool<T> {
    /// Creates a pool with the given slot capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds the 32-bit index range.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        assert!(
            u32::try_from(capacity).is_ok(),
            "capacity must fit a 32-bit slot index"
        );

        let slots: Vec<Option<T>> = (0..capacity).map(|_| None).collect();
        let free: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            slots: slots.into_boxed_slice(),
            free,
        }
    }

    /// Returns the total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Stores a value in a free slot.
    ///
    /// O(1). Returns `None` when the pool is exhausted (the value is
    /// dropped in that case).
    pub fn alloc(&mut self, value: T) -> Option<SlotHandle> {
        let index = self.free.pop()?;
        self.slots[index as usize] = Some(value);
        Some(SlotHandle { index })
    }

    /// Removes a value, returning its slot to the free list.
    ///
    /// O(1). Returns `None` if the slot was already empty.
    pub fn free(&mut self, handle: SlotHandle) -> Option<T> {
        let value = self.slots.get_mut(handle.index as usize)?.take()?;
        self.free.push(handle.index);
        Some(value)
    }

    /// Returns a reference to the value in a slot.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.slots.get(handle.index as usize)?.as_ref()
    }

    /// Returns a mutable reference to the value in a slot.
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.index as usize)?.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_exhaustion_returns_none() {
        let pool = PoolAllocator::new(16, 5);

        let blocks: Vec<BlockRef> = (0..5).map(|_| pool.alloc().unwrap()).collect();
        assert_eq!(blocks.len(), 5);
        assert!(pool.alloc().is_none());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_pool_free_order_reverses_alloc_order() {
        let pool = PoolAllocator::new(16, 5);

        let first: Vec<BlockRef> = (0..5).map(|_| pool.alloc().unwrap()).collect();
        for block in &first {
            pool.free_block(*block);
        }

        // LIFO free list: second round comes back in reverse.
        let second: Vec<BlockRef> = (0..5).map(|_| pool.alloc().unwrap()).collect();
        for (i, block) in first.iter().enumerate() {
            assert_eq!(*block, second[first.len() - i - 1]);
        }
    }

    #[test]
    fn test_pool_aligned_round_trip() {
        let pool = PoolAllocator::new(16, 8);

        let first: Vec<BlockRef> = (0..8).map(|_| pool.alloc_aligned(8, 8).unwrap()).collect();
        for block in &first {
            // Aligned relative to the storage base.
            assert_eq!(block.offset() % 8, 0);
            pool.free_block_aligned(*block);
        }

        let second: Vec<BlockRef> = (0..8).map(|_| pool.alloc_aligned(8, 8).unwrap()).collect();
        for (i, block) in first.iter().enumerate() {
            assert_eq!(*block, second[first.len() - i - 1]);
        }
    }

    #[test]
    fn test_pool_small_items_no_size_ceiling() {
        // 2-byte items in a pool far past the old 64 KiB encoding limit.
        let pool = PoolAllocator::new(2, 40_000);
        assert_eq!(pool.capacity(), 40_000);

        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 2);
    }

    #[test]
    fn test_pool_block_views() {
        let pool = PoolAllocator::new(16, 2);
        let block = pool.alloc().unwrap();

        pool.block_mut(block, 16).copy_from_slice(&[7u8; 16]);
        assert_eq!(&*pool.block(block, 16), &[7u8; 16]);
    }

    #[test]
    #[should_panic(expected = "item size must equal requested size plus alignment")]
    fn test_pool_aligned_size_mismatch_panics() {
        let pool = PoolAllocator::new(16, 2);
        let _ = pool.alloc_aligned(16, 8);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "block freed twice")]
    fn test_pool_double_free_panics() {
        let pool = PoolAllocator::new(16, 2);
        let block = pool.alloc().unwrap();
        pool.free_block(block);
        pool.free_block(block);
    }

    #[test]
    fn test_slot_pool_allocate_free() {
        let mut pool: SlotPool<u32> = SlotPool::new(10);

        let h1 = pool.alloc(42).unwrap();
        assert_eq!(*pool.get(h1).unwrap(), 42);
        assert_eq!(pool.allocated_count(), 1);

        *pool.get_mut(h1).unwrap() = 43;

        let freed = pool.free(h1).unwrap();
        assert_eq!(freed, 43);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn test_slot_pool_full() {
        let mut pool: SlotPool<u8> = SlotPool::new(2);

        let _ = pool.alloc(1).unwrap();
        let _ = pool.alloc(2).unwrap();
        assert!(pool.alloc(3).is_none());
    }

    #[test]
    fn test_slot_pool_reuses_last_freed() {
        let mut pool: SlotPool<u32> = SlotPool::new(4);

        let a = pool.alloc(1).unwrap();
        let b = pool.alloc(2).unwrap();
        pool.free(a);
        pool.free(b);

        // Most recently freed slot comes back first.
        let c = pool.alloc(3).unwrap();
        assert_eq!(c, b);
        let d = pool.alloc(4).unwrap();
        assert_eq!(d, a);
    }
}
