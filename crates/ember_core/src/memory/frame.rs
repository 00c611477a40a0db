//! # Double-Buffered Frame Allocator
//!
//! Two [`StackAllocator`]s with one active at a time. Transient data
//! allocated during frame N stays valid and readable while frame N+1
//! fills the other buffer.
//!
//! The per-frame protocol is: [`FrameAllocator::swap_buffers`], then
//! [`FrameAllocator::clear_current_buffer`] - clearing what is now the
//! *old* buffer after it has had one full extra frame to be consumed.
//! Every region handed out is therefore good for two frames.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::MappedMutexGuard;

use super::stack::{StackAllocator, StackMarker};

/// Reference to a region inside a [`FrameAllocator`].
///
/// Carries the index of the buffer it was allocated from, so the region
/// stays addressable after [`FrameAllocator::swap_buffers`] flips the
/// active side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameRef {
    /// Which of the two buffers holds the region.
    buffer: usize,
    /// Position within that buffer.
    marker: StackMarker,
}

impl FrameRef {
    /// Returns the index of the buffer holding the region (0 or 1).
    #[inline]
    #[must_use]
    pub const fn buffer(self) -> usize {
        self.buffer
    }

    /// Returns the position within the owning buffer.
    #[inline]
    #[must_use]
    pub const fn marker(self) -> StackMarker {
        self.marker
    }
}

/// A double-buffered frame allocator.
///
/// All allocation traffic goes to the active buffer;
/// [`Self::swap_buffers`] toggles the active index without touching
/// either buffer's contents.
///
/// # Example
///
/// ```rust,ignore
/// let frame = FrameAllocator::new(64 * 1024);
///
/// loop {
///     frame.swap_buffers();
///     frame.clear_current_buffer(); // old frame's data, now consumed
///
///     let scratch = frame.alloc(256).expect("frame budget blown");
///     // ... scratch stays valid through the *next* frame too ...
/// }
/// ```
pub struct FrameAllocator {
    /// The two stacks.
    buffers: [StackAllocator; 2],
    /// Index of the active buffer (0 or 1).
    current: AtomicUsize,
}

impl FrameAllocator {
    /// Creates a frame allocator with two buffers of `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: [StackAllocator::new(capacity), StackAllocator::new(capacity)],
            current: AtomicUsize::new(0),
        }
    }

    /// Returns the index of the active buffer (0 or 1).
    #[inline]
    #[must_use]
    pub fn current_buffer(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Toggles the active buffer without touching either buffer's data.
    pub fn swap_buffers(&self) {
        self.current.fetch_xor(1, Ordering::AcqRel);
    }

    /// Clears only the active buffer.
    pub fn clear_current_buffer(&self) {
        self.buffers[self.current_buffer()].clear();
    }

    /// Returns the active buffer's current marker as a rollback target.
    #[inline]
    #[must_use]
    pub fn marker(&self) -> FrameRef {
        let buffer = self.current_buffer();
        FrameRef {
            buffer,
            marker: self.buffers[buffer].marker(),
        }
    }

    /// Reserves `size` bytes from the active buffer.
    ///
    /// Returns `None` if the active buffer would overflow.
    #[must_use]
    pub fn alloc(&self, size: usize) -> Option<FrameRef> {
        let buffer = self.current_buffer();
        let marker = self.buffers[buffer].alloc(size)?;
        Some(FrameRef { buffer, marker })
    }

    /// Reserves an aligned region from the active buffer.
    ///
    /// Same adjustment-byte scheme as
    /// [`StackAllocator::alloc_aligned`]. Returns `None` if the active
    /// buffer would overflow.
    ///
    /// # Panics
    ///
    /// Panics unless `alignment` is a power of two in `1..=128`.
    #[must_use]
    pub fn alloc_aligned(&self, size: usize, alignment: usize) -> Option<FrameRef> {
        let buffer = self.current_buffer();
        let marker = self.buffers[buffer].alloc_aligned(size, alignment)?;
        Some(FrameRef { buffer, marker })
    }

    /// Rolls the active buffer back to a previously observed region.
    ///
    /// # Panics
    ///
    /// Panics if the region belongs to the inactive buffer, or lies
    /// above the active buffer's current top.
    pub fn free_to(&self, region: FrameRef) {
        assert_eq!(
            region.buffer,
            self.current_buffer(),
            "rollback target belongs to the inactive buffer"
        );
        self.buffers[region.buffer].free_to(region.marker);
    }

    /// Rolls the active buffer back past an aligned region.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Self::free_to`].
    pub fn free_to_aligned(&self, region: FrameRef) {
        assert_eq!(
            region.buffer,
            self.current_buffer(),
            "rollback target belongs to the inactive buffer"
        );
        self.buffers[region.buffer].free_to_aligned(region.marker);
    }

    /// Returns a read view of a region, active or not.
    ///
    /// This is the two-frame-validity guarantee: regions from the
    /// previous frame remain readable until their buffer is cleared.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the owning buffer's storage.
    #[must_use]
    pub fn bytes(&self, region: FrameRef, len: usize) -> MappedMutexGuard<'_, [u8]> {
        self.buffers[region.buffer].bytes(region.marker, len)
    }

    /// Returns a write view of a region, active or not.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the owning buffer's storage.
    #[must_use]
    pub fn bytes_mut(&self, region: FrameRef, len: usize) -> MappedMutexGuard<'_, [u8]> {
        self.buffers[region.buffer].bytes_mut(region.marker, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_swap_toggles_active_buffer() {
        let frame = FrameAllocator::new(256);
        assert_eq!(frame.current_buffer(), 0);

        frame.swap_buffers();
        assert_eq!(frame.current_buffer(), 1);
        frame.swap_buffers();
        assert_eq!(frame.current_buffer(), 0);
    }

    #[test]
    fn test_frame_data_survives_swap_and_writes() {
        let frame = FrameAllocator::new(256);

        let old = frame.alloc(16).unwrap();
        assert_eq!(old.buffer(), 0);
        frame.bytes_mut(old, 16).copy_from_slice(b"frame-n data....");

        frame.swap_buffers();
        let fresh = frame.alloc(16).unwrap();
        frame.bytes_mut(fresh, 16).copy_from_slice(b"frame-n+1 data..");

        // Buffer A's bytes are untouched by buffer B's traffic.
        assert_eq!(&*frame.bytes(old, 16), b"frame-n data....");

        // ... until the protocol clears it a frame later.
        frame.swap_buffers();
        frame.clear_current_buffer();
        let reused = frame.alloc(16).unwrap();
        assert_eq!(reused.marker(), old.marker());
    }

    #[test]
    fn test_frame_clear_only_touches_active() {
        let frame = FrameAllocator::new(128);

        let _ = frame.alloc(64).unwrap();
        frame.swap_buffers();
        let _ = frame.alloc(32).unwrap();

        frame.clear_current_buffer();

        // Inactive buffer still holds its 64 bytes.
        frame.swap_buffers();
        let next = frame.alloc(1).unwrap();
        assert_eq!(next.marker().offset(), 64);
    }

    #[test]
    fn test_frame_rollback_round_trip() {
        let frame = FrameAllocator::new(512);

        let checkpoint = frame.alloc(100).unwrap();
        let _ = frame.alloc(200).unwrap();

        frame.free_to(checkpoint);
        assert_eq!(frame.marker(), checkpoint);
    }

    #[test]
    #[should_panic(expected = "rollback target belongs to the inactive buffer")]
    fn test_frame_cross_buffer_rollback_panics() {
        let frame = FrameAllocator::new(128);

        let region = frame.alloc(8).unwrap();
        frame.swap_buffers();
        frame.free_to(region);
    }
}
