//! # Memory Management
//!
//! Custom allocators for hot paths that must never touch the
//! general-purpose heap:
//!
//! - [`PoolAllocator`] - fixed-size blocks, individually freed, LIFO reuse
//! - [`SlotPool`] - the typed counterpart, backing store for job and
//!   file objects
//! - [`StackAllocator`] - contiguous bump allocation with marker rollback
//! - [`FrameAllocator`] - two stacks, double-buffered per frame

pub mod frame;
pub mod pool;
pub mod stack;

pub use frame::{FrameAllocator, FrameRef};
pub use pool::{BlockRef, PoolAllocator, SlotHandle, SlotPool};
pub use stack::{StackAllocator, StackMarker};
