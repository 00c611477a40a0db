//! # EMBER Core Substrate
//!
//! The low-level memory and concurrency layer underneath the engine:
//! custom allocators that keep hot paths off the general-purpose heap,
//! a worker-thread job scheduler built on top of them, and an
//! asynchronous file layer built on top of the scheduler.
//!
//! ## Architecture Rules
//!
//! 1. **No general-purpose heap traffic in hot paths** - allocator
//!    storage is reserved up front and recycled in place
//! 2. **Recoverable failures are values** - exhaustion and I/O errors
//!    come back as `None` or a status code, never as a panic
//! 3. **Contract violations are fatal** - double frees, out-of-range
//!    rollbacks and stale handles are asserts, not error codes
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_core::memory::PoolAllocator;
//!
//! let pool = PoolAllocator::new(64, 1024);
//! let block = pool.alloc().expect("pool exhausted");
//! pool.free_block(block);
//! ```

pub mod io;
pub mod jobs;
pub mod memory;
pub mod strings;
pub mod time;

pub use io::{FileHandle, FileOpStatus, IoManager};
pub use jobs::{JobHandle, JobScheduler, JobStatus, NULL_JOB_HANDLE};
pub use memory::{
    BlockRef, FrameAllocator, FrameRef, PoolAllocator, SlotHandle, SlotPool, StackAllocator,
    StackMarker,
};
pub use strings::{intern, resolve, StrId};
pub use time::{Clock, Timer};
