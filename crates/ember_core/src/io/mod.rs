//! # Asynchronous File I/O
//!
//! Synchronous file primitives (open/close/read/write/unbuffered write)
//! plus async variants dispatched through the job scheduler. Each open
//! file is a pool-allocated object guarded by its own lock, so I/O on
//! distinct files proceeds concurrently while operations on one file
//! serialize.

pub mod manager;

pub use manager::{FileHandle, FileOpStatus, IoManager};
