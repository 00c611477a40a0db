//! # Job Scheduling
//!
//! A fixed set of worker threads draining a shared job queue, with
//! normal/priority submission, cooperative cancellation and blocking
//! wait-for-completion. Job objects are pool-allocated; nothing is
//! heap-allocated per submission beyond the boxed closure itself.

pub mod scheduler;

pub use scheduler::{JobHandle, JobScheduler, JobStatus, NULL_JOB_HANDLE};
