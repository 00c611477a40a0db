//! # Job Scheduler
//!
//! Worker threads loop on a shared deque: wait until the queue is
//! non-empty or shutdown has been requested, claim the front job, run it
//! outside every lock, then reclaim its storage and wake any waiters.
//!
//! Two mutex+condvar pairs protect the scheduler - one for the queue,
//! one for the live-job registry that backs [`JobScheduler::wait`].
//! Whenever both are held together the queue lock is taken first; this
//! order is fixed globally to keep the scheduler deadlock-free.
//!
//! Shutdown is a graceful drain: the running flag stops new submissions,
//! but workers keep pulling jobs that were already queued and only exit
//! once the deque is empty.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::memory::{SlotHandle, SlotPool};

/// Identifies a submitted job; monotonically increasing, never reused
/// while the job is live.
pub type JobHandle = u64;

/// The handle value no job is ever assigned.
pub const NULL_JOB_HANDLE: JobHandle = 0;

/// Worker threads spun up when a count is not given.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Live jobs a scheduler can hold when a capacity is not given.
pub const DEFAULT_JOB_CAPACITY: usize = 128;

/// Lifecycle of one job. `Pending` is the only non-terminal state.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Canceled before a worker claimed it; its closure never runs.
    Aborted = -2,
    /// Reserved for closures that report failure; the scheduler itself
    /// never produces this.
    Failed = -1,
    /// Submitted and not yet claimed by a worker.
    Pending = 0,
    /// The closure ran to completion.
    Success = 1,
}

/// The work a job carries.
type JobFn = Box<dyn FnOnce() + Send + 'static>;

/// Per-job state behind the job's own lock.
struct JobState {
    /// Where the job is in its lifecycle.
    status: JobStatus,
    /// The closure; taken by the claiming worker, after which the job
    /// can no longer be canceled.
    func: Option<JobFn>,
}

/// One pool-allocated job.
struct AsyncJob {
    /// The id handed back to the submitter.
    id: JobHandle,
    /// Status and closure, guarded per job.
    state: Mutex<JobState>,
}

/// Queue state behind the queue mutex.
struct QueueState {
    /// Slots of queued jobs, front is next to run.
    jobs: VecDeque<SlotHandle>,
    /// False once shutdown has been requested.
    running: bool,
}

/// State shared between the owner and the workers.
struct SchedulerShared {
    /// The job queue plus the running flag its condvar predicate reads.
    queue: Mutex<QueueState>,
    /// Wakes idle workers on submission and on shutdown.
    queue_cond: Condvar,
    /// Jobs submitted but not yet reclaimed, keyed by id.
    live: Mutex<HashMap<JobHandle, SlotHandle>>,
    /// Wakes `wait` callers when a job is reclaimed.
    live_cond: Condvar,
    /// Backing storage for job objects.
    pool: Mutex<SlotPool<AsyncJob>>,
    /// Next id to assign; starts at 1 so 0 stays the null handle.
    next_id: AtomicU64,
}

/// A fixed-size worker-thread pool.
///
/// Closures submitted through [`Self::async_do`] run at an unspecified
/// future time on an arbitrary worker thread - completion callbacks must
/// never assume they are on the submitting thread.
///
/// Dropping the scheduler is a blocking drain: already-queued jobs still
/// execute, then the workers are joined.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = JobScheduler::new(4);
///
/// let id = scheduler.async_do(|| do_expensive_thing(), false);
/// scheduler.wait(id);
/// ```
pub struct JobScheduler {
    shared: Arc<SchedulerShared>,
    workers: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    /// Spins up `worker_count` workers with the default job capacity.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is zero or a worker thread cannot be
    /// spawned.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        Self::with_job_capacity(worker_count, DEFAULT_JOB_CAPACITY)
    }

    /// Spins up `worker_count` workers able to hold `job_capacity` live
    /// jobs at once.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is zero or a worker thread cannot be
    /// spawned.
    #[must_use]
    pub fn with_job_capacity(worker_count: usize, job_capacity: usize) -> Self {
        assert!(worker_count > 0, "scheduler needs at least one worker");

        let shared = Arc::new(SchedulerShared {
            queue: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                running: true,
            }),
            queue_cond: Condvar::new(),
            live: Mutex::new(HashMap::new()),
            live_cond: Condvar::new(),
            pool: Mutex::new(SlotPool::new(job_capacity)),
            next_id: AtomicU64::new(1),
        });

        let workers = (0..worker_count)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("ember-worker-{i}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn job worker")
            })
            .collect();

        Self { shared, workers }
    }

    /// Queues a closure and returns its handle immediately.
    ///
    /// The closure runs later on an arbitrary worker. `immediate` jobs
    /// are inserted at the queue's front, ahead of everything currently
    /// queued - successive immediate jobs therefore run in reverse
    /// submission order among themselves.
    ///
    /// Returns [`NULL_JOB_HANDLE`] if the job pool is exhausted or the
    /// scheduler is shutting down.
    pub fn async_do(&self, func: impl FnOnce() + Send + 'static, immediate: bool) -> JobHandle {
        // Queue lock before registry lock, always.
        let mut queue = self.shared.queue.lock();
        if !queue.running {
            return NULL_JOB_HANDLE;
        }
        let mut live = self.shared.live.lock();
        let mut pool = self.shared.pool.lock();

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let job = AsyncJob {
            id,
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                func: Some(Box::new(func)),
            }),
        };

        let Some(slot) = pool.alloc(job) else {
            tracing::warn!(capacity = pool.capacity(), "job pool exhausted");
            return NULL_JOB_HANDLE;
        };

        if immediate {
            queue.jobs.push_front(slot);
        } else {
            queue.jobs.push_back(slot);
        }
        live.insert(id, slot);

        drop(pool);
        drop(live);
        drop(queue);

        self.shared.queue_cond.notify_one();
        id
    }

    /// Attempts to cancel a queued job.
    ///
    /// Best-effort and race-tolerant: returns `true` only if the job was
    /// still pending and unclaimed - its closure will then never run.
    /// Returns `false` for jobs already claimed, finished, or unknown.
    pub fn cancel_async_job(&self, handle: JobHandle) -> bool {
        let live = self.shared.live.lock();
        let Some(&slot) = live.get(&handle) else {
            return false;
        };

        let pool = self.shared.pool.lock();
        let Some(job) = pool.get(slot) else {
            return false;
        };

        let mut state = job.state.lock();
        if state.status == JobStatus::Pending && state.func.is_some() {
            state.status = JobStatus::Aborted;
            true
        } else {
            false
        }
    }

    /// Blocks until a job has been executed (or skipped) and reclaimed.
    ///
    /// Returns immediately if the handle is unknown - already completed
    /// or never issued. The wait is unbounded.
    pub fn wait(&self, handle: JobHandle) {
        let mut live = self.shared.live.lock();
        while live.contains_key(&handle) {
            self.shared.live_cond.wait(&mut live);
        }
    }
}

impl Drop for JobScheduler {
    /// Blocking drain: stops new submissions, wakes every worker, and
    /// joins them once the queue has emptied.
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.running = false;
        }
        self.shared.queue_cond.notify_all();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("job worker exited by panic");
            }
        }
    }
}

/// The body every worker thread runs.
fn worker_loop(shared: &SchedulerShared) {
    tracing::trace!("job worker up");

    loop {
        // Wait for a job or for shutdown-with-empty-queue.
        let slot = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(slot) = queue.jobs.pop_front() {
                    break slot;
                }
                if !queue.running {
                    tracing::trace!("job worker down");
                    return;
                }
                shared.queue_cond.wait(&mut queue);
            }
        };

        // Claim: take the closure unless the job was aborted. Taking it
        // is the point of no return for cancellation.
        let (id, func) = {
            let pool = shared.pool.lock();
            let job = pool.get(slot).expect("claimed job missing from pool");
            let mut state = job.state.lock();
            let func = if state.status == JobStatus::Aborted {
                None
            } else {
                state.func.take()
            };
            (job.id, func)
        };

        // Run outside every lock.
        let ran = func.is_some();
        if let Some(func) = func {
            func();
        }

        // Reclaim: drop the job from the registry, wake waiters, return
        // its slot to the pool.
        {
            let mut live = shared.live.lock();
            live.remove(&id);
        }
        shared.live_cond.notify_all();

        {
            let mut pool = shared.pool.lock();
            if ran {
                if let Some(job) = pool.get(slot) {
                    job.state.lock().status = JobStatus::Success;
                }
            }
            pool.free(slot);
        }
    }
}
