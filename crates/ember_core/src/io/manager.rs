//! # I/O Manager
//!
//! Files are opened in binary-append mode (or truncated when asked) and
//! tracked in a slot pool; a handle is an opaque reference to the pooled
//! entry. Closing marks the entry soft-deleted under the file's own lock
//! before the native handle goes away, so an in-flight operation that
//! raced the close fails fast with [`FileOpStatus::Failed`] instead of
//! touching dead state.
//!
//! The async variants capture the file at submission time and run the
//! matching synchronous primitive on a scheduler worker; cancellation
//! and waiting are the scheduler's, unchanged.
//!
//! Caller contract: never close a file while async operations are still
//! outstanding on its handle. The soft-delete flag narrows the window
//! but the contract is the caller's to keep.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::jobs::scheduler::DEFAULT_WORKER_COUNT;
use crate::jobs::{JobHandle, JobScheduler};
use crate::memory::{SlotHandle, SlotPool};

/// Open files an I/O manager can track at once.
pub const DEFAULT_FILE_CAPACITY: usize = 128;

/// Unbuffered writes flush after this many bytes.
const UNBUFFERED_FLUSH_INTERVAL: usize = 4;

/// Outcome of a file operation. There is deliberately no zero value.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileOpStatus {
    /// The caller's buffer was smaller than the file; only the part that
    /// fit was read.
    BufferOverflow = -2,
    /// The underlying stream failed, or the file was closed underneath
    /// the operation.
    Failed = -1,
    /// The operation completed.
    Success = 1,
}

/// Opaque reference to an open file.
///
/// Produced by [`IoManager::open_file`]; dead once the file is closed.
/// Using a dead handle with a synchronous primitive is a contract
/// violation and fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle {
    /// Slot of the pooled file object.
    slot: SlotHandle,
}

/// Mutable file state behind the per-file lock.
struct FileState {
    /// The native file; dropped (closed) on [`IoManager::close_file`].
    file: Option<File>,
    /// Set on close so racing operations fail fast.
    deleted: bool,
}

/// One pool-allocated open file.
struct AsyncFile {
    /// Every read and write serializes through this lock.
    state: Mutex<FileState>,
}

/// Registry shared with worker-thread closures.
struct IoShared {
    /// Open files; slots are recycled after close.
    files: Mutex<SlotPool<Arc<AsyncFile>>>,
}

/// The asynchronous file layer.
///
/// Owns its worker threads (through an internal [`JobScheduler`]) and
/// every open file's lifetime until the explicit close. Dropping the
/// manager drains queued I/O jobs; it does not close files - that is the
/// caller's job.
///
/// # Example
///
/// ```rust,ignore
/// let io = IoManager::new();
/// let file = io.open_file("save.bin", false).expect("open failed");
///
/// let job = io.async_write(file, payload, |status, _| {
///     assert_eq!(status, FileOpStatus::Success);
/// }, false);
/// io.wait_async_io(job);
/// io.close_file(file);
/// ```
pub struct IoManager {
    shared: Arc<IoShared>,
    scheduler: JobScheduler,
}

impl IoManager {
    /// Spins up the I/O worker threads and the file registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(IoShared {
                files: Mutex::new(SlotPool::new(DEFAULT_FILE_CAPACITY)),
            }),
            scheduler: JobScheduler::new(DEFAULT_WORKER_COUNT),
        }
    }

    /// Opens a file in binary append mode, creating it if missing.
    ///
    /// With `clear` set the file is truncated instead, for a fresh
    /// write. Returns `None` if the OS refuses the open or the file
    /// registry is exhausted.
    #[must_use]
    pub fn open_file(&self, path: impl AsRef<Path>, clear: bool) -> Option<FileHandle> {
        let path = path.as_ref();
        let opened = if clear {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
        } else {
            OpenOptions::new().read(true).append(true).create(true).open(path)
        };

        let file = match opened {
            Ok(file) => file,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "open failed");
                return None;
            }
        };

        let entry = Arc::new(AsyncFile {
            state: Mutex::new(FileState {
                file: Some(file),
                deleted: false,
            }),
        });

        let mut files = self.shared.files.lock();
        let Some(slot) = files.alloc(entry) else {
            tracing::warn!(capacity = files.capacity(), "file registry exhausted");
            return None;
        };
        Some(FileHandle { slot })
    }

    /// Closes a file and recycles its registry slot.
    ///
    /// The soft-delete flag is set under the file's lock before the
    /// native handle is dropped, so an operation that raced this close
    /// reports [`FileOpStatus::Failed`]. Callers must not have async
    /// operations outstanding on the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or already closed.
    pub fn close_file(&self, handle: FileHandle) {
        let file = self.resolve(handle);

        // Mark dead under the file's lock before the slot is recycled,
        // so an operation that already resolved this file fails fast.
        {
            let mut state = file.state.lock();
            state.deleted = true;
            // Dropping the native file closes it, still under the lock.
            state.file = None;
        }

        self.shared.files.lock().free(handle.slot);
    }

    /// Reads the whole file into `buffer`, front to back.
    ///
    /// Seeks to the end to measure, rewinds, then reads up to the
    /// measured size. Returns the status and the byte count actually
    /// read; [`FileOpStatus::BufferOverflow`] means the buffer was too
    /// small and holds only the prefix that fit.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or closed (see [`FileHandle`]).
    pub fn read_file(&self, handle: FileHandle, buffer: &mut [u8]) -> (FileOpStatus, usize) {
        read_locked(&self.resolve(handle), buffer)
    }

    /// Appends the whole buffer and flushes once.
    ///
    /// Returns the status and the byte count written.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or closed.
    pub fn write_file(&self, handle: FileHandle, buffer: &[u8]) -> (FileOpStatus, usize) {
        write_locked(&self.resolve(handle), buffer)
    }

    /// Appends one byte at a time, flushing every few bytes and on the
    /// final byte.
    ///
    /// Much slower than [`Self::write_file`], but an abrupt termination
    /// can only lose the handful of bytes since the last flush, never
    /// the whole buffer.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or closed.
    pub fn write_file_unbuffered(&self, handle: FileHandle, buffer: &[u8]) -> (FileOpStatus, usize) {
        write_unbuffered_locked(&self.resolve(handle), buffer)
    }

    /// Queues an asynchronous whole-file read.
    ///
    /// Runs [`Self::read_file`] on a worker at some future time; the
    /// callback receives the status, the byte count, and the buffer
    /// back. The callback runs on an arbitrary worker thread.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or closed.
    pub fn async_read(
        &self,
        handle: FileHandle,
        mut buffer: Vec<u8>,
        callback: impl FnOnce(FileOpStatus, usize, Vec<u8>) + Send + 'static,
        immediate: bool,
    ) -> JobHandle {
        let file = self.resolve(handle);
        self.scheduler.async_do(
            move || {
                let (status, bytes_read) = read_locked(&file, &mut buffer);
                callback(status, bytes_read, buffer);
            },
            immediate,
        )
    }

    /// Queues an asynchronous buffered append.
    ///
    /// Runs [`Self::write_file`] on a worker at some future time; the
    /// callback receives the status and byte count, on an arbitrary
    /// worker thread.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or closed.
    pub fn async_write(
        &self,
        handle: FileHandle,
        buffer: Vec<u8>,
        callback: impl FnOnce(FileOpStatus, usize) + Send + 'static,
        immediate: bool,
    ) -> JobHandle {
        let file = self.resolve(handle);
        self.scheduler.async_do(
            move || {
                let (status, bytes_written) = write_locked(&file, &buffer);
                callback(status, bytes_written);
            },
            immediate,
        )
    }

    /// Queues an asynchronous unbuffered append.
    ///
    /// Runs [`Self::write_file_unbuffered`] on a worker at some future
    /// time; the callback receives the status and byte count, on an
    /// arbitrary worker thread.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or closed.
    pub fn async_write_unbuffered(
        &self,
        handle: FileHandle,
        buffer: Vec<u8>,
        callback: impl FnOnce(FileOpStatus, usize) + Send + 'static,
        immediate: bool,
    ) -> JobHandle {
        let file = self.resolve(handle);
        self.scheduler.async_do(
            move || {
                let (status, bytes_written) = write_unbuffered_locked(&file, &buffer);
                callback(status, bytes_written);
            },
            immediate,
        )
    }

    /// Attempts to cancel a queued I/O job. Delegates to the scheduler;
    /// only jobs no worker has claimed yet can be canceled.
    pub fn cancel_async_io(&self, job: JobHandle) -> bool {
        self.scheduler.cancel_async_job(job)
    }

    /// Blocks until an I/O job has finished (or been skipped).
    pub fn wait_async_io(&self, job: JobHandle) {
        self.scheduler.wait(job);
    }

    /// Looks a handle up in the registry; stale handles are fatal.
    fn resolve(&self, handle: FileHandle) -> Arc<AsyncFile> {
        self.shared
            .files
            .lock()
            .get(handle.slot)
            .cloned()
            .expect("I/O on a stale or closed file handle")
    }
}

impl Default for IoManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole-file read under the file's lock.
fn read_locked(file: &AsyncFile, buffer: &mut [u8]) -> (FileOpStatus, usize) {
    let mut state = file.state.lock();
    if state.deleted {
        return (FileOpStatus::Failed, 0);
    }
    let Some(f) = state.file.as_mut() else {
        return (FileOpStatus::Failed, 0);
    };

    // Measure, rewind, then read up to the measured size.
    let size = match f.seek(SeekFrom::End(0)) {
        Ok(size) => size as usize,
        Err(_) => return (FileOpStatus::Failed, 0),
    };
    if f.seek(SeekFrom::Start(0)).is_err() {
        return (FileOpStatus::Failed, 0);
    }

    let want = size.min(buffer.len());
    let mut bytes_read = 0;
    while bytes_read < want {
        match f.read(&mut buffer[bytes_read..want]) {
            Ok(0) => break,
            Ok(n) => bytes_read += n,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(_) => return (FileOpStatus::Failed, bytes_read),
        }
    }

    if bytes_read < size {
        (FileOpStatus::BufferOverflow, bytes_read)
    } else {
        (FileOpStatus::Success, bytes_read)
    }
}

/// Buffered append under the file's lock; one flush at the end.
fn write_locked(file: &AsyncFile, buffer: &[u8]) -> (FileOpStatus, usize) {
    let mut state = file.state.lock();
    if state.deleted {
        return (FileOpStatus::Failed, 0);
    }
    let Some(f) = state.file.as_mut() else {
        return (FileOpStatus::Failed, 0);
    };

    match f.write_all(buffer).and_then(|()| f.flush()) {
        Ok(()) => (FileOpStatus::Success, buffer.len()),
        Err(_) => (FileOpStatus::Failed, 0),
    }
}

/// Byte-at-a-time append under the file's lock, flushing every
/// [`UNBUFFERED_FLUSH_INTERVAL`] bytes and on the final byte.
fn write_unbuffered_locked(file: &AsyncFile, buffer: &[u8]) -> (FileOpStatus, usize) {
    let mut state = file.state.lock();
    if state.deleted {
        return (FileOpStatus::Failed, 0);
    }
    let Some(f) = state.file.as_mut() else {
        return (FileOpStatus::Failed, 0);
    };

    let mut bytes_written = 0;
    for (i, byte) in buffer.iter().enumerate() {
        if f.write_all(std::slice::from_ref(byte)).is_err() {
            return (FileOpStatus::Failed, bytes_written);
        }
        if bytes_written % UNBUFFERED_FLUSH_INTERVAL == 0 || i == buffer.len() - 1 {
            if f.flush().is_err() {
                return (FileOpStatus::Failed, bytes_written);
            }
        }
        bytes_written += 1;
    }

    (FileOpStatus::Success, bytes_written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("ember_io_{tag}_{id}.bin"))
    }

    #[test]
    fn test_sync_write_then_read_round_trip() {
        let io = IoManager::new();
        let path = temp_path("round_trip");

        let file = io.open_file(&path, true).unwrap();
        let payload = b"hello single threaded file!\n";

        let (status, written) = io.write_file(file, payload);
        assert_eq!(status, FileOpStatus::Success);
        assert_eq!(written, payload.len());

        let mut buffer = vec![0u8; 1024];
        let (status, read) = io.read_file(file, &mut buffer);
        assert_eq!(status, FileOpStatus::Success);
        assert_eq!(&buffer[..read], payload);

        io.close_file(file);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_read_into_small_buffer_reports_overflow() {
        let io = IoManager::new();
        let path = temp_path("overflow");

        let file = io.open_file(&path, true).unwrap();
        let (status, _) = io.write_file(file, b"0123456789");
        assert_eq!(status, FileOpStatus::Success);

        let mut buffer = vec![0u8; 4];
        let (status, read) = io.read_file(file, &mut buffer);
        assert_eq!(status, FileOpStatus::BufferOverflow);
        assert_eq!(read, 4);
        assert_eq!(&buffer[..], b"0123");

        io.close_file(file);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unbuffered_write_preserves_content() {
        let io = IoManager::new();
        let path = temp_path("unbuffered");

        let file = io.open_file(&path, true).unwrap();
        let payload = b"slow but survivable";
        let (status, written) = io.write_file_unbuffered(file, payload);
        assert_eq!(status, FileOpStatus::Success);
        assert_eq!(written, payload.len());

        let mut buffer = vec![0u8; 64];
        let (status, read) = io.read_file(file, &mut buffer);
        assert_eq!(status, FileOpStatus::Success);
        assert_eq!(&buffer[..read], payload);

        io.close_file(file);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_append_mode_accumulates_across_opens() {
        let io = IoManager::new();
        let path = temp_path("append");

        let file = io.open_file(&path, true).unwrap();
        let (status, _) = io.write_file(file, b"first.");
        assert_eq!(status, FileOpStatus::Success);
        io.close_file(file);

        // Reopen without clear: writes append.
        let file = io.open_file(&path, false).unwrap();
        let (status, _) = io.write_file(file, b"second.");
        assert_eq!(status, FileOpStatus::Success);

        let mut buffer = vec![0u8; 64];
        let (_, read) = io.read_file(file, &mut buffer);
        assert_eq!(&buffer[..read], b"first.second.");

        io.close_file(file);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_missing_path_is_none() {
        let io = IoManager::new();
        let handle = io.open_file("/definitely/not/a/real/dir/x.bin", false);
        assert!(handle.is_none());
    }

    #[test]
    #[should_panic(expected = "stale or closed file handle")]
    fn test_sync_io_on_closed_handle_panics() {
        let io = IoManager::new();
        let path = temp_path("stale");

        let file = io.open_file(&path, true).unwrap();
        io.close_file(file);
        std::fs::remove_file(&path).ok();

        let mut buffer = [0u8; 8];
        let _ = io.read_file(file, &mut buffer);
    }

    #[test]
    fn test_async_write_then_async_read() {
        let io = IoManager::new();
        let path = temp_path("async");
        let file = io.open_file(&path, true).unwrap();

        let (tx, rx) = crossbeam_channel::bounded(1);
        let write = io.async_write(
            file,
            b"async payload".to_vec(),
            move |status, bytes| {
                tx.send((status, bytes)).expect("test receiver gone");
            },
            false,
        );
        io.wait_async_io(write);
        assert_eq!(rx.recv().unwrap(), (FileOpStatus::Success, 13));

        let (tx, rx) = crossbeam_channel::bounded(1);
        let read = io.async_read(
            file,
            vec![0u8; 64],
            move |status, bytes, buffer| {
                tx.send((status, bytes, buffer)).expect("test receiver gone");
            },
            false,
        );
        io.wait_async_io(read);

        let (status, bytes, buffer) = rx.recv().unwrap();
        assert_eq!(status, FileOpStatus::Success);
        assert_eq!(&buffer[..bytes], b"async payload");

        io.close_file(file);
        std::fs::remove_file(&path).ok();
    }
}
