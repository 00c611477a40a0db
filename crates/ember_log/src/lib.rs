//! # EMBER Logger
//!
//! A line-oriented logger writing through the core's async file layer.
//! Every line is `[<LEVEL>][<Dow, dd.mm.yyyy HH:MM:SS>]<message>` plus a
//! newline, and startup stamps one header line into the file. Writes go
//! through the unbuffered path, so an abrupt termination loses at most
//! the last few bytes - never the whole backlog.
//!
//! Multiple loggers are fine; there is nothing singleton here.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_log::{Logger, LogLevel};
//!
//! let mut logger = Logger::new();
//! logger.start_up("engine.log", Arc::clone(&io));
//!
//! logger.log("subsystems online", LogLevel::Info);
//! logger.log_async("streaming chunk 42", false, LogLevel::Debug);
//!
//! logger.shut_down(); // waits for queued writes, closes the file
//! ```

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use ember_core::io::{FileHandle, FileOpStatus, IoManager};
use ember_core::strings::{intern, StrId};

/// Severity of one log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Routine operational messages.
    Info,
    /// Developer detail.
    Debug,
    /// Something looks wrong but the show goes on.
    Warn,
    /// An operation failed.
    Error,
    /// The process is going down.
    Fatal,
}

impl LogLevel {
    /// The bracketed tag written at the start of a line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "[INFO]",
            Self::Debug => "[DEBUG]",
            Self::Warn => "[WARNING]",
            Self::Error => "[ERROR]",
            Self::Fatal => "[FATAL]",
        }
    }
}

/// Tracks writes that have been queued but not yet completed, so
/// shutdown knows when the file is quiet.
struct Outstanding {
    /// Queued-minus-completed async writes.
    count: Mutex<usize>,
    /// Signaled by completion callbacks.
    cond: Condvar,
}

impl Outstanding {
    /// Registers one queued write. Counted *before* submission so a
    /// fast completion can never be missed.
    fn add(&self) {
        *self.count.lock() += 1;
    }

    /// Marks one write complete and wakes the drain, if any.
    fn done(&self) {
        *self.count.lock() -= 1;
        self.cond.notify_all();
    }

    /// Blocks until every registered write has completed.
    fn drain(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.cond.wait(&mut count);
        }
    }
}

/// A logger bound to one log file.
pub struct Logger {
    /// The I/O layer carrying the writes; set by [`Self::start_up`].
    io: Option<Arc<IoManager>>,
    /// The open log file.
    file: Option<FileHandle>,
    /// Interned log path, kept for diagnostics.
    path: Option<StrId>,
    /// In-flight async writes; shared with completion callbacks.
    outstanding: Arc<Outstanding>,
}

impl Logger {
    /// Creates an idle logger; nothing is open until
    /// [`Self::start_up`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            io: None,
            file: None,
            path: None,
            outstanding: Arc::new(Outstanding {
                count: Mutex::new(0),
                cond: Condvar::new(),
            }),
        }
    }

    /// Opens the log file in append mode and stamps the run header.
    ///
    /// # Panics
    ///
    /// Panics if the logger is already started or the file cannot be
    /// opened.
    pub fn start_up(&mut self, log_path: &str, io: Arc<IoManager>) {
        assert!(self.io.is_none(), "logger already started");
        assert!(self.file.is_none(), "logger already started");

        let file = io
            .open_file(log_path, false)
            .expect("failed to open log file");

        self.path = Some(intern(log_path));
        self.file = Some(file);

        let header = format!("-------Log Start: {}------\n", time_str());
        let outstanding = Arc::clone(&self.outstanding);
        outstanding.add();
        let _ = io.async_write_unbuffered(
            file,
            header.into_bytes(),
            move |status, _| {
                assert_ne!(status, FileOpStatus::Failed, "logger failed to start");
                outstanding.done();
            },
            false,
        );

        self.io = Some(io);
    }

    /// Waits for every outstanding async write, then closes the file
    /// and returns the logger to idle.
    ///
    /// # Panics
    ///
    /// Panics if the logger was never started.
    pub fn shut_down(&mut self) {
        let io = self.io.take().expect("logger not started");
        let file = self.file.take().expect("logger not started");

        self.outstanding.drain();
        io.close_file(file);
        self.path = None;
    }

    /// Returns the interned path of the open log file.
    #[must_use]
    pub fn log_path(&self) -> Option<StrId> {
        self.path
    }

    /// Writes one line synchronously.
    ///
    /// Blocks until the bytes are flushed; the level tag and timestamp
    /// are prepended automatically.
    ///
    /// # Panics
    ///
    /// Panics if the logger was never started.
    pub fn log(&self, msg: &str, level: LogLevel) {
        let io = self.io.as_ref().expect("logger not started");
        let file = self.file.expect("logger not started");

        let line = format_line(msg, level);
        let (status, _) = io.write_file_unbuffered(file, line.as_bytes());
        assert_ne!(status, FileOpStatus::Failed, "logger failed to write");
    }

    /// Queues one line for asynchronous writing.
    ///
    /// Returns immediately; `immediate` expedites the write to the
    /// front of the job queue. The level tag and timestamp are stamped
    /// now, not when the write lands.
    ///
    /// # Panics
    ///
    /// Panics if the logger was never started.
    pub fn log_async(&self, msg: &str, immediate: bool, level: LogLevel) {
        let io = self.io.as_ref().expect("logger not started");
        let file = self.file.expect("logger not started");

        let line = format_line(msg, level);
        let outstanding = Arc::clone(&self.outstanding);
        outstanding.add();
        let _ = io.async_write_unbuffered(
            file,
            line.into_bytes(),
            move |status, _| {
                // TODO: a failed log write shouldn't take the process down
                assert_ne!(status, FileOpStatus::Failed, "logger failed to write");
                outstanding.done();
            },
            immediate,
        );
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds one full log line: level tag, timestamp, message, newline.
fn format_line(msg: &str, level: LogLevel) -> String {
    format!("{}{}{msg}\n", level.label(), time_str())
}

/// The bracketed wall-clock stamp, e.g. `[Mon, 15.06.2009 20:20:00]`.
fn time_str() -> String {
    chrono::Local::now()
        .format("[%a, %d.%m.%Y %H:%M:%S]")
        .to_string()
}
