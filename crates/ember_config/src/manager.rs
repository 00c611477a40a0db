//! # Config Manager
//!
//! Builds up the map of SVars from two record files - an engine-scoped
//! one and a per-user one - and writes the persistent subset back out at
//! shutdown. File traffic goes through the async file layer; record
//! bytes are staged in frame-allocator regions on the way in and out.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use ember_core::io::{FileOpStatus, IoManager};
use ember_core::memory::{FrameAllocator, FrameRef};
use ember_core::strings::{intern, resolve, StrId};

use crate::svar::{SVar, SVarRecord, RECORD_SIZE, SVAR_PERSIST, USER_CONF};

/// Default path of the engine-scoped record file.
pub const ENGINE_CFG_PATH: &str = "engine.cfg";

/// Default path of the per-user record file.
pub const USER_CFG_PATH: &str = "user.cfg";

/// Staging-buffer size for loads and saves; bounds a config file to
/// `CFG_BUF_SIZE / 68` records.
const CFG_BUF_SIZE: usize = 10240;

/// The flat key/value configuration store.
///
/// Variables are keyed by their interned name. Loading never overwrites
/// a variable that is already present, so anything added before
/// [`Self::start_up`] wins over the file contents.
pub struct ConfigManager {
    /// All known variables.
    svars: HashMap<StrId, SVar>,
    /// Interned path of the engine record file.
    engine_path: StrId,
    /// Interned path of the user record file.
    user_path: StrId,
}

impl ConfigManager {
    /// Creates a store over the default `engine.cfg` / `user.cfg` paths.
    #[must_use]
    pub fn new() -> Self {
        Self::with_paths(ENGINE_CFG_PATH, USER_CFG_PATH)
    }

    /// Creates a store over explicit record-file paths.
    #[must_use]
    pub fn with_paths(engine_path: &str, user_path: &str) -> Self {
        Self {
            svars: HashMap::new(),
            engine_path: intern(engine_path),
            user_path: intern(user_path),
        }
    }

    /// Loads both record files.
    ///
    /// Each file is read asynchronously, staged into a frame-allocator
    /// region and parsed. A missing file is an empty config, not an
    /// error.
    ///
    /// # Panics
    ///
    /// Panics if a read fails, or a file's size is not a whole number of
    /// records - both are fatal precondition violations.
    pub fn start_up(&mut self, io: &IoManager, frame: &FrameAllocator) {
        self.load_file(io, frame, self.engine_path);
        self.load_file(io, frame, self.user_path);
    }

    /// Persists every variable carrying [`SVAR_PERSIST`].
    ///
    /// Variables with [`USER_CONF`] go to the user file, the rest to the
    /// engine file; both files are truncated and rewritten. Records are
    /// staged in frame-allocator regions, then written asynchronously
    /// and waited on.
    ///
    /// # Panics
    ///
    /// Panics if a file cannot be opened for writing, a write fails, or
    /// the persistent set outgrows the staging buffer.
    pub fn shut_down(&mut self, io: &IoManager, frame: &FrameAllocator) {
        let engine_region = frame
            .alloc(CFG_BUF_SIZE)
            .expect("frame budget too small for config save");
        let user_region = frame
            .alloc(CFG_BUF_SIZE)
            .expect("frame budget too small for config save");

        let mut engine_count = 0usize;
        let mut user_count = 0usize;

        for sv in self.svars.values() {
            if !sv.has_flag(SVAR_PERSIST) {
                continue;
            }

            let (region, count) = if sv.has_flag(USER_CONF) {
                (user_region, &mut user_count)
            } else {
                (engine_region, &mut engine_count)
            };

            let offset = *count * RECORD_SIZE;
            assert!(
                offset + RECORD_SIZE <= CFG_BUF_SIZE,
                "persistent SVars outgrew the config staging buffer"
            );

            let record = sv.to_record();
            frame.bytes_mut(region, offset + RECORD_SIZE)[offset..]
                .copy_from_slice(bytemuck::bytes_of(&record));
            *count += 1;
        }

        persist_records(io, frame, self.engine_path, engine_region, engine_count);
        persist_records(io, frame, self.user_path, user_region, user_count);

        frame.free_to(engine_region);
    }

    /// Returns true if a variable with this name exists.
    #[must_use]
    pub fn contains_svar(&self, name: StrId) -> bool {
        self.svars.contains_key(&name)
    }

    /// Returns the variable with this name, if any.
    #[must_use]
    pub fn svar(&self, name: StrId) -> Option<&SVar> {
        self.svars.get(&name)
    }

    /// Returns the variable with this name mutably, if any.
    pub fn svar_mut(&mut self, name: StrId) -> Option<&mut SVar> {
        self.svars.get_mut(&name)
    }

    /// Adds a variable unless one with the same name already exists.
    ///
    /// Silently keeps the existing variable on a name clash.
    pub fn add_svar(&mut self, sv: SVar) {
        self.svars.entry(sv.name()).or_insert(sv);
    }

    /// Removes the variable with this name, if present.
    pub fn remove_svar(&mut self, name: StrId) {
        self.svars.remove(&name);
    }

    /// Reads one record file and folds its variables into the map.
    fn load_file(&mut self, io: &IoManager, frame: &FrameAllocator, path: StrId) {
        // Missing file: nothing to load.
        let Some(file) = io.open_file(&*resolve(path), false) else {
            return;
        };

        let result = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&result);
        let job = io.async_read(
            file,
            vec![0u8; CFG_BUF_SIZE],
            move |status, bytes_read, buffer| {
                assert_eq!(
                    status,
                    FileOpStatus::Success,
                    "error while reading config file"
                );
                *slot.lock() = Some((bytes_read, buffer));
            },
            false,
        );

        io.wait_async_io(job);
        io.close_file(file);

        let (bytes_read, buffer) = result.lock().take().expect("config read never completed");

        // Stage in the frame allocator and parse from there.
        let region = frame
            .alloc(CFG_BUF_SIZE)
            .expect("frame budget too small for config load");
        frame
            .bytes_mut(region, bytes_read)
            .copy_from_slice(&buffer[..bytes_read]);
        {
            let staged = frame.bytes(region, bytes_read);
            self.process_config_buffer(&staged);
        }
        frame.free_to(region);
    }

    /// Parses a run of records and adds each variable.
    ///
    /// # Panics
    ///
    /// Panics if the byte count is not a whole number of records.
    fn process_config_buffer(&mut self, buffer: &[u8]) {
        assert!(
            buffer.len() % RECORD_SIZE == 0,
            "config bytes are not a whole number of records"
        );

        for chunk in buffer.chunks_exact(RECORD_SIZE) {
            let record: &SVarRecord = bytemuck::from_bytes(chunk);
            self.add_svar(SVar::from_record(record));
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate-writes `count` staged records to one record file.
fn persist_records(
    io: &IoManager,
    frame: &FrameAllocator,
    path: StrId,
    region: FrameRef,
    count: usize,
) {
    let path = resolve(path);
    let file = io
        .open_file(&*path, true)
        .expect("failed to open config file for writing");

    let payload = frame.bytes(region, count * RECORD_SIZE).to_vec();
    let job = io.async_write(
        file,
        payload,
        |status, _| {
            assert_eq!(
                status,
                FileOpStatus::Success,
                "error while writing config file"
            );
        },
        false,
    );

    io.wait_async_io(job);
    io.close_file(file);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_get_remove() {
        let mut config = ConfigManager::new();
        let name = intern("cfg.test.add");

        assert!(!config.contains_svar(name));
        config.add_svar(SVar::numeric(name, 1.5, 0));
        assert!(config.contains_svar(name));
        assert_eq!(config.svar(name).unwrap().float_val(), Some(1.5));

        config.remove_svar(name);
        assert!(!config.contains_svar(name));
    }

    #[test]
    fn test_add_does_not_overwrite() {
        let mut config = ConfigManager::new();
        let name = intern("cfg.test.overwrite");

        config.add_svar(SVar::numeric(name, 32.0, 0));
        config.add_svar(SVar::numeric(name, 42.0, 0));

        assert_eq!(config.svar(name).unwrap().float_val(), Some(32.0));
    }

    #[test]
    fn test_svar_mut_edits_in_place() {
        let mut config = ConfigManager::new();
        let name = intern("cfg.test.mut");

        config.add_svar(SVar::numeric(name, 0.0, SVAR_PERSIST));
        config.svar_mut(name).unwrap().clear_flag(SVAR_PERSIST);

        assert!(!config.svar(name).unwrap().has_flag(SVAR_PERSIST));
    }

    #[test]
    fn test_process_buffer_parses_records() {
        let mut config = ConfigManager::new();
        let sv = SVar::numeric(intern("cfg.test.parse"), 7.0, SVAR_PERSIST);

        let record = sv.to_record();
        config.process_config_buffer(bytemuck::bytes_of(&record));

        assert_eq!(
            config.svar(intern("cfg.test.parse")).unwrap().float_val(),
            Some(7.0)
        );
    }

    #[test]
    #[should_panic(expected = "whole number of records")]
    fn test_misaligned_buffer_panics() {
        let mut config = ConfigManager::new();
        config.process_config_buffer(&[0u8; 67]);
    }
}
