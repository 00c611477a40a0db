//! # String Interning
//!
//! Process-wide table mapping stable 64-bit ids to their strings, so
//! hot paths compare and hash ids instead of string bytes.
//!
//! The table is global state by design: interned entries live for the
//! process lifetime and are never evicted. That unbounded growth is an
//! accepted tradeoff - intern names, paths and keys, not user input.
//! Strings must be interned before their ids can be resolved; resolving
//! an unknown id is a contract violation and fatal.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// A stable id for an interned string.
pub type StrId = u64;

/// The process-wide table, created on first use.
fn table() -> &'static Mutex<HashMap<StrId, Arc<str>>> {
    static TABLE: OnceLock<Mutex<HashMap<StrId, Arc<str>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Interns a string and returns its id.
///
/// Interning the same string again is a no-op that returns the same id.
#[must_use]
pub fn intern(value: &str) -> StrId {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    let id = hasher.finish();

    table().lock().entry(id).or_insert_with(|| Arc::from(value));
    id
}

/// Returns the string a previously interned id stands for.
///
/// # Panics
///
/// Panics if the id was never produced by [`intern`] in this process.
#[must_use]
pub fn resolve(id: StrId) -> Arc<str> {
    table()
        .lock()
        .get(&id)
        .cloned()
        .expect("strings must be interned before they can be resolved")
}
