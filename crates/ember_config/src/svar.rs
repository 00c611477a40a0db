//! # SVars
//!
//! One configuration variable: an interned name, a value that is either
//! a float or an interned string, and a `u32` flag mask. The on-disk
//! shape is the fixed 68-byte record below; files are a headerless run
//! of such records and the record count is simply `file_size / 68`.

use bytemuck::{Pod, Zeroable};
use ember_core::strings::{intern, resolve, StrId};

/// The variable is written back to its config file at shutdown.
pub const SVAR_PERSIST: u32 = 1;

/// The variable belongs to the per-user config, not the engine config.
pub const USER_CONF: u32 = 1 << 1;

/// The value field holds a float, not a string. Maintained by the
/// constructors and setters; a mask passed in with this bit wrong is
/// silently corrected.
pub const SVAR_NUMERIC: u32 = 1 << 2;

/// Serialized size of one variable in bytes.
pub const RECORD_SIZE: usize = 68;

/// Width of the name and value fields, including the NUL terminator.
const FIELD_LEN: usize = 32;

/// Longest name or string value that fits a field.
const MAX_STR_LEN: usize = FIELD_LEN - 1;

/// The 68-byte on-disk shape of one variable.
///
/// | offset | size | field |
/// |---|---|---|
/// | 0 | 32 | name, NUL-terminated |
/// | 32 | 32 | little-endian `f32` in the first 4 bytes, or a NUL-terminated string |
/// | 64 | 4 | little-endian `u32` flag mask |
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SVarRecord {
    /// NUL-terminated variable name.
    name: [u8; FIELD_LEN],
    /// Float bytes or NUL-terminated string, selected by the flags.
    value: [u8; FIELD_LEN],
    /// Little-endian flag mask.
    flags: [u8; 4],
}

/// The value a variable carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SVarValue {
    /// A numeric value.
    Numeric(f32),
    /// An interned string value.
    Text(StrId),
}

/// One configuration variable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SVar {
    /// Interned name, the store's key.
    name: StrId,
    /// Current value.
    value: SVarValue,
    /// Flag mask; the NUMERIC bit always tracks the value variant.
    flags: u32,
}

impl SVar {
    /// Creates a numeric variable.
    ///
    /// The NUMERIC bit is forced on regardless of `flag_mask`.
    #[must_use]
    pub fn numeric(name: StrId, value: f32, flag_mask: u32) -> Self {
        Self {
            name,
            value: SVarValue::Numeric(value),
            flags: flag_mask | SVAR_NUMERIC,
        }
    }

    /// Creates a string variable.
    ///
    /// The NUMERIC bit is forced off regardless of `flag_mask`.
    #[must_use]
    pub fn text(name: StrId, value: StrId, flag_mask: u32) -> Self {
        Self {
            name,
            value: SVarValue::Text(value),
            flags: flag_mask & !SVAR_NUMERIC,
        }
    }

    /// Returns the interned name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> StrId {
        self.name
    }

    /// Returns the value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> SVarValue {
        self.value
    }

    /// Returns the numeric value, or `None` for string variables.
    #[must_use]
    pub fn float_val(&self) -> Option<f32> {
        match self.value {
            SVarValue::Numeric(value) => Some(value),
            SVarValue::Text(_) => None,
        }
    }

    /// Returns the string value, or `None` for numeric variables.
    #[must_use]
    pub fn str_val(&self) -> Option<StrId> {
        match self.value {
            SVarValue::Text(value) => Some(value),
            SVarValue::Numeric(_) => None,
        }
    }

    /// Replaces the value with a float, forcing the NUMERIC bit on.
    pub fn set_float_val(&mut self, value: f32) {
        self.value = SVarValue::Numeric(value);
        self.set_flag(SVAR_NUMERIC);
    }

    /// Replaces the value with a string, forcing the NUMERIC bit off.
    pub fn set_str_val(&mut self, value: StrId) {
        self.value = SVarValue::Text(value);
        self.clear_flag(SVAR_NUMERIC);
    }

    /// Returns the whole flag mask.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// Sets the given flag bits.
    #[inline]
    pub fn set_flag(&mut self, flag: u32) {
        self.flags |= flag;
    }

    /// Clears the given flag bits.
    #[inline]
    pub fn clear_flag(&mut self, flag: u32) {
        self.flags &= !flag;
    }

    /// Returns true if any of the given flag bits are set.
    #[inline]
    #[must_use]
    pub const fn has_flag(&self, flag: u32) -> bool {
        (self.flags & flag) != 0
    }

    /// Serializes the variable to its 68-byte record.
    ///
    /// # Panics
    ///
    /// Panics if the name, or a string value, exceeds 31 bytes.
    #[must_use]
    pub fn to_record(&self) -> SVarRecord {
        let mut record = SVarRecord::zeroed();

        write_c_str(&mut record.name, &resolve(self.name), "SVar name");
        match self.value {
            SVarValue::Numeric(value) => {
                record.value[..4].copy_from_slice(&value.to_le_bytes());
            }
            SVarValue::Text(value) => {
                write_c_str(&mut record.value, &resolve(value), "SVar string value");
            }
        }
        record.flags = self.flags.to_le_bytes();

        record
    }

    /// Reconstructs a variable from a record written by
    /// [`Self::to_record`], interning the strings it carries.
    ///
    /// # Panics
    ///
    /// Panics if a string field is not UTF-8 - config records are a
    /// trusted format and a malformed one is a fatal precondition
    /// violation.
    #[must_use]
    pub fn from_record(record: &SVarRecord) -> Self {
        let name = intern(read_c_str(&record.name));
        let flags = u32::from_le_bytes(record.flags);

        if flags & SVAR_NUMERIC != 0 {
            let mut float_bytes = [0u8; 4];
            float_bytes.copy_from_slice(&record.value[..4]);
            Self::numeric(name, f32::from_le_bytes(float_bytes), flags)
        } else {
            Self::text(name, intern(read_c_str(&record.value)), flags)
        }
    }
}

/// Copies a string into a fixed field, NUL-terminated.
fn write_c_str(field: &mut [u8; FIELD_LEN], value: &str, what: &str) {
    assert!(
        value.len() <= MAX_STR_LEN,
        "{what} exceeds {MAX_STR_LEN} bytes"
    );
    field[..value.len()].copy_from_slice(value.as_bytes());
    // Remaining bytes are already zero; the terminator is implicit.
}

/// Reads a NUL-terminated string out of a fixed field.
fn read_c_str(field: &[u8; FIELD_LEN]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(FIELD_LEN);
    std::str::from_utf8(&field[..end]).expect("config record string is not UTF-8")
}
