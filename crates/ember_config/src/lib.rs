//! # EMBER Configuration Store
//!
//! A flat key/value store of engine and per-user variables, persisted as
//! a headerless sequence of fixed 68-byte binary records. Loading and
//! saving go through the core's async file layer, with record bytes
//! staged in the frame allocator.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_config::{ConfigManager, SVar, SVAR_PERSIST};
//! use ember_core::strings::intern;
//!
//! let mut config = ConfigManager::new();
//! config.start_up(&io, &frame);
//!
//! config.add_svar(SVar::numeric(intern("render.fov"), 90.0, SVAR_PERSIST));
//!
//! config.shut_down(&io, &frame); // persisted vars hit disk here
//! ```

pub mod manager;
pub mod svar;

pub use manager::ConfigManager;
pub use svar::{SVar, SVarRecord, SVarValue, RECORD_SIZE, SVAR_NUMERIC, SVAR_PERSIST, USER_CONF};
