//! Decoder for Windows registry hive files (the `regf` format).
//!
//! The decoder works over any random-access [`HiveSource`] (a memory-mapped
//! file, an in-memory buffer, a region carved from a disk image) and exposes
//! the key/value tree:
//!
//! - [`Hive::parse`] validates the base block and the root key cell
//! - [`Hive::open_key`] walks a component path, case-insensitively
//! - [`Hive::subkeys`] / [`Hive::values`] enumerate a key
//!
//! Enumeration is strict: a damaged subkey or value cell fails the whole call
//! instead of being skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use regf::Hive;
//! use std::sync::Arc;
//!
//! let hive = Hive::parse(Arc::new(std::fs::read("NTUSER.DAT")?))?;
//! let key = hive.open_key(&["Software", "Microsoft"]).expect("key");
//! for value in hive.values(&key)? {
//!     println!("{} {}", value.name, value.value_type);
//! }
//! ```

pub mod error;
pub mod hive;
pub mod reader;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

// Re-export key types at crate root.
pub use error::{HiveError, HiveResult};
pub use hive::{BaseBlock, Hive};
pub use reader::HiveSource;
pub use types::{
    filetime_to_datetime, filetime_to_unix_nanos, utf16le_to_string, KeyNode, KeyValue, ValueType,
};
