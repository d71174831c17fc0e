//! rawreg: virtual filesystem accessors for forensic evidence.
//!
//! Evidence sources are browsed through one uniform, filesystem-like
//! interface ([`accessor::FileSystemAccessor`]). This crate provides the
//! accessor contract and registry, cancellation scopes, a local `file`
//! accessor, and the `raw_reg` accessor that presents a registry hive's
//! keys and values as a directory tree.

pub mod accessor;
pub mod entry;
pub mod error;
pub mod path;
pub mod raw_registry;
pub mod scope;
pub mod server;

pub use accessor::{AccessorRegistry, FileSystemAccessor};
pub use entry::{Entry, TimeVal, ValueData};
pub use error::{AccessorError, AccessorResult};
pub use scope::{Scope, TeardownGuard};
