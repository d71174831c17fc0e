//! The virtual filesystem accessor contract.
//!
//! Every evidence backend implements [`FileSystemAccessor`]. Accessors are
//! registered under a scheme in an [`AccessorRegistry`] as factories; callers
//! obtain an instance bound to their [`Scope`] and traverse with
//! [`FileSystemAccessor::read_dir`].

pub mod file;
pub mod registry;

pub use registry::{AccessorRegistry, NullAccessor, NullFactory};

use crate::entry::Entry;
use crate::error::AccessorResult;
use crate::scope::Scope;
use std::io;
use std::sync::Arc;

/// A filesystem-like view over one kind of evidence source.
pub trait FileSystemAccessor: Send + Sync {
    /// List the children of `path`.
    fn read_dir(&self, path: &str) -> AccessorResult<Vec<Entry>>;

    /// Open a leaf for byte access.
    fn open(&self, path: &str) -> AccessorResult<Arc<dyn OpenedFile>>;

    /// Describe a single path.
    fn lstat(&self, path: &str) -> AccessorResult<Entry>;

    /// Split `path` into a stable root address and the remainder below it.
    fn get_root(&self, path: &str) -> AccessorResult<(String, String)>;

    /// Tokenize a path into components.
    fn path_split(&self, path: &str) -> Vec<String>;

    /// Append one component to `root`.
    fn path_join(&self, root: &str, stem: &str) -> String;

    /// True only for the placeholder accessor.
    fn is_null(&self) -> bool {
        false
    }
}

/// Creates accessor instances bound to a scope.
pub trait AccessorFactory: Send + Sync {
    fn new_instance(
        &self,
        registry: &Arc<AccessorRegistry>,
        scope: &Scope,
    ) -> AccessorResult<Arc<dyn FileSystemAccessor>>;
}

/// An opened resource.
pub trait OpenedFile: Send + Sync {
    /// Random-access view, if the resource supports one.
    fn reader_at(self: Arc<Self>) -> Option<Arc<dyn ReaderAt>>;

    /// Release the resource. Reads through it fail afterwards.
    fn close(&self) -> AccessorResult<()>;

    fn size(&self) -> Option<u64>;
}

/// Positional reads over a resource.
pub trait ReaderAt: Send + Sync {
    /// Read up to `length` bytes at `offset`. Short reads happen at the end.
    fn read_at(&self, offset: u64, length: usize) -> io::Result<Vec<u8>>;

    fn size(&self) -> u64;
}

/// Register the built-in accessors in the global registry.
///
/// Called once by the composition root; calling it again is harmless.
pub fn init() {
    let registry = AccessorRegistry::global();
    registry.register(file::FILE_SCHEME, Arc::new(file::FileFactory));
    registry.register(
        crate::raw_registry::RAW_REG_SCHEME,
        Arc::new(crate::raw_registry::RawRegFactory),
    );
    tracing::debug!("accessors registered: {:?}", registry.schemes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_registers_builtins() {
        init();
        init();
        let registry = AccessorRegistry::global();
        assert!(registry.contains("file"));
        assert!(registry.contains("raw_reg"));
    }
}
