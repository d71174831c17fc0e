//! The `raw_reg` accessor: registry hives as a directory tree.
//!
//! Paths have the form `delegate:hive_path#Key/Subkey`. The delegate scheme
//! (usually `file`) opens the hive file; the fragment names a key inside it.
//! Keys list as directories, values as leaves with decoded payloads.
//!
//! ```rust,ignore
//! let accessor = registry.resolve("raw_reg", &scope)?;
//! for entry in accessor.read_dir("file:///cases/42/SOFTWARE#Microsoft/Windows")? {
//!     println!("{} {}", entry.full_path(), entry.data());
//! }
//! ```

pub mod cache;
pub mod value;

pub use cache::{CachedHive, HiveCache};
pub use value::{decode_value, MAX_EMBEDDED_REG_VALUE};

use crate::accessor::{AccessorFactory, AccessorRegistry, FileSystemAccessor, OpenedFile};
use crate::entry::Entry;
use crate::error::{AccessorError, AccessorResult};
use crate::path::{self, VirtualPath};
use crate::scope::{Scope, TeardownGuard};
use std::sync::{Arc, Weak};
use tracing::debug;

pub const RAW_REG_SCHEME: &str = "raw_reg";

/// Accessor instance bound to one scope.
pub struct RawRegAccessor {
    cache: Arc<HiveCache>,
    /// Fires and joins the teardown watcher when the instance goes away.
    _teardown: TeardownGuard,
}

impl RawRegAccessor {
    pub fn new(registry: Arc<AccessorRegistry>, scope: &Scope) -> AccessorResult<Self> {
        let cache = Arc::new(HiveCache::new(registry, scope.clone()));
        let watched: Weak<HiveCache> = Arc::downgrade(&cache);
        let teardown = scope.on_cancel(move || {
            if let Some(cache) = watched.upgrade() {
                cache.teardown();
            }
        })?;
        Ok(RawRegAccessor {
            cache,
            _teardown: teardown,
        })
    }

    /// Number of hives currently held open.
    pub fn cached_hives(&self) -> usize {
        self.cache.len()
    }
}

impl FileSystemAccessor for RawRegAccessor {
    fn read_dir(&self, key_path: &str) -> AccessorResult<Vec<Entry>> {
        let vpath = VirtualPath::parse(key_path)?;
        let cached = self.cache.get_hive(&vpath)?;
        let hive = &cached.hive;

        let components = path::split_components(&vpath.fragment);
        let key = hive
            .open_key(&components)
            .ok_or_else(|| AccessorError::KeyNotFound(key_path.to_string()))?;

        let subkeys = hive
            .subkeys(&key)
            .map_err(|e| AccessorError::parse_failure(key_path, e))?;
        let values = hive
            .values(&key)
            .map_err(|e| AccessorError::parse_failure(key_path, e))?;

        let parent = Arc::new(key);
        let mut entries = Vec::with_capacity(subkeys.len() + values.len());
        for subkey in &subkeys {
            entries.push(Entry::key(subkey, path::path_join(key_path, &subkey.name)));
        }
        for value in &values {
            entries.push(Entry::value(
                value,
                parent.clone(),
                path::path_join(key_path, &value.name),
            ));
        }
        debug!(
            "raw_reg: '{}' -> {} subkeys, {} values",
            key_path,
            subkeys.len(),
            values.len()
        );
        Ok(entries)
    }

    fn open(&self, _path: &str) -> AccessorResult<Arc<dyn OpenedFile>> {
        Err(AccessorError::not_implemented("open", RAW_REG_SCHEME))
    }

    fn lstat(&self, _path: &str) -> AccessorResult<Entry> {
        Err(AccessorError::not_implemented("lstat", RAW_REG_SCHEME))
    }

    fn get_root(&self, path: &str) -> AccessorResult<(String, String)> {
        path::get_root(path)
    }

    fn path_split(&self, path: &str) -> Vec<String> {
        path::split_components(path)
    }

    fn path_join(&self, root: &str, stem: &str) -> String {
        path::path_join(root, stem)
    }
}

/// Factory registered under [`RAW_REG_SCHEME`].
#[derive(Debug, Default)]
pub struct RawRegFactory;

impl AccessorFactory for RawRegFactory {
    fn new_instance(
        &self,
        registry: &Arc<AccessorRegistry>,
        scope: &Scope,
    ) -> AccessorResult<Arc<dyn FileSystemAccessor>> {
        Ok(Arc::new(RawRegAccessor::new(registry.clone(), scope)?))
    }
}
