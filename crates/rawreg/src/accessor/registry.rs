//! Scheme → accessor factory registry.

use super::{AccessorFactory, FileSystemAccessor, OpenedFile};
use crate::entry::Entry;
use crate::error::{AccessorError, AccessorResult};
use crate::scope::Scope;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Maps scheme names to accessor factories.
///
/// Schemes are kept ordered so listings are stable.
#[derive(Default)]
pub struct AccessorRegistry {
    factories: RwLock<BTreeMap<String, Arc<dyn AccessorFactory>>>,
}

impl std::fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<AccessorRegistry>> = OnceLock::new();

impl AccessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<AccessorRegistry> {
        GLOBAL.get_or_init(|| Arc::new(AccessorRegistry::new())).clone()
    }

    /// Register a factory, replacing any previous one for `scheme`.
    pub fn register(&self, scheme: impl Into<String>, factory: Arc<dyn AccessorFactory>) {
        self.factories.write().insert(scheme.into(), factory);
    }

    /// Create an instance of the accessor for `scheme`, bound to `scope`.
    pub fn resolve(
        self: &Arc<Self>,
        scheme: &str,
        scope: &Scope,
    ) -> AccessorResult<Arc<dyn FileSystemAccessor>> {
        let factory = self
            .factories
            .read()
            .get(scheme)
            .cloned()
            .ok_or_else(|| AccessorError::UnknownAccessor(scheme.to_string()))?;
        factory.new_instance(self, scope)
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.factories.read().contains_key(scheme)
    }

    pub fn schemes(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }
}

/// Placeholder accessor that supports nothing.
#[derive(Debug, Default)]
pub struct NullAccessor;

const NULL_SCHEME: &str = "null";

impl FileSystemAccessor for NullAccessor {
    fn read_dir(&self, _path: &str) -> AccessorResult<Vec<Entry>> {
        Err(AccessorError::not_implemented("read_dir", NULL_SCHEME))
    }

    fn open(&self, _path: &str) -> AccessorResult<Arc<dyn OpenedFile>> {
        Err(AccessorError::not_implemented("open", NULL_SCHEME))
    }

    fn lstat(&self, _path: &str) -> AccessorResult<Entry> {
        Err(AccessorError::not_implemented("lstat", NULL_SCHEME))
    }

    fn get_root(&self, path: &str) -> AccessorResult<(String, String)> {
        Ok((String::new(), path.to_string()))
    }

    fn path_split(&self, path: &str) -> Vec<String> {
        vec![path.to_string()]
    }

    fn path_join(&self, root: &str, stem: &str) -> String {
        format!("{}{}", root, stem)
    }

    fn is_null(&self) -> bool {
        true
    }
}

/// Factory for [`NullAccessor`].
#[derive(Debug, Default)]
pub struct NullFactory;

impl AccessorFactory for NullFactory {
    fn new_instance(
        &self,
        _registry: &Arc<AccessorRegistry>,
        _scope: &Scope,
    ) -> AccessorResult<Arc<dyn FileSystemAccessor>> {
        Ok(Arc::new(NullAccessor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = Arc::new(AccessorRegistry::new());
        registry.register("null", Arc::new(NullFactory));
        assert!(registry.contains("null"));
        assert_eq!(registry.schemes(), vec!["null".to_string()]);

        let scope = Scope::new();
        let accessor = registry.resolve("null", &scope).unwrap();
        assert!(accessor.is_null());
        assert!(matches!(
            accessor.read_dir("x"),
            Err(AccessorError::NotImplemented { .. })
        ));
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = Arc::new(AccessorRegistry::new());
        let scope = Scope::new();
        match registry.resolve("ntfs", &scope) {
            Err(AccessorError::UnknownAccessor(s)) => assert_eq!(s, "ntfs"),
            other => panic!("expected UnknownAccessor, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_schemes_sorted() {
        let registry = AccessorRegistry::new();
        registry.register("zip", Arc::new(NullFactory));
        registry.register("auto", Arc::new(NullFactory));
        registry.register("file", Arc::new(NullFactory));
        assert_eq!(registry.schemes(), vec!["auto", "file", "zip"]);
    }
}
