//! Per-instance cache of opened, parsed hives.

use crate::accessor::{AccessorRegistry, OpenedFile, ReaderAt};
use crate::error::{AccessorError, AccessorResult};
use crate::path::VirtualPath;
use crate::scope::Scope;
use parking_lot::Mutex;
use regf::{Hive, HiveSource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A parsed hive together with the resource it was parsed from.
pub struct CachedHive {
    pub hive: Hive,
    pub base_address: String,
    file: Arc<dyn OpenedFile>,
}

impl std::fmt::Debug for CachedHive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedHive")
            .field("base_address", &self.base_address)
            .field("hive", &self.hive)
            .finish()
    }
}

/// Adapts a delegate's random-access view to the hive decoder.
struct ReaderAtSource(Arc<dyn ReaderAt>);

impl HiveSource for ReaderAtSource {
    fn read(
        &self,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0.read_at(offset, length)?)
    }

    fn size(&self) -> u64 {
        self.0.size()
    }
}

#[derive(Default)]
struct CacheState {
    hives: HashMap<String, Arc<CachedHive>>,
    torn_down: bool,
}

/// Hives keyed by base address (the virtual path with its fragment cleared).
///
/// One lock serializes every lookup and insert, and opening plus parsing
/// happen under it, so each base address is opened at most once.
pub struct HiveCache {
    state: Mutex<CacheState>,
    registry: Arc<AccessorRegistry>,
    /// Scope handed to delegate accessors.
    scope: Scope,
}

impl HiveCache {
    pub fn new(registry: Arc<AccessorRegistry>, scope: Scope) -> Self {
        HiveCache {
            state: Mutex::new(CacheState::default()),
            registry,
            scope,
        }
    }

    /// Look up the hive for `vpath`, opening and parsing it on a miss.
    pub fn get_hive(&self, vpath: &VirtualPath) -> AccessorResult<Arc<CachedHive>> {
        let base_address = vpath.base_address();
        let mut state = self.state.lock();
        if state.torn_down {
            return Err(AccessorError::Cancelled);
        }
        if let Some(cached) = state.hives.get(&base_address) {
            debug!("raw_reg: cache hit for '{}'", base_address);
            return Ok(cached.clone());
        }

        debug!("raw_reg: cache miss for '{}'", base_address);
        let cached = Arc::new(self.open_hive(vpath, base_address.clone())?);
        state.hives.insert(base_address, cached.clone());
        Ok(cached)
    }

    fn open_hive(&self, vpath: &VirtualPath, base_address: String) -> AccessorResult<CachedHive> {
        let delegate = match self.registry.resolve(&vpath.scheme, &self.scope) {
            Ok(accessor) if !accessor.is_null() => accessor,
            Ok(_) | Err(AccessorError::UnknownAccessor(_)) => {
                return Err(AccessorError::UnknownAccessor(vpath.scheme.clone()))
            }
            Err(e) => return Err(e),
        };

        let file = delegate.open(&vpath.path)?;
        let reader = match file.clone().reader_at() {
            Some(reader) => reader,
            None => {
                close_quietly(file.as_ref(), &base_address);
                return Err(AccessorError::NotSeekable(base_address));
            }
        };

        let hive = match Hive::parse(Arc::new(ReaderAtSource(reader))) {
            Ok(hive) => hive,
            Err(e) => {
                close_quietly(file.as_ref(), &base_address);
                return Err(AccessorError::parse_failure(base_address, e));
            }
        };
        debug!("raw_reg: opened hive '{}'", base_address);

        Ok(CachedHive {
            hive,
            base_address,
            file,
        })
    }

    /// Close every cached resource and refuse further opens.
    ///
    /// Returns the number of hives released. Safe to call more than once.
    pub fn teardown(&self) -> usize {
        let mut state = self.state.lock();
        state.torn_down = true;
        let released = state.hives.len();
        for (address, cached) in state.hives.drain() {
            close_quietly(cached.file.as_ref(), &address);
        }
        if released > 0 {
            debug!("raw_reg: released {} cached hive(s)", released);
        }
        released
    }

    pub fn len(&self) -> usize {
        self.state.lock().hives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_torn_down(&self) -> bool {
        self.state.lock().torn_down
    }
}

impl Drop for HiveCache {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn close_quietly(file: &dyn OpenedFile, address: &str) {
    if let Err(e) = file.close() {
        warn!("raw_reg: failed to close '{}': {}", address, e);
    }
}
