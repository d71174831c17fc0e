//! Shared helpers: an in-memory delegate accessor that counts opens and
//! closes.

#![allow(dead_code)]

use rawreg::accessor::{AccessorFactory, AccessorRegistry, FileSystemAccessor, OpenedFile, ReaderAt};
use rawreg::entry::Entry;
use rawreg::error::{AccessorError, AccessorResult};
use rawreg::raw_registry::{RawRegFactory, RAW_REG_SCHEME};
use rawreg::scope::Scope;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const MEM_SCHEME: &str = "mem";

#[derive(Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Serves byte buffers by path.
pub struct MemFactory {
    files: Arc<HashMap<String, Arc<[u8]>>>,
    counters: Arc<Counters>,
    seekable: bool,
}

impl MemFactory {
    pub fn new(files: Vec<(&str, Vec<u8>)>) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let files: HashMap<String, Arc<[u8]>> = files
            .into_iter()
            .map(|(path, bytes)| (path.to_string(), Arc::from(bytes)))
            .collect();
        (
            MemFactory {
                files: Arc::new(files),
                counters: counters.clone(),
                seekable: true,
            },
            counters,
        )
    }

    /// Files opened through this delegate offer no random access.
    pub fn not_seekable(mut self) -> Self {
        self.seekable = false;
        self
    }
}

impl AccessorFactory for MemFactory {
    fn new_instance(
        &self,
        _registry: &Arc<AccessorRegistry>,
        _scope: &Scope,
    ) -> AccessorResult<Arc<dyn FileSystemAccessor>> {
        Ok(Arc::new(MemAccessor {
            files: self.files.clone(),
            counters: self.counters.clone(),
            seekable: self.seekable,
        }))
    }
}

struct MemAccessor {
    files: Arc<HashMap<String, Arc<[u8]>>>,
    counters: Arc<Counters>,
    seekable: bool,
}

impl FileSystemAccessor for MemAccessor {
    fn read_dir(&self, _path: &str) -> AccessorResult<Vec<Entry>> {
        Err(AccessorError::not_implemented("read_dir", MEM_SCHEME))
    }

    fn open(&self, path: &str) -> AccessorResult<Arc<dyn OpenedFile>> {
        let data = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemFile {
            data,
            counters: self.counters.clone(),
            seekable: self.seekable,
            closed: AtomicBool::new(false),
        }))
    }

    fn lstat(&self, _path: &str) -> AccessorResult<Entry> {
        Err(AccessorError::not_implemented("lstat", MEM_SCHEME))
    }

    fn get_root(&self, path: &str) -> AccessorResult<(String, String)> {
        Ok(("/".to_string(), path.to_string()))
    }

    fn path_split(&self, path: &str) -> Vec<String> {
        path.split('/').filter(|c| !c.is_empty()).map(str::to_string).collect()
    }

    fn path_join(&self, root: &str, stem: &str) -> String {
        format!("{}/{}", root.trim_end_matches('/'), stem)
    }
}

struct MemFile {
    data: Arc<[u8]>,
    counters: Arc<Counters>,
    seekable: bool,
    closed: AtomicBool,
}

impl OpenedFile for MemFile {
    fn reader_at(self: Arc<Self>) -> Option<Arc<dyn ReaderAt>> {
        if self.seekable {
            Some(self)
        } else {
            None
        }
    }

    fn close(&self) -> AccessorResult<()> {
        assert!(
            !self.closed.swap(true, Ordering::SeqCst),
            "resource closed twice"
        );
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

impl ReaderAt for MemFile {
    fn read_at(&self, offset: u64, length: usize) -> io::Result<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "closed"));
        }
        let start = (offset as usize).min(self.data.len());
        let end = start.saturating_add(length).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A registry with the `mem` delegate and the `raw_reg` accessor.
pub fn registry_with(factory: MemFactory) -> Arc<AccessorRegistry> {
    let registry = Arc::new(AccessorRegistry::new());
    registry.register(MEM_SCHEME, Arc::new(factory));
    registry.register(RAW_REG_SCHEME, Arc::new(RawRegFactory));
    registry
}

/// UTF-16LE with a terminating NUL, as REG_SZ data is stored.
pub fn utf16z(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}
