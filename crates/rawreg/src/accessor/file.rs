//! Local file accessor.
//!
//! Serves as the delegate that container accessors open their backing files
//! through. Files are memory-mapped read-only for random access.

use super::{AccessorFactory, AccessorRegistry, FileSystemAccessor, OpenedFile, ReaderAt};
use crate::entry::Entry;
use crate::error::{AccessorError, AccessorResult};
use crate::scope::Scope;
use memmap2::{Mmap, MmapOptions};
use parking_lot::RwLock;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub const FILE_SCHEME: &str = "file";

/// Mapped contents; `None` for an empty file.
struct MmapState {
    mmap: Option<Mmap>,
    size: u64,
}

impl MmapState {
    fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => mmap.as_ref(),
            None => &[],
        }
    }
}

/// A memory-mapped file opened through the `file` accessor.
///
/// ```rust,ignore
/// let file = MmapFile::open("file:///cases/42/SOFTWARE")?;
/// let header = file.read_at(0, 4096)?;
/// ```
pub struct MmapFile {
    /// Location as given by the caller.
    location: String,
    path: PathBuf,
    /// `None` once closed.
    state: RwLock<Option<MmapState>>,
}

impl std::fmt::Debug for MmapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapFile")
            .field("location", &self.location)
            .field("path", &self.path)
            .field("open", &self.state.read().is_some())
            .finish()
    }
}

impl MmapFile {
    /// Resolve a `file://` URL or plain path to a filesystem path.
    ///
    /// Callers hand over already-decoded paths, so `%` is taken literally.
    fn parse_location(location: &str) -> PathBuf {
        let path = match location.strip_prefix("file://") {
            // file:///C:/path -> C:/path
            Some(rest) if rest.len() > 2 && rest.starts_with('/') && rest.as_bytes()[2] == b':' => {
                &rest[1..]
            }
            Some(rest) => rest,
            None => location,
        };
        PathBuf::from(path)
    }

    fn map(path: &PathBuf) -> io::Result<MmapState> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size == 0 {
            return Ok(MmapState { mmap: None, size: 0 });
        }
        // SAFETY: the mapping is read-only; evidence files are not modified
        // while being examined.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(MmapState {
            mmap: Some(mmap),
            size,
        })
    }

    pub fn open(location: impl Into<String>) -> AccessorResult<Self> {
        let location = location.into();
        let path = Self::parse_location(&location);
        let state = Self::map(&path)?;
        debug!("file: mapped '{}' ({} bytes)", path.display(), state.size);
        Ok(MmapFile {
            location,
            path,
            state: RwLock::new(Some(state)),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotConnected,
            format!("'{}' has been closed", self.location),
        )
    }
}

impl ReaderAt for MmapFile {
    fn read_at(&self, offset: u64, length: usize) -> io::Result<Vec<u8>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or_else(|| self.closed_error())?;
        if offset >= state.size {
            return Ok(Vec::new());
        }
        let data = state.as_slice();
        let start = offset as usize;
        let end = start.saturating_add(length).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn size(&self) -> u64 {
        self.state.read().as_ref().map_or(0, |s| s.size)
    }
}

impl OpenedFile for MmapFile {
    fn reader_at(self: Arc<Self>) -> Option<Arc<dyn ReaderAt>> {
        Some(self)
    }

    fn close(&self) -> AccessorResult<()> {
        if self.state.write().take().is_some() {
            debug!("file: closed '{}'", self.path.display());
        }
        Ok(())
    }

    fn size(&self) -> Option<u64> {
        self.state.read().as_ref().map(|s| s.size)
    }
}

/// The `file` accessor.
#[derive(Debug, Default)]
pub struct FileAccessor;

impl FileSystemAccessor for FileAccessor {
    fn read_dir(&self, _path: &str) -> AccessorResult<Vec<Entry>> {
        Err(AccessorError::not_implemented("read_dir", FILE_SCHEME))
    }

    fn open(&self, path: &str) -> AccessorResult<Arc<dyn OpenedFile>> {
        Ok(Arc::new(MmapFile::open(path)?))
    }

    fn lstat(&self, _path: &str) -> AccessorResult<Entry> {
        Err(AccessorError::not_implemented("lstat", FILE_SCHEME))
    }

    fn get_root(&self, path: &str) -> AccessorResult<(String, String)> {
        Ok(("/".to_string(), path.to_string()))
    }

    fn path_split(&self, path: &str) -> Vec<String> {
        path.split(['/', '\\'])
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn path_join(&self, root: &str, stem: &str) -> String {
        format!("{}/{}", root.trim_end_matches('/'), stem.trim_start_matches('/'))
    }
}

/// Factory for [`FileAccessor`].
#[derive(Debug, Default)]
pub struct FileFactory;

impl AccessorFactory for FileFactory {
    fn new_instance(
        &self,
        _registry: &Arc<AccessorRegistry>,
        _scope: &Scope,
    ) -> AccessorResult<Arc<dyn FileSystemAccessor>> {
        Ok(Arc::new(FileAccessor))
    }
}
