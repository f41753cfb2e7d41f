//! On-disk file store.
//!
//! Files are addressed by paths relative to the store roots. Lookups search
//! the write root first, then any additional read-only roots. All reads,
//! writes and removals of one path are serialized by a per-path lock, and
//! writes land in a temporary file that is renamed into place.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::CacheError;

/// Abstract file store used by the retrieval pipeline.
pub trait FileStore: Send + Sync {
    /// Absolute location of an existing file, if any root holds it.
    fn find_file(&self, path: &str) -> Option<PathBuf>;

    /// Location a new file should be written to. Parent directories are
    /// created.
    fn new_file(&self, path: &str) -> Result<PathBuf, CacheError>;

    /// Deletes the file from the write root. Returns whether it existed.
    fn remove_file(&self, path: &str) -> Result<bool, CacheError>;

    /// Reads a file under the per-path lock.
    fn read(&self, path: &str) -> Result<Option<Bytes>, CacheError>;

    /// Writes a file under the per-path lock, replacing any existing one.
    fn write(&self, path: &str, data: &[u8]) -> Result<PathBuf, CacheError>;

    /// Modification time of an existing file.
    fn modified(&self, path: &str) -> Option<SystemTime> {
        let found = self.find_file(path)?;
        fs::metadata(found).and_then(|m| m.modified()).ok()
    }

    /// Finds a file, deleting it instead when it was modified before
    /// `expiry`.
    fn find_fresh_file(
        &self,
        path: &str,
        expiry: Option<SystemTime>,
    ) -> Result<Option<PathBuf>, CacheError> {
        let Some(found) = self.find_file(path) else {
            return Ok(None);
        };
        if let Some(expiry) = expiry {
            let stale = fs::metadata(&found)
                .and_then(|m| m.modified())
                .map(|modified| modified < expiry)
                .unwrap_or(false);
            if stale {
                info!(path = %path, "Removing expired cache file");
                self.remove_file(path)?;
                return Ok(None);
            }
        }
        Ok(Some(found))
    }
}

/// File store backed by local directories.
pub struct DiskFileStore {
    write_root: PathBuf,
    read_roots: Vec<PathBuf>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    temp_counter: AtomicU64,
}

impl DiskFileStore {
    /// Creates a store writing to (and reading from) `write_root`.
    pub fn new(write_root: impl Into<PathBuf>) -> Self {
        Self {
            write_root: write_root.into(),
            read_roots: Vec::new(),
            locks: DashMap::new(),
            temp_counter: AtomicU64::new(0),
        }
    }

    /// Adds a read-only root searched after the write root.
    pub fn with_read_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.read_roots.push(root.into());
        self
    }

    pub fn write_root(&self) -> &Path {
        &self.write_root
    }

    pub fn read_roots(&self) -> &[PathBuf] {
        &self.read_roots
    }

    fn roots(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.write_root).chain(self.read_roots.iter())
    }

    fn resolve(root: &Path, path: &str) -> Result<PathBuf, CacheError> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CacheError::InvalidPath(path.to_string()));
        }
        Ok(root.join(relative))
    }

    fn lock_for(&self, path: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_lock(&self, path: &str) {
        // Only the map itself still holds the lock when nobody is waiting
        self.locks
            .remove_if(path, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn with_lock<R>(&self, path: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(path);
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.release_lock(path);
        result
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
    }

    /// Number of paths with a live lock.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}

fn io_error(path: &Path, source: io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl FileStore for DiskFileStore {
    fn find_file(&self, path: &str) -> Option<PathBuf> {
        self.roots()
            .filter_map(|root| Self::resolve(root, path).ok())
            .find(|candidate| candidate.is_file())
    }

    fn new_file(&self, path: &str) -> Result<PathBuf, CacheError> {
        let target = Self::resolve(&self.write_root, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        Ok(target)
    }

    fn remove_file(&self, path: &str) -> Result<bool, CacheError> {
        let target = Self::resolve(&self.write_root, path)?;
        self.with_lock(path, || match fs::remove_file(&target) {
            Ok(()) => {
                debug!(path = %target.display(), "Removed cache file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&target, e)),
        })
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, CacheError> {
        self.with_lock(path, || {
            let Some(found) = self.find_file(path) else {
                return Ok(None);
            };
            match fs::read(&found) {
                Ok(data) => Ok(Some(Bytes::from(data))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(io_error(&found, e)),
            }
        })
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<PathBuf, CacheError> {
        let target = self.new_file(path)?;
        let temp = self.temp_path(&target);
        self.with_lock(path, || {
            let written = fs::File::create(&temp)
                .and_then(|mut file| {
                    file.write_all(data)?;
                    file.sync_all()
                })
                .and_then(|()| fs::rename(&temp, &target));
            if let Err(e) = written {
                let _ = fs::remove_file(&temp);
                return Err(io_error(&target, e));
            }
            debug!(path = %target.display(), bytes = data.len(), "Wrote cache file");
            Ok(target.clone())
        })
    }
}

impl std::fmt::Debug for DiskFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskFileStore")
            .field("write_root", &self.write_root)
            .field("read_roots", &self.read_roots)
            .finish()
    }
}
