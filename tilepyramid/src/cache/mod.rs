//! Tile caching: path addressing, the on-disk file store and the in-memory
//! payload cache.

mod disk;
mod memory;
mod path;

use std::path::PathBuf;

use thiserror::Error;

pub use disk::{DiskFileStore, FileStore};
pub use memory::{MemoryCacheStats, TileMemoryCache, DEFAULT_MEMORY_CACHE_BYTES};
pub use path::{strip_illegal_path_chars, tile_cache_path};

/// Errors from cache storage.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cache path: {0}")]
    InvalidPath(String),
}
