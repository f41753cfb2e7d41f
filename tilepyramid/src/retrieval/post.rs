//! Post-processing of retrieved tiles.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::RetrieveError;
use crate::cache::{CacheError, FileStore, TileMemoryCache};
use crate::level::{LevelSet, Tile};

/// A tile persisted to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTile {
    pub path: PathBuf,
    pub bytes: Bytes,
}

/// Hook run after each retrieval attempt.
///
/// Implemented per resource type: imagery is written as-is, other datasets
/// may transcode or validate before storing.
pub trait PostProcessor: Send + Sync {
    fn on_success(&self, tile: &Tile, bytes: Bytes) -> Result<CachedTile, CacheError>;

    fn on_failure(&self, tile: &Tile, error: &RetrieveError);
}

/// Writes the payload to the file store, fills the memory cache and keeps
/// the level's absence state in step with the outcome.
pub struct CachingPostProcessor {
    levels: Arc<LevelSet>,
    store: Arc<dyn FileStore>,
    memory: Arc<TileMemoryCache>,
}

impl CachingPostProcessor {
    pub fn new(
        levels: Arc<LevelSet>,
        store: Arc<dyn FileStore>,
        memory: Arc<TileMemoryCache>,
    ) -> Self {
        Self {
            levels,
            store,
            memory,
        }
    }
}

impl PostProcessor for CachingPostProcessor {
    fn on_success(&self, tile: &Tile, bytes: Bytes) -> Result<CachedTile, CacheError> {
        let path = self.store.write(tile.cache_path(), &bytes)?;
        self.memory.insert(tile.cache_path(), bytes.clone());
        self.levels.unmark_resource_absent(tile.key());
        Ok(CachedTile { path, bytes })
    }

    fn on_failure(&self, tile: &Tile, error: &RetrieveError) {
        debug!(tile = %tile.key(), error = %error, "Tile retrieval failed");
        self.levels.mark_resource_absent(tile.key());
    }
}

impl std::fmt::Debug for CachingPostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingPostProcessor").finish_non_exhaustive()
    }
}
