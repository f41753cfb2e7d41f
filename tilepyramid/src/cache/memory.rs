//! In-memory tile cache with size-bounded LRU eviction using moka.
//!
//! Entries are keyed by the tile's cache path and weighted by payload size,
//! so the capacity is a byte budget rather than an entry count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use moka::sync::Cache;

/// Default memory budget: 256 MiB.
pub const DEFAULT_MEMORY_CACHE_BYTES: u64 = 256 * 1024 * 1024;

/// Snapshot of memory cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub size_bytes: u64,
    pub max_size_bytes: u64,
}

impl MemoryCacheStats {
    /// Fraction of lookups that hit, or 0 with no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe in-memory cache of tile payloads.
pub struct TileMemoryCache {
    cache: Cache<String, Bytes>,
    max_size_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TileMemoryCache {
    /// Creates a cache holding at most `max_size_bytes` of payload.
    pub fn new(max_size_bytes: u64) -> Self {
        Self::build(max_size_bytes, None)
    }

    /// Creates a cache whose entries also expire `ttl` after insertion.
    pub fn with_ttl(max_size_bytes: u64, ttl: Duration) -> Self {
        Self::build(max_size_bytes, Some(ttl))
    }

    fn build(max_size_bytes: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder()
            // moka weights are u32; very large payloads saturate
            .weigher(|_key: &String, value: &Bytes| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
            max_size_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, cache_path: &str) -> Option<Bytes> {
        match self.cache.get(cache_path) {
            Some(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(data)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Presence check that does not touch the hit/miss counters.
    pub fn contains(&self, cache_path: &str) -> bool {
        self.cache.contains_key(cache_path)
    }

    pub fn insert(&self, cache_path: impl Into<String>, data: Bytes) {
        self.cache.insert(cache_path.into(), data);
    }

    pub fn remove(&self, cache_path: &str) -> Option<Bytes> {
        self.cache.remove(cache_path)
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Runs pending eviction work so that counts are current.
    pub fn sync(&self) {
        self.cache.run_pending_tasks();
    }

    pub fn stats(&self) -> MemoryCacheStats {
        MemoryCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
            size_bytes: self.cache.weighted_size(),
            max_size_bytes: self.max_size_bytes,
        }
    }
}

impl Default for TileMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_BYTES)
    }
}

impl std::fmt::Debug for TileMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileMemoryCache")
            .field("max_size_bytes", &self.max_size_bytes)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
