//! The tile fetch task.
//!
//! A fetch resolves one tile through the storage tiers in order:
//!
//! 1. Fresh local file: validated, loaded into the memory cache
//! 2. Absence tracker: known-missing tiles are skipped
//! 3. Network monitor: no request while the host or network is down
//! 4. Remote retrieval, then the post-processor
//!
//! A local file that is stale is deleted and re-fetched. A local file that
//! fails validation is deleted and the tile is marked absent.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use super::post::PostProcessor;
use super::retriever::Retriever;
use super::url::UrlBuilder;
use super::RetrieveError;
use crate::cache::{FileStore, TileMemoryCache};
use crate::executor::{Task, TaskId};
use crate::level::{LevelSet, Tile};
use crate::network::NetworkMonitor;

/// Collaborators shared by every fetch task of one level set.
pub struct FetchContext {
    pub levels: Arc<LevelSet>,
    pub store: Arc<dyn FileStore>,
    pub memory: Arc<TileMemoryCache>,
    pub retriever: Arc<dyn Retriever>,
    pub url_builder: Arc<dyn UrlBuilder>,
    pub post: Arc<dyn PostProcessor>,
    pub network: Option<Arc<NetworkMonitor>>,
    /// Window passed to [`NetworkMonitor::is_network_unavailable`].
    pub network_check_interval: Duration,
}

impl FetchContext {
    /// Whether `tile` is already available locally, without side effects
    /// beyond removing an expired file.
    pub fn is_cached(&self, tile: &Tile) -> bool {
        if self.memory.contains(tile.cache_path()) {
            return true;
        }
        matches!(
            self.store
                .find_fresh_file(tile.cache_path(), self.levels.expiry_time()),
            Ok(Some(_))
        )
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("levels", &self.levels.num_levels())
            .field("network", &self.network.is_some())
            .finish_non_exhaustive()
    }
}

/// Result of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from a fresh local file.
    Local(Bytes),
    /// Retrieved remotely and cached.
    Downloaded(Bytes),
    /// Skipped: the tile is marked absent.
    Absent,
    /// Skipped: host or network unavailable.
    Offline,
    /// The attempt failed; the tile has been marked absent.
    Failed(String),
}

impl FetchOutcome {
    /// Payload size for successful outcomes.
    pub fn size(&self) -> Option<u64> {
        match self {
            FetchOutcome::Local(b) | FetchOutcome::Downloaded(b) => Some(b.len() as u64),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.size().is_some()
    }
}

/// Callback invoked with every finished fetch.
pub type CompletionHook = Arc<dyn Fn(&Tile, &FetchOutcome) + Send + Sync>;

/// Cheap sanity check of a tile payload against its file suffix.
pub fn is_plausible_payload(suffix: &str, data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    match suffix.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => data.starts_with(&[0xFF, 0xD8]),
        "png" => data.starts_with(&[0x89, b'P', b'N', b'G']),
        "dds" => data.starts_with(b"DDS "),
        _ => true,
    }
}

/// Fetches one tile.
pub struct TileFetchTask {
    tile: Tile,
    ctx: Arc<FetchContext>,
    on_complete: Option<CompletionHook>,
}

impl TileFetchTask {
    pub fn new(tile: Tile, ctx: Arc<FetchContext>) -> Self {
        Self {
            tile,
            ctx,
            on_complete: None,
        }
    }

    pub fn with_completion(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    /// Task id for a tile: its cache path.
    pub fn id_for(tile: &Tile) -> TaskId {
        TaskId::new(tile.cache_path())
    }

    /// Runs the fetch and returns its outcome.
    pub fn fetch(&self) -> FetchOutcome {
        let tile = &self.tile;
        let ctx = &self.ctx;
        let suffix = ctx
            .levels
            .level(tile.level())
            .map(|l| l.format_suffix().to_string())
            .unwrap_or_default();

        if let Some(outcome) = self.load_local(&suffix) {
            return outcome;
        }

        if ctx.levels.is_resource_absent(tile.key()) {
            debug!(tile = %tile.key(), "Skipping absent tile");
            return FetchOutcome::Absent;
        }

        let Some(level) = ctx.levels.level(tile.level()) else {
            return FetchOutcome::Failed(format!("unknown level {}", tile.level()));
        };

        let url = match ctx.url_builder.url_for(tile, level) {
            Ok(url) => url,
            Err(e) => {
                ctx.post.on_failure(tile, &e);
                return FetchOutcome::Failed(e.to_string());
            }
        };

        if let Some(network) = &ctx.network {
            if network.is_host_unavailable(url.as_str())
                || network.is_network_unavailable(ctx.network_check_interval)
            {
                debug!(tile = %tile.key(), host = ?url.host_str(), "Network unavailable, deferring tile");
                return FetchOutcome::Offline;
            }
        }

        let result = ctx.retriever.retrieve(&url).and_then(|retrieved| {
            if retrieved.is_service_message() {
                let message = String::from_utf8_lossy(&retrieved.bytes);
                Err(RetrieveError::ServiceMessage(message.chars().take(200).collect()))
            } else if retrieved.bytes.is_empty() {
                Err(RetrieveError::EmptyBody(url.to_string()))
            } else {
                Ok(retrieved.bytes)
            }
        });

        match result {
            Ok(bytes) => {
                if let Some(network) = &ctx.network {
                    network.log_available(url.as_str());
                }
                match ctx.post.on_success(tile, bytes) {
                    Ok(cached) => {
                        debug!(tile = %tile.key(), bytes = cached.bytes.len(), "Tile downloaded");
                        FetchOutcome::Downloaded(cached.bytes)
                    }
                    Err(e) => {
                        warn!(tile = %tile.key(), error = %e, "Failed to cache tile");
                        FetchOutcome::Failed(e.to_string())
                    }
                }
            }
            Err(e) => {
                if e.is_network_failure() {
                    if let Some(network) = &ctx.network {
                        network.log_unavailable(url.as_str());
                    }
                }
                ctx.post.on_failure(tile, &e);
                FetchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Serves the tile from disk when a fresh, valid file exists.
    fn load_local(&self, suffix: &str) -> Option<FetchOutcome> {
        let tile = &self.tile;
        let ctx = &self.ctx;
        let path = tile.cache_path();

        match ctx.store.find_fresh_file(path, ctx.levels.expiry_time()) {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => {
                warn!(tile = %tile.key(), error = %e, "Failed to check cached tile");
                return None;
            }
        }

        match ctx.store.read(path) {
            Ok(Some(data)) if is_plausible_payload(suffix, &data) => {
                ctx.memory.insert(path, data.clone());
                Some(FetchOutcome::Local(data))
            }
            Ok(None) => None,
            Ok(Some(_)) => {
                warn!(tile = %tile.key(), path = %path, "Removing corrupt cached tile");
                if let Err(e) = ctx.store.remove_file(path) {
                    warn!(path = %path, error = %e, "Failed to remove corrupt tile");
                }
                let error = RetrieveError::Corrupt(path.to_string());
                ctx.post.on_failure(tile, &error);
                Some(FetchOutcome::Failed(error.to_string()))
            }
            Err(e) => {
                warn!(tile = %tile.key(), error = %e, "Failed to read cached tile");
                None
            }
        }
    }
}

impl Task for TileFetchTask {
    fn id(&self) -> TaskId {
        Self::id_for(&self.tile)
    }

    fn name(&self) -> &str {
        "fetch-tile"
    }

    fn run(&self) {
        let outcome = self.fetch();
        if let Some(hook) = &self.on_complete {
            hook(&self.tile, &outcome);
        }
    }
}

impl std::fmt::Debug for TileFetchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFetchTask")
            .field("tile", &self.tile.cache_path())
            .finish()
    }
}
