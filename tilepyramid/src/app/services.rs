//! Process-wide services, built once at startup and shut down explicitly.

use std::sync::Arc;

use tracing::info;

use super::AppError;
use crate::bulk::{BulkConfig, BulkDownloader, BulkEstimator};
use crate::cache::{DiskFileStore, FileStore, TileMemoryCache};
use crate::config::ConfigFile;
use crate::executor::TaskScheduler;
use crate::geo::Sector;
use crate::level::LevelSet;
use crate::network::{HttpProbe, NetworkMonitor, ReachabilityProbe};
use crate::retrieval::{
    BoundingBoxUrlBuilder, CachingPostProcessor, FetchContext, ReqwestRetriever, RetrieveError,
    Retriever, TileRequester,
};

/// Owns the level set, caches, worker pool and network monitor, and hands
/// out the objects that operate on them.
///
/// Starting order: level set, disk store, memory cache, network monitor,
/// scheduler. [`shutdown`](Self::shutdown) stops the scheduler; dropping
/// the services does the same.
pub struct TileServices {
    levels: Arc<LevelSet>,
    store: Arc<DiskFileStore>,
    memory: Arc<TileMemoryCache>,
    network: Arc<NetworkMonitor>,
    scheduler: Arc<TaskScheduler>,
    context: Arc<FetchContext>,
    bulk: BulkConfig,
}

impl TileServices {
    /// Starts services that fetch over HTTP.
    pub fn start(config: &ConfigFile) -> Result<Self, AppError> {
        let network = config.network_config();
        let probe = HttpProbe::new(network.probe_timeout)
            .map_err(|e| RetrieveError::Client(e.to_string()))?;
        let retriever = ReqwestRetriever::new()?;
        Self::start_with(config, Arc::new(retriever), Arc::new(probe))
    }

    /// Starts services with the given retriever and reachability probe.
    pub fn start_with(
        config: &ConfigFile,
        retriever: Arc<dyn Retriever>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Result<Self, AppError> {
        let levels = Arc::new(LevelSet::new(config.level_set_config())?);

        let mut store = DiskFileStore::new(&config.cache.directory);
        for root in &config.cache.read_directories {
            store = store.with_read_root(root);
        }
        let store = Arc::new(store);

        let memory = Arc::new(TileMemoryCache::new(config.cache.memory_size));
        let network_config = config.network_config();
        let check_interval = network_config.check_interval;
        let network = Arc::new(NetworkMonitor::new(network_config, probe));
        let scheduler = Arc::new(TaskScheduler::new(config.scheduler_config())?);

        let file_store: Arc<dyn FileStore> = store.clone();
        let post = CachingPostProcessor::new(
            Arc::clone(&levels),
            Arc::clone(&file_store),
            Arc::clone(&memory),
        );
        let context = Arc::new(FetchContext {
            levels: Arc::clone(&levels),
            store: file_store,
            memory: Arc::clone(&memory),
            retriever,
            url_builder: Arc::new(BoundingBoxUrlBuilder::new()),
            post: Arc::new(post),
            network: Some(Arc::clone(&network)),
            network_check_interval: check_interval,
        });

        info!(
            dataset = %config.tiles.dataset,
            levels = levels.num_levels(),
            cache_dir = %config.cache.directory.display(),
            memory_bytes = config.cache.memory_size,
            pool_size = config.scheduler.pool_size,
            queue_depth = config.scheduler.queue_depth,
            offline = config.network.offline,
            "Tile services started"
        );

        Ok(Self {
            levels,
            store,
            memory,
            network,
            scheduler,
            context,
            bulk: config.bulk_config(),
        })
    }

    pub fn levels(&self) -> &Arc<LevelSet> {
        &self.levels
    }

    pub fn store(&self) -> &Arc<DiskFileStore> {
        &self.store
    }

    pub fn memory(&self) -> &Arc<TileMemoryCache> {
        &self.memory
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    pub fn context(&self) -> &Arc<FetchContext> {
        &self.context
    }

    pub fn bulk_config(&self) -> &BulkConfig {
        &self.bulk
    }

    /// Per-cycle requester sharing this pool.
    pub fn requester(&self) -> TileRequester {
        TileRequester::new(Arc::clone(&self.context), Arc::clone(&self.scheduler))
    }

    pub fn estimator(&self) -> BulkEstimator {
        BulkEstimator::new(
            Arc::clone(&self.levels),
            Arc::clone(&self.context.store),
            self.bulk.clone(),
        )
    }

    /// Bulk download of `sector` down to `resolution` degrees per tile.
    pub fn bulk_downloader(
        &self,
        sector: Sector,
        resolution: f64,
    ) -> Result<BulkDownloader, AppError> {
        Ok(BulkDownloader::new(
            Arc::clone(&self.context),
            Arc::clone(&self.scheduler),
            sector,
            resolution,
            self.bulk.clone(),
        )?)
    }

    /// Stops the worker pool. Queued tasks are dropped; running ones finish.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.memory.sync();
        info!(
            memory = ?self.memory.stats(),
            "Tile services stopped"
        );
    }
}

impl Drop for TileServices {
    fn drop(&mut self) {
        if !self.scheduler.is_shut_down() {
            self.shutdown();
        }
    }
}
