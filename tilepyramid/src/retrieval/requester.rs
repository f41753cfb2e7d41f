//! Per-cycle tile requester.
//!
//! Each cycle enumerates the tiles covering a region of interest at one
//! level, skips those already available or known absent, and queues a fetch
//! for every missing tile, nearest to the viewer first.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::task::{FetchContext, TileFetchTask};
use crate::executor::{DrainReport, RequestQueue, TaskScheduler};
use crate::geo::{LatLon, Sector};
use crate::level::Tile;

/// Summary of one request cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Level the cycle ran at, if any level applied.
    pub level: Option<u32>,
    pub tiles: usize,
    pub cached: usize,
    pub absent: usize,
    pub requested: usize,
    pub drain: DrainReport,
}

/// Consumer that turns a view into prioritized fetch requests.
pub struct TileRequester {
    ctx: Arc<FetchContext>,
    scheduler: Arc<TaskScheduler>,
    queue: RequestQueue,
}

impl TileRequester {
    pub fn new(ctx: Arc<FetchContext>, scheduler: Arc<TaskScheduler>) -> Self {
        Self {
            ctx,
            scheduler,
            queue: RequestQueue::new(),
        }
    }

    pub fn context(&self) -> &Arc<FetchContext> {
        &self.ctx
    }

    /// Runs one request cycle over `region`.
    ///
    /// `level` selects an explicit level; otherwise the finest level allowed
    /// for the region is used.
    pub fn request_cycle(
        &mut self,
        viewer: LatLon,
        region: &Sector,
        level: Option<u32>,
    ) -> CycleReport {
        let levels = Arc::clone(&self.ctx.levels);
        let level = match level {
            Some(n) => levels.level(n).filter(|l| !l.is_empty()),
            None => levels.last_level_for_sector(region),
        };
        let Some(level) = level else {
            return CycleReport::default();
        };

        self.queue.begin_cycle();
        let mut report = CycleReport {
            level: Some(level.level_number()),
            ..CycleReport::default()
        };

        for key in levels.tiles_in_sector(region, level) {
            report.tiles += 1;
            if levels.is_resource_absent(&key) {
                report.absent += 1;
                continue;
            }
            let tile = match levels.create_tile(&key) {
                Ok(tile) => tile,
                Err(_) => continue,
            };
            if self.ctx.is_cached(&tile) {
                report.cached += 1;
                continue;
            }
            let priority = viewer.angular_distance(&tile.sector().centroid());
            let task = TileFetchTask::new(tile, Arc::clone(&self.ctx));
            self.queue.push(Arc::new(task), priority);
            report.requested += 1;
        }

        report.drain = self.queue.drain_into(&self.scheduler);
        debug!(
            level = level.level_number(),
            tiles = report.tiles,
            cached = report.cached,
            absent = report.absent,
            requested = report.requested,
            submitted = report.drain.submitted,
            "Request cycle complete"
        );
        report
    }

    /// Payload of a tile from memory, or from disk (filling memory).
    pub fn tile_data(&self, tile: &Tile) -> Option<Bytes> {
        if let Some(data) = self.ctx.memory.get(tile.cache_path()) {
            return Some(data);
        }
        let expiry = self.ctx.levels.expiry_time();
        self.ctx
            .store
            .find_fresh_file(tile.cache_path(), expiry)
            .ok()
            .flatten()?;
        let data = self.ctx.store.read(tile.cache_path()).ok().flatten()?;
        self.ctx.memory.insert(tile.cache_path(), data.clone());
        Some(data)
    }
}

impl std::fmt::Debug for TileRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileRequester")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
