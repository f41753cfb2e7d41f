//! Bulk download driver.
//!
//! Walks every level from the coarsest to the target level, region by
//! region, and submits a fetch for each tile that is not already cached,
//! absent or in flight. When the scheduler is full the driver sleeps in
//! short slices and retries, checking for cancellation throughout.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::estimator::CellGrid;
use super::progress::{BulkProgress, ProgressSnapshot};
use super::{BulkConfig, BulkError};
use crate::executor::{SubmitOutcome, TaskId, TaskScheduler};
use crate::geo::Sector;
use crate::level::{Level, Tile, TileKey};
use crate::retrieval::{CompletionHook, FetchContext, FetchOutcome, TileFetchTask};

/// Longest single sleep while waiting, so cancellation is noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// How a bulk run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    Completed(ProgressSnapshot),
    Cancelled(ProgressSnapshot),
}

impl BulkOutcome {
    pub fn progress(&self) -> ProgressSnapshot {
        match self {
            BulkOutcome::Completed(p) | BulkOutcome::Cancelled(p) => *p,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BulkOutcome::Cancelled(_))
    }
}

/// Downloads every missing tile of a region down to a target level.
pub struct BulkDownloader {
    ctx: Arc<FetchContext>,
    scheduler: Arc<TaskScheduler>,
    config: BulkConfig,
    sector: Sector,
    target_level: u32,
    progress: Arc<BulkProgress>,
}

impl BulkDownloader {
    /// Prepares a download of `sector` at `resolution` (tile extent in
    /// degrees).
    pub fn new(
        ctx: Arc<FetchContext>,
        scheduler: Arc<TaskScheduler>,
        sector: Sector,
        resolution: f64,
        config: BulkConfig,
    ) -> Result<Self, BulkError> {
        let target_level = ctx
            .levels
            .target_level_for_resolution(resolution)
            .ok_or(BulkError::NoTargetLevel(resolution))?
            .level_number();
        Ok(Self {
            ctx,
            scheduler,
            config,
            sector,
            target_level,
            progress: Arc::new(BulkProgress::new()),
        })
    }

    pub fn target_level(&self) -> u32 {
        self.target_level
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    /// Shared progress counters, readable while the run is in progress.
    pub fn progress(&self) -> Arc<BulkProgress> {
        Arc::clone(&self.progress)
    }

    fn levels_to_fetch(&self) -> impl Iterator<Item = &Level> {
        self.ctx.levels.levels()[..=self.target_level as usize]
            .iter()
            .filter(|level| !level.is_empty())
    }

    /// Upper bound of tiles and bytes for the whole run.
    fn initial_totals(&self) -> (u64, u64) {
        let count: u64 = self
            .levels_to_fetch()
            .map(|level| self.ctx.levels.tile_count_in_sector(&self.sector, level))
            .sum();
        (count, count * self.config.default_tile_bytes)
    }

    fn completion_hook(&self) -> CompletionHook {
        let progress = Arc::clone(&self.progress);
        let default_bytes = self.config.default_tile_bytes;
        Arc::new(move |_tile: &Tile, outcome: &FetchOutcome| match outcome.size() {
            Some(size) => progress.record_completion(size),
            None => progress.discount(1, default_bytes),
        })
    }

    /// Runs the download on the calling thread.
    pub fn run(&self, cancel: &CancellationToken) -> BulkOutcome {
        let started = Instant::now();
        let (count, size) = self.initial_totals();
        self.progress.set_totals(count, size);
        info!(
            sector = %self.sector,
            target_level = self.target_level,
            tiles = count,
            "Bulk download started"
        );

        let hook = self.completion_hook();
        let mut outstanding: Vec<TaskId> = Vec::new();

        for level in self.levels_to_fetch() {
            let Some(range) = self.ctx.levels.tile_range(&self.sector, level) else {
                continue;
            };
            debug!(level = level.level_number(), tiles = range.count(), "Bulk level");

            for region in CellGrid::new(range, self.config.max_region_tiles).cells() {
                for row in region.first_row..=region.last_row {
                    for col in region.first_col..=region.last_col {
                        if cancel.is_cancelled() {
                            return self.cancelled();
                        }
                        let key =
                            TileKey::new(level.level_number(), row, col, level.shared_cache_name());
                        match self.submit_tile(&key, &hook, cancel) {
                            TileSubmission::Submitted(id) => outstanding.push(id),
                            TileSubmission::Skipped => {
                                self.progress.discount(1, self.config.default_tile_bytes)
                            }
                            TileSubmission::Stopped => return self.cancelled(),
                        }
                    }
                }
                outstanding.retain(|id| self.scheduler.contains(id));
            }
        }

        // Wait for our own work only
        while !outstanding.is_empty() {
            if !self.sleep(cancel) {
                return self.cancelled();
            }
            outstanding.retain(|id| self.scheduler.contains(id));
        }

        let snapshot = self.progress.snapshot();
        info!(
            downloaded = snapshot.current_count,
            bytes = snapshot.current_size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bulk download complete"
        );
        BulkOutcome::Completed(snapshot)
    }

    /// Runs the download on a named background thread.
    pub fn start(
        self: Arc<Self>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<BulkOutcome>, BulkError> {
        thread::Builder::new()
            .name("bulk-download".to_string())
            .spawn(move || self.run(&cancel))
            .map_err(BulkError::Spawn)
    }

    fn submit_tile(
        &self,
        key: &TileKey,
        hook: &CompletionHook,
        cancel: &CancellationToken,
    ) -> TileSubmission {
        let levels = &self.ctx.levels;
        if levels.is_resource_absent(key) {
            return TileSubmission::Skipped;
        }
        let Ok(tile) = levels.create_tile(key) else {
            return TileSubmission::Skipped;
        };
        if self.ctx.is_cached(&tile) {
            return TileSubmission::Skipped;
        }

        let task = Arc::new(
            TileFetchTask::new(tile, Arc::clone(&self.ctx)).with_completion(Arc::clone(hook)),
        );
        let id = TileFetchTask::id_for(task.tile());
        loop {
            while self.scheduler.is_full() {
                if !self.sleep(cancel) {
                    return TileSubmission::Stopped;
                }
            }
            match self.scheduler.submit(task.clone()) {
                SubmitOutcome::Accepted => return TileSubmission::Submitted(id),
                // Someone else is already fetching it
                SubmitOutcome::Duplicate => return TileSubmission::Skipped,
                SubmitOutcome::Discarded => {
                    if !self.sleep(cancel) {
                        return TileSubmission::Stopped;
                    }
                }
                SubmitOutcome::ShutDown => return TileSubmission::Stopped,
            }
        }
    }

    /// Sleeps one poll interval in slices. Returns false if cancelled.
    fn sleep(&self, cancel: &CancellationToken) -> bool {
        let deadline = Instant::now() + self.config.poll_interval;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    fn cancelled(&self) -> BulkOutcome {
        let snapshot = self.progress.snapshot();
        info!(
            downloaded = snapshot.current_count,
            total = snapshot.total_count,
            "Bulk download cancelled"
        );
        BulkOutcome::Cancelled(snapshot)
    }
}

enum TileSubmission {
    Submitted(TaskId),
    Skipped,
    Stopped,
}

impl std::fmt::Debug for BulkDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkDownloader")
            .field("sector", &self.sector)
            .field("target_level", &self.target_level)
            .finish_non_exhaustive()
    }
}
