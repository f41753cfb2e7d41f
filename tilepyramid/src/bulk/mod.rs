//! Bulk prefetching: estimate how much of a region is missing, then
//! download it level by level with progress reporting.

mod driver;
mod estimator;
mod progress;

use std::time::Duration;

use thiserror::Error;

pub use driver::{BulkDownloader, BulkOutcome};
pub use estimator::{extrapolate_missing, BulkEstimate, BulkEstimator, CellGrid, LevelEstimate};
pub use progress::{BulkProgress, ProgressSnapshot};

/// Default maximum tiles per sampling cell.
pub const DEFAULT_MAX_TILES_PER_CELL: usize = 64;

/// Default number of cells sampled per level.
pub const DEFAULT_SAMPLE_COUNT: usize = 6;

/// Default sleep between submission attempts while the scheduler is full.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default size assumed for a tile when nothing has been measured.
pub const DEFAULT_TILE_BYTES: u64 = 64 * 1024;

/// Default maximum tiles per download sub-region.
pub const DEFAULT_MAX_REGION_TILES: usize = 1024;

/// Bulk estimation and download settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    pub max_tiles_per_cell: usize,
    pub sample_count: usize,
    pub poll_interval: Duration,
    pub default_tile_bytes: u64,
    pub max_region_tiles: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_tiles_per_cell: DEFAULT_MAX_TILES_PER_CELL,
            sample_count: DEFAULT_SAMPLE_COUNT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_tile_bytes: DEFAULT_TILE_BYTES,
            max_region_tiles: DEFAULT_MAX_REGION_TILES,
        }
    }
}

impl BulkConfig {
    pub fn with_max_tiles_per_cell(mut self, max: usize) -> Self {
        self.max_tiles_per_cell = max;
        self
    }

    pub fn with_sample_count(mut self, count: usize) -> Self {
        self.sample_count = count;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_default_tile_bytes(mut self, bytes: u64) -> Self {
        self.default_tile_bytes = bytes;
        self
    }

    pub fn with_max_region_tiles(mut self, max: usize) -> Self {
        self.max_region_tiles = max;
        self
    }
}

/// Errors from bulk operations.
#[derive(Debug, Error)]
pub enum BulkError {
    #[error("no usable level for resolution {0} degrees")]
    NoTargetLevel(f64),

    #[error("failed to spawn bulk download thread: {0}")]
    Spawn(#[source] std::io::Error),
}
