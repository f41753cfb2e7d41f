//! Sampling estimator for bulk downloads.
//!
//! Counting every tile of a large region on disk is too slow, so each level
//! is partitioned into a grid of cells holding at most
//! `max_tiles_per_cell` tiles, a few random cells are counted, and the
//! missing share is extrapolated to the whole level.

use std::sync::Arc;

use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::{BulkConfig, BulkError};
use crate::cache::{tile_cache_path, FileStore};
use crate::geo::Sector;
use crate::level::{Level, LevelSet, TileRange};

/// Estimate for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelEstimate {
    pub level: u32,
    pub total_tiles: u64,
    pub missing_tiles: u64,
    pub sampled_tiles: u64,
    pub sampled_missing: u64,
}

/// Estimated work for downloading a region down to a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkEstimate {
    pub target_level: u32,
    pub total_tiles: u64,
    pub missing_tiles: u64,
    pub missing_bytes: u64,
    pub levels: Vec<LevelEstimate>,
}

/// `total * sampled_missing / sampled_total`, rounded to the nearest tile.
/// Zero when nothing was sampled.
///
/// ```
/// use tilepyramid::bulk::extrapolate_missing;
///
/// assert_eq!(extrapolate_missing(100, 3, 12), 25);
/// assert_eq!(extrapolate_missing(100, 0, 0), 0);
/// ```
pub fn extrapolate_missing(total: u64, sampled_missing: u64, sampled_total: u64) -> u64 {
    if sampled_total == 0 {
        return 0;
    }
    let ratio = sampled_missing.min(sampled_total) as f64 / sampled_total as f64;
    (total as f64 * ratio).round() as u64
}

/// A tile range split into square-ish cells of at most `max_tiles` tiles.
///
/// Cells are numbered row-major and computed on demand, so a grid over a
/// whole fine level costs nothing until its cells are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGrid {
    range: TileRange,
    side: u64,
    cells_per_row: u64,
    cells_per_col: u64,
}

impl CellGrid {
    pub fn new(range: TileRange, max_tiles: usize) -> Self {
        let side = ((max_tiles.max(1) as f64).sqrt().floor() as u64).max(1);
        Self {
            range,
            side,
            cells_per_row: range.cols().div_ceil(side),
            cells_per_col: range.rows().div_ceil(side),
        }
    }

    pub fn len(&self) -> u64 {
        self.cells_per_row * self.cells_per_col
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell number `index`, or `None` past the end.
    pub fn cell(&self, index: u64) -> Option<TileRange> {
        if index >= self.len() {
            return None;
        }
        let side = self.side as i64;
        let first_row = i64::from(self.range.first_row) + (index / self.cells_per_row) as i64 * side;
        let first_col = i64::from(self.range.first_col) + (index % self.cells_per_row) as i64 * side;
        Some(TileRange {
            first_row: first_row as i32,
            last_row: (first_row + side - 1).min(i64::from(self.range.last_row)) as i32,
            first_col: first_col as i32,
            last_col: (first_col + side - 1).min(i64::from(self.range.last_col)) as i32,
        })
    }

    /// All cells, row-major.
    pub fn cells(self) -> impl Iterator<Item = TileRange> {
        (0..self.len()).filter_map(move |index| self.cell(index))
    }

    /// Up to `amount` distinct cells chosen at random; every cell when the
    /// grid is no larger than `amount`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, amount: usize) -> Vec<TileRange> {
        let len = usize::try_from(self.len()).unwrap_or(usize::MAX);
        if len <= amount {
            return self.cells().collect();
        }
        index::sample(rng, len, amount)
            .into_iter()
            .filter_map(|i| self.cell(i as u64))
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CellCount {
    total: u64,
    missing: u64,
    present_bytes: u64,
    present_files: u64,
}

impl CellCount {
    fn merge(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            missing: self.missing + other.missing,
            present_bytes: self.present_bytes + other.present_bytes,
            present_files: self.present_files + other.present_files,
        }
    }
}

/// Estimates missing tiles and bytes for a region.
pub struct BulkEstimator {
    levels: Arc<LevelSet>,
    store: Arc<dyn FileStore>,
    config: BulkConfig,
}

impl BulkEstimator {
    pub fn new(levels: Arc<LevelSet>, store: Arc<dyn FileStore>, config: BulkConfig) -> Self {
        Self {
            levels,
            store,
            config,
        }
    }

    /// Deepest level needed for `resolution` (tile extent in degrees).
    pub fn target_level(&self, resolution: f64) -> Option<&Level> {
        self.levels.target_level_for_resolution(resolution)
    }

    pub fn estimate<R: Rng + ?Sized>(
        &self,
        sector: &Sector,
        resolution: f64,
        rng: &mut R,
    ) -> Result<BulkEstimate, BulkError> {
        let target = self
            .target_level(resolution)
            .ok_or(BulkError::NoTargetLevel(resolution))?
            .level_number();

        let mut estimate = BulkEstimate {
            target_level: target,
            total_tiles: 0,
            missing_tiles: 0,
            missing_bytes: 0,
            levels: Vec::new(),
        };
        let mut present_bytes = 0u64;
        let mut present_files = 0u64;

        for level in self.levels.levels()[..=target as usize]
            .iter()
            .filter(|l| !l.is_empty())
        {
            let Some(range) = self.levels.tile_range(sector, level) else {
                continue;
            };
            let level_total = range.count();
            let grid = CellGrid::new(range, self.config.max_tiles_per_cell);
            let sampled = grid.sample(rng, self.config.sample_count);

            let counted = sampled
                .par_iter()
                .map(|cell| self.count_cell(level, cell))
                .reduce(CellCount::default, CellCount::merge);

            let missing = extrapolate_missing(level_total, counted.missing, counted.total);
            debug!(
                level = level.level_number(),
                total = level_total,
                cells = grid.len(),
                sampled = counted.total,
                sampled_missing = counted.missing,
                missing,
                "Estimated level"
            );

            present_bytes += counted.present_bytes;
            present_files += counted.present_files;
            estimate.total_tiles += level_total;
            estimate.missing_tiles += missing;
            estimate.levels.push(LevelEstimate {
                level: level.level_number(),
                total_tiles: level_total,
                missing_tiles: missing,
                sampled_tiles: counted.total,
                sampled_missing: counted.missing,
            });
        }

        let average = if present_files > 0 {
            present_bytes / present_files
        } else {
            self.config.default_tile_bytes
        };
        estimate.missing_bytes = estimate.missing_tiles * average;
        Ok(estimate)
    }

    fn count_cell(&self, level: &Level, cell: &TileRange) -> CellCount {
        let mut count = CellCount::default();
        for row in cell.first_row..=cell.last_row {
            for col in cell.first_col..=cell.last_col {
                count.total += 1;
                let path = tile_cache_path(level.cache_name(), row, col, level.format_suffix());
                let present = self
                    .store
                    .find_file(&path)
                    .and_then(|found| std::fs::metadata(found).ok())
                    .filter(|meta| {
                        meta.modified()
                            .map(|modified| !self.levels.is_stale(modified))
                            .unwrap_or(true)
                    });
                match present {
                    Some(meta) => {
                        count.present_files += 1;
                        count.present_bytes += meta.len();
                    }
                    None => count.missing += 1,
                }
            }
        }
        count
    }
}

impl std::fmt::Debug for BulkEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkEstimator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
