//! Multi-resolution tile pyramid.
//!
//! A [`LevelSet`] is an ordered set of [`Level`]s over one domain sector.
//! Each level halves the tile extent of the previous one. Tiles are
//! addressed by [`TileKey`] and materialised into [`Tile`]s carrying their
//! sector and cache path.

mod config;
mod level_set;
mod tier;
mod tile;

pub use config::{LevelSetConfig, SectorLevelLimit, DEFAULT_FORMAT_SUFFIX, DEFAULT_TILE_SIZE};
pub use level_set::{LevelSet, TileRange};
pub use tier::{Level, LevelParams};
pub use tile::{Tile, TileKey};

use thiserror::Error;

/// Errors raised while building or querying a level set.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level set must have at least one level")]
    NoLevels,

    #[error("too many levels ({0}): tile rows or columns would overflow")]
    TooManyLevels(u32),

    #[error("invalid level zero tile delta ({lat}, {lon})")]
    InvalidTileDelta { lat: f64, lon: f64 },

    #[error("invalid tile size {width}x{height}")]
    InvalidTileSize { width: u32, height: u32 },

    #[error("unknown level {0}")]
    UnknownLevel(u32),
}
