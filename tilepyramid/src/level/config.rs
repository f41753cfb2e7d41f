//! Configuration for building a [`LevelSet`](super::LevelSet).

use std::time::SystemTime;

use crate::absence::AbsenceConfig;
use crate::geo::{LatLon, Sector};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Default format suffix for cached tiles.
pub const DEFAULT_FORMAT_SUFFIX: &str = "jpg";

/// Caps the finest level used inside a sub-region of the domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorLevelLimit {
    pub sector: Sector,
    pub max_level: u32,
}

impl SectorLevelLimit {
    pub fn new(sector: Sector, max_level: u32) -> Self {
        Self { sector, max_level }
    }
}

/// Construction parameters for a level set.
///
/// # Example
///
/// ```
/// use tilepyramid::geo::{LatLon, Sector};
/// use tilepyramid::level::{LevelSet, LevelSetConfig};
///
/// let config = LevelSetConfig::new("BlueMarble", Sector::full_sphere(), LatLon::new(36.0, 36.0), 4)
///     .with_cache_name("Earth/BlueMarble")
///     .with_format_suffix("png");
/// let levels = LevelSet::new(config).unwrap();
/// assert_eq!(levels.num_levels(), 4);
/// assert_eq!(levels.level(3).unwrap().tile_delta().lat, 4.5);
/// ```
#[derive(Debug, Clone)]
pub struct LevelSetConfig {
    /// Domain covered by the pyramid.
    pub sector: Sector,
    /// Tile extent at level 0.
    pub level_zero_tile_delta: LatLon,
    /// Corner from which rows and columns are counted.
    pub tile_origin: LatLon,
    pub num_levels: u32,
    /// Number of coarse placeholder levels with no data of their own.
    pub num_empty_levels: u32,
    /// Levels that start deactivated.
    pub inactive_levels: Vec<u32>,
    pub tile_width: u32,
    pub tile_height: u32,
    pub dataset: String,
    /// Cache directory prefix; the level number is appended per level.
    pub cache_name: String,
    pub format_suffix: String,
    /// Base URL of the remote service.
    pub service: Option<String>,
    /// Cached files modified before this instant are stale.
    pub expiry_time: Option<SystemTime>,
    pub sector_level_limits: Vec<SectorLevelLimit>,
    /// Absence policy applied to each level's tiles.
    pub tile_absence: AbsenceConfig,
}

impl LevelSetConfig {
    /// Creates a configuration with default tile geometry and the origin at
    /// the south-west corner of the globe.
    pub fn new(
        dataset: impl Into<String>,
        sector: Sector,
        level_zero_tile_delta: LatLon,
        num_levels: u32,
    ) -> Self {
        let dataset = dataset.into();
        Self {
            sector,
            level_zero_tile_delta,
            tile_origin: LatLon::new(-90.0, -180.0),
            num_levels,
            num_empty_levels: 0,
            inactive_levels: Vec::new(),
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            cache_name: dataset.clone(),
            dataset,
            format_suffix: DEFAULT_FORMAT_SUFFIX.to_string(),
            service: None,
            expiry_time: None,
            sector_level_limits: Vec::new(),
            tile_absence: AbsenceConfig::tiles(),
        }
    }

    pub fn with_tile_origin(mut self, origin: LatLon) -> Self {
        self.tile_origin = origin;
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_empty_levels(mut self, count: u32) -> Self {
        self.num_empty_levels = count;
        self
    }

    pub fn with_inactive_level(mut self, level: u32) -> Self {
        self.inactive_levels.push(level);
        self
    }

    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = cache_name.into();
        self
    }

    pub fn with_format_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.format_suffix = suffix.into();
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_expiry_time(mut self, expiry: SystemTime) -> Self {
        self.expiry_time = Some(expiry);
        self
    }

    pub fn with_sector_level_limit(mut self, sector: Sector, max_level: u32) -> Self {
        self.sector_level_limits
            .push(SectorLevelLimit::new(sector, max_level));
        self
    }

    pub fn with_tile_absence(mut self, absence: AbsenceConfig) -> Self {
        self.tile_absence = absence;
        self
    }
}
