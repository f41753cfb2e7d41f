//! Ordered set of resolution levels over a domain sector.

use std::cmp::Reverse;
use std::time::SystemTime;

use tracing::warn;

use crate::cache::tile_cache_path;
use crate::geo::{LatLon, Sector};

use super::config::{LevelSetConfig, SectorLevelLimit};
use super::tier::{Level, LevelParams};
use super::{LevelError, Tile, TileKey};

/// A pyramid of resolution levels.
///
/// Level `i` has tile extent `level_zero_tile_delta / 2^i`. Rows and columns
/// are counted from `tile_origin`; the sector of any key is a pure function
/// of those two values, so repeated key/sector conversions never drift.
#[derive(Debug)]
pub struct LevelSet {
    sector: Sector,
    level_zero_tile_delta: LatLon,
    tile_origin: LatLon,
    expiry_time: Option<SystemTime>,
    levels: Vec<Level>,
    /// Sorted finest-first.
    sector_level_limits: Vec<SectorLevelLimit>,
}

impl LevelSet {
    /// Builds the level set.
    ///
    /// Sector limits that reference a level outside `0..num_levels` are
    /// logged and ignored.
    pub fn new(config: LevelSetConfig) -> Result<Self, LevelError> {
        if config.num_levels == 0 {
            return Err(LevelError::NoLevels);
        }
        let delta = config.level_zero_tile_delta;
        if !(delta.lat.is_finite() && delta.lon.is_finite() && delta.lat > 0.0 && delta.lon > 0.0) {
            return Err(LevelError::InvalidTileDelta {
                lat: delta.lat,
                lon: delta.lon,
            });
        }
        if config.tile_width == 0 || config.tile_height == 0 {
            return Err(LevelError::InvalidTileSize {
                width: config.tile_width,
                height: config.tile_height,
            });
        }
        if config.num_levels > 62
            || !indices_fit(&config.sector, config.tile_origin, delta, config.num_levels - 1)
        {
            return Err(LevelError::TooManyLevels(config.num_levels));
        }

        let levels = (0..config.num_levels)
            .map(|n| {
                let divisor = (1u64 << n) as f64;
                Level::new(LevelParams {
                    level_number: n,
                    tile_delta: LatLon::new(delta.lat / divisor, delta.lon / divisor),
                    tile_width: config.tile_width,
                    tile_height: config.tile_height,
                    cache_name: format!("{}/{}", config.cache_name, n),
                    dataset: config.dataset.clone(),
                    format_suffix: config.format_suffix.clone(),
                    service: config.service.clone(),
                    expiry_time: config.expiry_time,
                    placeholder: n < config.num_empty_levels,
                    active: !config.inactive_levels.contains(&n),
                    absence: config.tile_absence.clone(),
                })
            })
            .collect();

        let mut limits: Vec<SectorLevelLimit> = config
            .sector_level_limits
            .into_iter()
            .filter(|limit| {
                if limit.max_level >= config.num_levels {
                    warn!(
                        max_level = limit.max_level,
                        num_levels = config.num_levels,
                        sector = %limit.sector,
                        "Ignoring sector level limit beyond the last level"
                    );
                    false
                } else {
                    true
                }
            })
            .collect();
        limits.sort_by_key(|limit| Reverse(limit.max_level));

        Ok(Self {
            sector: config.sector,
            level_zero_tile_delta: delta,
            tile_origin: config.tile_origin,
            expiry_time: config.expiry_time,
            levels,
            sector_level_limits: limits,
        })
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn level_zero_tile_delta(&self) -> LatLon {
        self.level_zero_tile_delta
    }

    pub fn tile_origin(&self) -> LatLon {
        self.tile_origin
    }

    pub fn expiry_time(&self) -> Option<SystemTime> {
        self.expiry_time
    }

    pub fn sector_level_limits(&self) -> &[SectorLevelLimit] {
        &self.sector_level_limits
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level_number: u32) -> Option<&Level> {
        self.levels.get(level_number as usize)
    }

    pub fn first_level(&self) -> &Level {
        &self.levels[0]
    }

    pub fn last_level(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    /// Unknown levels count as empty.
    pub fn is_level_empty(&self, level_number: u32) -> bool {
        self.level(level_number).map_or(true, Level::is_empty)
    }

    pub fn set_level_active(&self, level_number: u32, active: bool) -> Result<(), LevelError> {
        let level = self
            .level(level_number)
            .ok_or(LevelError::UnknownLevel(level_number))?;
        level.set_active(active);
        Ok(())
    }

    /// Finest non-empty level at or below `max_level`.
    fn finest_non_empty_at_or_below(&self, max_level: u32) -> Option<&Level> {
        let top = (max_level as usize).min(self.levels.len() - 1);
        self.levels[..=top].iter().rev().find(|level| !level.is_empty())
    }

    /// Finest usable level for a point, honouring sector limits.
    ///
    /// Limits are consulted finest-first and the first one containing the
    /// point wins. Returns `None` outside the domain or when every candidate
    /// level is empty.
    pub fn resolve_last_level(&self, lat: f64, lon: f64) -> Option<&Level> {
        if !self.sector.contains(lat, lon) {
            return None;
        }
        let max_level = self
            .sector_level_limits
            .iter()
            .find(|limit| limit.sector.contains(lat, lon))
            .map_or(self.last_level().level_number(), |limit| limit.max_level);
        self.finest_non_empty_at_or_below(max_level)
    }

    /// Finest usable level for a region: the first limit (finest-first)
    /// intersecting the region applies.
    pub fn last_level_for_sector(&self, sector: &Sector) -> Option<&Level> {
        if !self.sector.intersects(sector) {
            return None;
        }
        let max_level = self
            .sector_level_limits
            .iter()
            .find(|limit| limit.sector.intersects(sector))
            .map_or(self.last_level().level_number(), |limit| limit.max_level);
        self.finest_non_empty_at_or_below(max_level)
    }

    /// First non-empty level whose tile extent is at most `tile_extent`
    /// degrees; falls back to the finest non-empty level.
    pub fn target_level_for_resolution(&self, tile_extent: f64) -> Option<&Level> {
        self.levels
            .iter()
            .filter(|level| !level.is_empty())
            .find(|level| level.tile_delta().lat <= tile_extent)
            .or_else(|| self.levels.iter().rev().find(|level| !level.is_empty()))
    }

    /// Row of the tile containing `lat` at `level`.
    pub fn compute_row(&self, level: &Level, lat: f64) -> i32 {
        compute_index(level.tile_delta().lat, lat, self.tile_origin.lat)
    }

    /// Column of the tile containing `lon` at `level`.
    pub fn compute_col(&self, level: &Level, lon: f64) -> i32 {
        compute_index(level.tile_delta().lon, lon, self.tile_origin.lon)
    }

    /// Key of the tile containing a point.
    ///
    /// Points on the domain's north or east edge map to the last row or
    /// column inside the domain.
    pub fn tile_key_for(&self, lat: f64, lon: f64, level: &Level) -> TileKey {
        let mut row = self.compute_row(level, lat);
        let mut col = self.compute_col(level, lon);
        if lat >= self.sector.max_lat {
            row = row.min(self.last_row(level));
        }
        if lon >= self.sector.max_lon {
            col = col.min(self.last_col(level));
        }
        TileKey::new(level.level_number(), row, col, level.shared_cache_name())
    }

    /// Sector covered by a tile key.
    pub fn compute_sector_for_key(&self, key: &TileKey) -> Sector {
        let (delta_lat, delta_lon) = match self.level(key.level()) {
            Some(level) => (level.tile_delta().lat, level.tile_delta().lon),
            None => {
                let divisor = (1u64 << key.level().min(62)) as f64;
                (
                    self.level_zero_tile_delta.lat / divisor,
                    self.level_zero_tile_delta.lon / divisor,
                )
            }
        };
        let min_lat = self.tile_origin.lat + f64::from(key.row()) * delta_lat;
        let max_lat = self.tile_origin.lat + (f64::from(key.row()) + 1.0) * delta_lat;
        let min_lon = self.tile_origin.lon + f64::from(key.col()) * delta_lon;
        let max_lon = self.tile_origin.lon + (f64::from(key.col()) + 1.0) * delta_lon;
        Sector::from_bounds_unchecked(min_lat, max_lat, min_lon, max_lon)
    }

    /// Materialises a tile for `key`.
    pub fn create_tile(&self, key: &TileKey) -> Result<Tile, LevelError> {
        let level = self
            .level(key.level())
            .ok_or(LevelError::UnknownLevel(key.level()))?;
        let sector = self.compute_sector_for_key(key);
        let cache_path = tile_cache_path(key.cache_name(), key.row(), key.col(), level.format_suffix());
        Ok(Tile::new(
            key.clone(),
            sector,
            cache_path,
            level.tile_width(),
            level.tile_height(),
        ))
    }

    fn last_row(&self, level: &Level) -> i32 {
        let first = self.compute_row(level, self.sector.min_lat);
        far_edge_index(
            level.tile_delta().lat,
            self.sector.max_lat,
            self.tile_origin.lat,
            first,
        )
    }

    fn last_col(&self, level: &Level) -> i32 {
        let first = self.compute_col(level, self.sector.min_lon);
        far_edge_index(
            level.tile_delta().lon,
            self.sector.max_lon,
            self.tile_origin.lon,
            first,
        )
    }

    /// Inclusive row and column ranges of tiles intersecting `sector` at
    /// `level`, clipped to the domain. Tiles that only touch the north or
    /// east edge of the region are excluded.
    pub fn tile_range(&self, sector: &Sector, level: &Level) -> Option<TileRange> {
        let clipped = self.sector.intersection(sector)?;
        let delta = level.tile_delta();
        let first_row = compute_index(delta.lat, clipped.min_lat, self.tile_origin.lat);
        let first_col = compute_index(delta.lon, clipped.min_lon, self.tile_origin.lon);
        let last_row = far_edge_index(delta.lat, clipped.max_lat, self.tile_origin.lat, first_row);
        let last_col = far_edge_index(delta.lon, clipped.max_lon, self.tile_origin.lon, first_col);
        Some(TileRange {
            first_row,
            last_row,
            first_col,
            last_col,
        })
    }

    /// Number of tiles at `level` intersecting `sector`.
    pub fn tile_count_in_sector(&self, sector: &Sector, level: &Level) -> u64 {
        self.tile_range(sector, level).map_or(0, |r| r.count())
    }

    /// Keys of all tiles at `level` intersecting `sector`, row by row.
    pub fn tiles_in_sector<'a>(
        &self,
        sector: &Sector,
        level: &'a Level,
    ) -> impl Iterator<Item = TileKey> + 'a {
        let range = self.tile_range(sector, level);
        let cache_name = level.shared_cache_name();
        let level_number = level.level_number();
        range.into_iter().flat_map(move |r| {
            let cache_name = cache_name.clone();
            (r.first_row..=r.last_row).flat_map(move |row| {
                let cache_name = cache_name.clone();
                (r.first_col..=r.last_col)
                    .map(move |col| TileKey::new(level_number, row, col, cache_name.clone()))
            })
        })
    }

    pub fn is_resource_absent(&self, key: &TileKey) -> bool {
        self.level(key.level())
            .is_some_and(|level| level.is_resource_absent(key))
    }

    pub fn mark_resource_absent(&self, key: &TileKey) {
        if let Some(level) = self.level(key.level()) {
            level.mark_resource_absent(key);
        }
    }

    pub fn unmark_resource_absent(&self, key: &TileKey) {
        if let Some(level) = self.level(key.level()) {
            level.unmark_resource_absent(key);
        }
    }

    /// True if a file last modified at `modified` predates the expiry time.
    pub fn is_stale(&self, modified: SystemTime) -> bool {
        self.expiry_time.is_some_and(|expiry| modified < expiry)
    }
}

/// Inclusive tile index ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub first_row: i32,
    pub last_row: i32,
    pub first_col: i32,
    pub last_col: i32,
}

impl TileRange {
    pub fn rows(&self) -> u64 {
        (i64::from(self.last_row) - i64::from(self.first_row) + 1).max(0) as u64
    }

    pub fn cols(&self) -> u64 {
        (i64::from(self.last_col) - i64::from(self.first_col) + 1).max(0) as u64
    }

    pub fn count(&self) -> u64 {
        self.rows() * self.cols()
    }
}

/// `floor((coord - origin) / delta)`, corrected so that the tile it names
/// (computed as `origin + index * delta`) always contains `coord`.
fn compute_index(delta: f64, coord: f64, origin: f64) -> i32 {
    let mut index = ((coord - origin) / delta).floor() as i32;
    if origin + f64::from(index) * delta > coord {
        index -= 1;
    } else if origin + (f64::from(index) + 1.0) * delta <= coord {
        index = index.saturating_add(1);
    }
    index
}

/// Whether every row and column index of `level`, for points on the globe
/// or in `sector`, fits in an `i32` with room for the next index.
fn indices_fit(sector: &Sector, origin: LatLon, delta: LatLon, level: u32) -> bool {
    let divisor = (1u64 << level) as f64;
    let span = |origin: f64, values: [f64; 4]| {
        values
            .iter()
            .map(|v| (v - origin).abs())
            .fold(0.0, f64::max)
    };
    let lat_span = span(origin.lat, [-90.0, 90.0, sector.min_lat, sector.max_lat]);
    let lon_span = span(origin.lon, [-180.0, 180.0, sector.min_lon, sector.max_lon]);
    let limit = f64::from(i32::MAX - 1);
    let rows = (lat_span / (delta.lat / divisor)).ceil();
    let cols = (lon_span / (delta.lon / divisor)).ceil();
    rows <= limit && cols <= limit
}

/// Index of the last tile below a far (north/east) edge; a tile whose
/// southern/western edge sits exactly on the far edge is excluded.
fn far_edge_index(delta: f64, edge: f64, origin: f64, first: i32) -> i32 {
    let index = compute_index(delta, edge, origin);
    if index > first && origin + f64::from(index) * delta >= edge {
        index - 1
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::absence::AbsenceConfig;
    use std::time::Duration;

    fn globe(num_levels: u32) -> LevelSet {
        LevelSet::new(
            LevelSetConfig::new("test", Sector::full_sphere(), LatLon::new(36.0, 36.0), num_levels)
                .with_cache_name("Earth/Test"),
        )
        .unwrap()
    }

    #[test]
    fn test_tile_delta_halves_exactly() {
        let levels = globe(4);
        let deltas: Vec<f64> = levels.levels().iter().map(|l| l.tile_delta().lat).collect();
        assert_eq!(deltas, vec![36.0, 18.0, 9.0, 4.5]);
        for level in levels.levels() {
            let expected = 36.0 / 2f64.powi(level.level_number() as i32);
            assert_eq!(level.tile_delta().lat, expected);
            assert_eq!(level.tile_delta().lon, expected);
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let sector = Sector::full_sphere();
        assert!(matches!(
            LevelSet::new(LevelSetConfig::new("t", sector, LatLon::new(36.0, 36.0), 0)),
            Err(LevelError::NoLevels)
        ));
        assert!(matches!(
            LevelSet::new(LevelSetConfig::new("t", sector, LatLon::new(0.0, 36.0), 2)),
            Err(LevelError::InvalidTileDelta { .. })
        ));
        assert!(matches!(
            LevelSet::new(LevelSetConfig::new("t", sector, LatLon::new(36.0, 36.0), 2).with_tile_size(0, 512)),
            Err(LevelError::InvalidTileSize { .. })
        ));
    }

    #[test]
    fn test_level_count_limited_by_index_range() {
        // 36 degree tiles: level 27 has 10 * 2^27 columns, level 28 would not fit in i32
        let deepest = globe(28);
        assert!(matches!(
            LevelSet::new(LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 29)),
            Err(LevelError::TooManyLevels(29))
        ));

        let level = deepest.level(27).unwrap();
        let key = deepest.tile_key_for(89.0, 10.0, level);
        assert!(deepest.compute_sector_for_key(&key).contains(89.0, 10.0));
        let corner = deepest.tile_key_for(90.0, 180.0, level);
        assert_eq!(corner.row(), 5 * (1 << 27) - 1);
        assert_eq!(corner.col(), 10 * (1 << 27) - 1);
    }

    #[test]
    fn test_out_of_range_limit_is_ignored() {
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 3)
            .with_sector_level_limit(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(), 7)
            .with_sector_level_limit(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(), 1);
        let levels = LevelSet::new(config).unwrap();
        assert_eq!(levels.sector_level_limits().len(), 1);
        assert_eq!(levels.sector_level_limits()[0].max_level, 1);
    }

    #[test]
    fn test_limits_sorted_finest_first() {
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 5)
            .with_sector_level_limit(Sector::new(0.0, 50.0, 0.0, 50.0).unwrap(), 1)
            .with_sector_level_limit(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(), 3);
        let levels = LevelSet::new(config).unwrap();
        let order: Vec<u32> = levels.sector_level_limits().iter().map(|l| l.max_level).collect();
        assert_eq!(order, vec![3, 1]);

        // Inside both limits: finest-first, first match wins
        assert_eq!(levels.resolve_last_level(5.0, 5.0).unwrap().level_number(), 3);
        // Inside only the coarse limit
        assert_eq!(levels.resolve_last_level(30.0, 30.0).unwrap().level_number(), 1);
        // Outside all limits
        assert_eq!(levels.resolve_last_level(-30.0, -30.0).unwrap().level_number(), 4);
    }

    #[test]
    fn test_resolve_skips_empty_levels() {
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 4)
            .with_inactive_level(3);
        let levels = LevelSet::new(config).unwrap();
        assert_eq!(levels.resolve_last_level(0.0, 0.0).unwrap().level_number(), 2);

        levels.set_level_active(2, false).unwrap();
        assert_eq!(levels.resolve_last_level(0.0, 0.0).unwrap().level_number(), 1);
        assert!(levels.set_level_active(9, true).is_err());
    }

    #[test]
    fn test_resolve_outside_domain() {
        let config = LevelSetConfig::new("t", Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(), LatLon::new(1.0, 1.0), 2);
        let levels = LevelSet::new(config).unwrap();
        assert!(levels.resolve_last_level(20.0, 5.0).is_none());
    }

    #[test]
    fn test_placeholder_levels_are_empty() {
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 4)
            .with_empty_levels(2);
        let levels = LevelSet::new(config).unwrap();
        assert!(levels.is_level_empty(0));
        assert!(levels.is_level_empty(1));
        assert!(!levels.is_level_empty(2));
        assert!(levels.is_level_empty(42));
    }

    #[test]
    fn test_last_level_for_sector() {
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 5)
            .with_sector_level_limit(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(), 2);
        let levels = LevelSet::new(config).unwrap();

        let touching = Sector::new(5.0, 20.0, 5.0, 20.0).unwrap();
        assert_eq!(levels.last_level_for_sector(&touching).unwrap().level_number(), 2);

        let elsewhere = Sector::new(-20.0, -10.0, -20.0, -10.0).unwrap();
        assert_eq!(levels.last_level_for_sector(&elsewhere).unwrap().level_number(), 4);
    }

    #[test]
    fn test_target_level_for_resolution() {
        let levels = globe(4);
        assert_eq!(levels.target_level_for_resolution(20.0).unwrap().level_number(), 1);
        assert_eq!(levels.target_level_for_resolution(9.0).unwrap().level_number(), 2);
        // Finer than any level: fall back to the last
        assert_eq!(levels.target_level_for_resolution(0.01).unwrap().level_number(), 3);
    }

    #[test]
    fn test_tile_key_and_sector() {
        let levels = globe(4);
        let level = levels.level(0).unwrap();
        let key = levels.tile_key_for(10.0, 20.0, level);
        assert_eq!(key.row(), 2); // (10 + 90) / 36
        assert_eq!(key.col(), 5); // (20 + 180) / 36

        let sector = levels.compute_sector_for_key(&key);
        assert_eq!(sector.min_lat, -18.0);
        assert_eq!(sector.max_lat, 18.0);
        assert_eq!(sector.min_lon, 0.0);
        assert_eq!(sector.max_lon, 36.0);
        assert!(sector.contains(10.0, 20.0));
    }

    #[test]
    fn test_north_east_edge_maps_inside_domain() {
        let levels = globe(2);
        let level = levels.level(0).unwrap();
        let key = levels.tile_key_for(90.0, 180.0, level);
        assert_eq!(key.row(), 4);
        assert_eq!(key.col(), 9);
    }

    #[test]
    fn test_sector_round_trip_has_no_drift() {
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(0.1, 0.1), 6);
        let levels = LevelSet::new(config).unwrap();
        let level = levels.level(5).unwrap();

        let original = levels.tile_key_for(47.123456, 8.654321, level);
        let mut key = original.clone();
        for _ in 0..10 {
            let sector = levels.compute_sector_for_key(&key);
            let sw = sector.southwest();
            key = levels.tile_key_for(sw.lat, sw.lon, level);
        }
        assert_eq!(key, original);
        assert_eq!(
            levels.compute_sector_for_key(&key).southwest(),
            levels.compute_sector_for_key(&original).southwest()
        );
    }

    #[test]
    fn test_tile_count_and_enumeration() {
        let levels = globe(3);
        let level = levels.level(1).unwrap(); // 18 degree tiles

        let region = Sector::new(0.0, 36.0, 0.0, 36.0).unwrap();
        assert_eq!(levels.tile_count_in_sector(&region, level), 4);
        let keys: Vec<TileKey> = levels.tiles_in_sector(&region, level).collect();
        assert_eq!(keys.len(), 4);
        assert_eq!((keys[0].row(), keys[0].col()), (5, 10));
        assert_eq!((keys[3].row(), keys[3].col()), (6, 11));

        assert_eq!(levels.tile_count_in_sector(&Sector::full_sphere(), level), 10 * 20);
    }

    #[test]
    fn test_tile_count_outside_domain_is_zero() {
        let config = LevelSetConfig::new("t", Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(), LatLon::new(5.0, 5.0), 2)
            .with_tile_origin(LatLon::new(0.0, 0.0));
        let levels = LevelSet::new(config).unwrap();
        let level = levels.level(0).unwrap();
        let away = Sector::new(20.0, 30.0, 20.0, 30.0).unwrap();
        assert_eq!(levels.tile_count_in_sector(&away, level), 0);
        assert_eq!(levels.tiles_in_sector(&away, level).count(), 0);
        assert_eq!(levels.tile_count_in_sector(levels.sector(), level), 4);
    }

    #[test]
    fn test_create_tile() {
        let levels = globe(3);
        let key = TileKey::new(2, 3, 7, "Earth/Test/2");
        let tile = levels.create_tile(&key).unwrap();
        assert_eq!(tile.cache_path(), "Earth/Test/2/3/3_7.jpg");
        assert_eq!(tile.sector().min_lat, -90.0 + 3.0 * 9.0);
        assert_eq!(tile.width(), 512);

        assert!(levels.create_tile(&TileKey::new(9, 0, 0, "x")).is_err());
    }

    #[test]
    fn test_absence_delegates_to_level() {
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 2)
            .with_tile_absence(AbsenceConfig::tiles().with_max_attempts(1));
        let levels = LevelSet::new(config).unwrap();
        let key = levels.tile_key_for(0.0, 0.0, levels.level(1).unwrap());

        levels.mark_resource_absent(&key);
        assert!(levels.is_resource_absent(&key));
        assert!(!levels.level(0).unwrap().is_resource_absent(&key));

        levels.unmark_resource_absent(&key);
        assert!(!levels.is_resource_absent(&key));
    }

    #[test]
    fn test_is_stale() {
        let now = SystemTime::now();
        let config = LevelSetConfig::new("t", Sector::full_sphere(), LatLon::new(36.0, 36.0), 1)
            .with_expiry_time(now);
        let levels = LevelSet::new(config).unwrap();
        assert!(levels.is_stale(now - Duration::from_secs(60)));
        assert!(!levels.is_stale(now + Duration::from_secs(60)));

        assert!(!globe(1).is_stale(now - Duration::from_secs(3600)));
    }
}
