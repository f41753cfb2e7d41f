//! Typed sections of `config.ini` and their conversion into component configs.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::absence::{
    AbsenceConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL, DEFAULT_TILE_MAX_ATTEMPTS,
    DEFAULT_TILE_RETRY_INTERVAL,
};
use crate::bulk::{
    BulkConfig, DEFAULT_MAX_REGION_TILES, DEFAULT_MAX_TILES_PER_CELL, DEFAULT_SAMPLE_COUNT,
    DEFAULT_TILE_BYTES,
};
use crate::cache::DEFAULT_MEMORY_CACHE_BYTES;
use crate::executor::{SchedulerConfig, DEFAULT_POOL_SIZE, DEFAULT_QUEUE_DEPTH};
use crate::geo::{LatLon, Sector};
use crate::level::{LevelSetConfig, DEFAULT_FORMAT_SUFFIX, DEFAULT_TILE_SIZE};
use crate::network::{
    NetworkConfig, DEFAULT_CHECK_INTERVAL, DEFAULT_PROBE_TIMEOUT, DEFAULT_TEST_SITES,
};

pub const DEFAULT_DATASET: &str = "bmng";
pub const DEFAULT_LEVEL_ZERO_DELTA: f64 = 36.0;
pub const DEFAULT_NUM_LEVELS: u32 = 5;

/// Whole configuration file. Missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub scheduler: SchedulerSettings,
    pub absence: AbsenceSettings,
    pub tiles: TileSettings,
    pub network: NetworkSettings,
    pub cache: CacheSettings,
    pub bulk: BulkSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub pool_size: usize,
    pub queue_depth: usize,
    pub lower_thread_priority: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            lower_thread_priority: true,
        }
    }
}

/// Host-level absence limits used by the network monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceSettings {
    pub max_attempts: u32,
    pub retry_interval: Duration,
}

impl Default for AbsenceSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// The tiled dataset and its per-tile absence limits.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSettings {
    pub dataset: String,
    /// Base URL of the tile service; `None` means cache only.
    pub service: Option<String>,
    /// Cache directory name; the dataset name when unset.
    pub cache_name: Option<String>,
    pub sector: Sector,
    pub level_zero_delta: f64,
    pub num_levels: u32,
    pub tile_size: u32,
    pub format_suffix: String,
    pub max_attempts: u32,
    pub retry_interval: Duration,
    /// Cached files older than this are refetched.
    pub expiry: Option<DateTime<Utc>>,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            service: None,
            cache_name: None,
            sector: Sector::full_sphere(),
            level_zero_delta: DEFAULT_LEVEL_ZERO_DELTA,
            num_levels: DEFAULT_NUM_LEVELS,
            tile_size: DEFAULT_TILE_SIZE,
            format_suffix: DEFAULT_FORMAT_SUFFIX.to_string(),
            max_attempts: DEFAULT_TILE_MAX_ATTEMPTS,
            retry_interval: DEFAULT_TILE_RETRY_INTERVAL,
            expiry: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub offline: bool,
    pub test_sites: Vec<String>,
    pub probe_timeout: Duration,
    pub check_interval: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            offline: false,
            test_sites: DEFAULT_TEST_SITES.iter().map(|s| s.to_string()).collect(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    /// Extra read-only roots searched after `directory`.
    pub read_directories: Vec<PathBuf>,
    pub memory_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            read_directories: Vec::new(),
            memory_size: DEFAULT_MEMORY_CACHE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkSettings {
    pub max_tiles_per_cell: usize,
    pub sample_count: usize,
    pub default_tile_bytes: u64,
    pub max_region_tiles: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            max_tiles_per_cell: DEFAULT_MAX_TILES_PER_CELL,
            sample_count: DEFAULT_SAMPLE_COUNT,
            default_tile_bytes: DEFAULT_TILE_BYTES,
            max_region_tiles: DEFAULT_MAX_REGION_TILES,
        }
    }
}

/// `~/.cache/tilepyramid` or the platform equivalent.
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("tilepyramid")
}

impl ConfigFile {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_pool_size(self.scheduler.pool_size)
            .with_queue_depth(self.scheduler.queue_depth)
            .with_lower_thread_priority(self.scheduler.lower_thread_priority)
    }

    pub fn tile_absence_config(&self) -> AbsenceConfig {
        AbsenceConfig::tiles()
            .with_max_attempts(self.tiles.max_attempts)
            .with_retry_interval(self.tiles.retry_interval)
    }

    /// Network settings plus host absence limits. The tile service host,
    /// when configured, is probed first.
    pub fn network_config(&self) -> NetworkConfig {
        let mut config = NetworkConfig::default()
            .with_offline(self.network.offline)
            .with_host_attempt_limit(self.absence.max_attempts)
            .with_host_retry_interval(self.absence.retry_interval)
            .with_test_sites(self.network.test_sites.clone())
            .with_probe_timeout(self.network.probe_timeout)
            .with_check_interval(self.network.check_interval);
        if let Some(service) = &self.tiles.service {
            config = config.with_primary_host(service.clone());
        }
        config
    }

    pub fn bulk_config(&self) -> BulkConfig {
        BulkConfig::default()
            .with_max_tiles_per_cell(self.bulk.max_tiles_per_cell)
            .with_sample_count(self.bulk.sample_count)
            .with_default_tile_bytes(self.bulk.default_tile_bytes)
            .with_max_region_tiles(self.bulk.max_region_tiles)
    }

    /// Pyramid definition for the configured dataset.
    pub fn level_set_config(&self) -> LevelSetConfig {
        let tiles = &self.tiles;
        let delta = LatLon::new(tiles.level_zero_delta, tiles.level_zero_delta);
        let mut config = LevelSetConfig::new(&tiles.dataset, tiles.sector, delta, tiles.num_levels)
            .with_tile_size(tiles.tile_size, tiles.tile_size)
            .with_format_suffix(&tiles.format_suffix)
            .with_tile_absence(self.tile_absence_config());
        if let Some(cache_name) = &tiles.cache_name {
            config = config.with_cache_name(cache_name);
        }
        if let Some(service) = &tiles.service {
            config = config.with_service(service);
        }
        if let Some(expiry) = tiles.expiry {
            config = config.with_expiry_time(SystemTime::from(expiry));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_components() {
        let config = ConfigFile::default();
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
        assert_eq!(config.tile_absence_config(), AbsenceConfig::tiles());
        assert_eq!(config.network_config(), NetworkConfig::default());
        assert_eq!(config.bulk_config(), BulkConfig::default());
    }

    #[test]
    fn test_service_becomes_primary_host() {
        let mut config = ConfigFile::default();
        config.tiles.service = Some("https://tiles.example.com/wms".to_string());
        assert_eq!(
            config.network_config().primary_host.as_deref(),
            Some("https://tiles.example.com/wms")
        );
        assert_eq!(
            config.level_set_config().service.as_deref(),
            Some("https://tiles.example.com/wms")
        );
    }
}
