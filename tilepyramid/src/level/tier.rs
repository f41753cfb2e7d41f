//! A single resolution tier of the pyramid.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::absence::{AbsenceConfig, AbsenceTracker};
use crate::geo::LatLon;

use super::TileKey;

/// One resolution tier: fixed tile geometry, a cache location and its own
/// absence tracker.
///
/// Levels are immutable after construction except for the `active` flag and
/// the absence state.
pub struct Level {
    level_number: u32,
    tile_delta: LatLon,
    tile_width: u32,
    tile_height: u32,
    cache_name: Arc<str>,
    dataset: String,
    format_suffix: String,
    service: Option<String>,
    expiry_time: Option<SystemTime>,
    placeholder: bool,
    active: AtomicBool,
    absence: AbsenceTracker<TileKey>,
}

/// Construction parameters for a [`Level`].
#[derive(Debug, Clone)]
pub struct LevelParams {
    pub level_number: u32,
    pub tile_delta: LatLon,
    pub tile_width: u32,
    pub tile_height: u32,
    pub cache_name: String,
    pub dataset: String,
    pub format_suffix: String,
    pub service: Option<String>,
    pub expiry_time: Option<SystemTime>,
    /// Coarse tier with no data of its own.
    pub placeholder: bool,
    pub active: bool,
    pub absence: AbsenceConfig,
}

impl Level {
    pub fn new(params: LevelParams) -> Self {
        Self {
            level_number: params.level_number,
            tile_delta: params.tile_delta,
            tile_width: params.tile_width,
            tile_height: params.tile_height,
            cache_name: params.cache_name.into(),
            dataset: params.dataset,
            format_suffix: params.format_suffix,
            service: params.service,
            expiry_time: params.expiry_time,
            placeholder: params.placeholder,
            active: AtomicBool::new(params.active),
            absence: AbsenceTracker::new(params.absence),
        }
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    /// Angular extent of one tile.
    pub fn tile_delta(&self) -> LatLon {
        self.tile_delta
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Dataset prefix of this level's cache paths, e.g. `Earth/BMNG/3`.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub(crate) fn shared_cache_name(&self) -> Arc<str> {
        Arc::clone(&self.cache_name)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn format_suffix(&self) -> &str {
        &self.format_suffix
    }

    /// Base URL of the remote service, if this level can be fetched remotely.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn expiry_time(&self) -> Option<SystemTime> {
        self.expiry_time
    }

    /// Angular size of one texel, in radians.
    pub fn texel_size(&self) -> f64 {
        self.tile_delta.lat.to_radians() / f64::from(self.tile_height)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// True for placeholder, nameless or inactive levels. No resource ever
    /// resolves to an empty level.
    pub fn is_empty(&self) -> bool {
        self.placeholder || self.dataset.is_empty() || !self.is_active()
    }

    pub fn absence(&self) -> &AbsenceTracker<TileKey> {
        &self.absence
    }

    pub fn is_resource_absent(&self, key: &TileKey) -> bool {
        self.absence.is_absent(key)
    }

    pub fn mark_resource_absent(&self, key: &TileKey) {
        self.absence.mark_absent(key.clone());
    }

    pub fn unmark_resource_absent(&self, key: &TileKey) {
        self.absence.unmark(key);
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("level_number", &self.level_number)
            .field("tile_delta", &self.tile_delta)
            .field("cache_name", &self.cache_name)
            .field("empty", &self.is_empty())
            .finish_non_exhaustive()
    }
}
