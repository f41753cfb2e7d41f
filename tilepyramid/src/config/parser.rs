//! Maps INI keys onto [`ConfigFile`] fields.
//!
//! Starts from `ConfigFile::default()` and overlays every key present.
//! Empty values leave the default in place.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ini::{Ini, Properties};

use super::file::ConfigError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::geo::Sector;

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("scheduler")) {
        let s = Section::new("scheduler", section);
        if let Some(v) = s.positive("pool_size")? {
            config.scheduler.pool_size = v;
        }
        if let Some(v) = s.parse("queue_depth", "must be a non-negative integer")? {
            config.scheduler.queue_depth = v;
        }
        if let Some(v) = s.boolean("lower_thread_priority")? {
            config.scheduler.lower_thread_priority = v;
        }
    }

    if let Some(section) = ini.section(Some("absence")) {
        let s = Section::new("absence", section);
        if let Some(v) = s.positive("max_attempts")? {
            config.absence.max_attempts = v;
        }
        if let Some(v) = s.seconds("retry_interval")? {
            config.absence.retry_interval = v;
        }
    }

    if let Some(section) = ini.section(Some("tiles")) {
        let s = Section::new("tiles", section);
        if let Some(v) = s.text("dataset") {
            config.tiles.dataset = v.to_string();
        }
        config.tiles.service = s.text("service").map(str::to_string);
        config.tiles.cache_name = s.text("cache_name").map(str::to_string);
        if let Some(v) = s.text("sector") {
            config.tiles.sector = Sector::parse(v).map_err(|_| {
                s.invalid("sector", v, "expected 'min_lat,min_lon,max_lat,max_lon'")
            })?;
        }
        if let Some(v) = s.parse::<f64>("level_zero_delta", "must be a positive number")? {
            if !(v > 0.0 && v <= 180.0) {
                return Err(s.invalid("level_zero_delta", &v.to_string(), "must be in (0, 180]"));
            }
            config.tiles.level_zero_delta = v;
        }
        if let Some(v) = s.positive("num_levels")? {
            config.tiles.num_levels = v;
        }
        if let Some(v) = s.positive("tile_size")? {
            config.tiles.tile_size = v;
        }
        if let Some(v) = s.text("format") {
            config.tiles.format_suffix = v.trim_start_matches('.').to_lowercase();
        }
        if let Some(v) = s.positive("max_attempts")? {
            config.tiles.max_attempts = v;
        }
        if let Some(v) = s.seconds("retry_interval")? {
            config.tiles.retry_interval = v;
        }
        if let Some(v) = s.text("expiry") {
            let parsed = DateTime::parse_from_rfc3339(v).map_err(|_| {
                s.invalid("expiry", v, "expected an RFC 3339 timestamp like 2024-01-01T00:00:00Z")
            })?;
            config.tiles.expiry = Some(parsed.with_timezone(&Utc));
        }
    }

    if let Some(section) = ini.section(Some("network")) {
        let s = Section::new("network", section);
        if let Some(v) = s.boolean("offline")? {
            config.network.offline = v;
        }
        if let Some(v) = s.text("test_sites") {
            config.network.test_sites = v
                .split(',')
                .map(str::trim)
                .filter(|site| !site.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = s.seconds("probe_timeout")? {
            config.network.probe_timeout = v;
        }
        if let Some(v) = s.seconds("check_interval")? {
            config.network.check_interval = v;
        }
    }

    if let Some(section) = ini.section(Some("cache")) {
        let s = Section::new("cache", section);
        if let Some(v) = s.text("directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = s.text("read_directories") {
            config.cache.read_directories = v
                .split(',')
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(expand_tilde)
                .collect();
        }
        if let Some(v) = s.text("memory_size") {
            config.cache.memory_size = parse_size(v).map_err(|_| {
                s.invalid("memory_size", v, "expected format like '256MB', '2GB' or '1024KB'")
            })?;
        }
    }

    if let Some(section) = ini.section(Some("bulk")) {
        let s = Section::new("bulk", section);
        if let Some(v) = s.positive("max_tiles_per_cell")? {
            config.bulk.max_tiles_per_cell = v;
        }
        if let Some(v) = s.positive("sample_count")? {
            config.bulk.sample_count = v;
        }
        if let Some(v) = s.text("default_tile_size") {
            config.bulk.default_tile_bytes = parse_size(v).map_err(|_| {
                s.invalid("default_tile_size", v, "expected format like '64KB'")
            })?;
        }
        if let Some(v) = s.positive("max_region_tiles")? {
            config.bulk.max_region_tiles = v;
        }
    }

    Ok(config)
}

/// One INI section plus its name, for error reporting.
struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, props: &'a Properties) -> Self {
        Self { name, props }
    }

    /// Trimmed value, `None` when missing or empty.
    fn text(&self, key: &str) -> Option<&'a str> {
        self.props
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigError> {
        self.text(key)
            .map(|v| v.parse().map_err(|_| self.invalid(key, v, reason)))
            .transpose()
    }

    fn positive<T: FromStr + PartialOrd + Default>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ConfigError> {
        const REASON: &str = "must be a positive integer";
        match self.parse::<T>(key, REASON)? {
            Some(v) if v <= T::default() => {
                Err(self.invalid(key, self.text(key).unwrap_or_default(), REASON))
            }
            other => Ok(other),
        }
    }

    fn seconds(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self
            .parse::<u64>(key, "must be a whole number of seconds")?
            .map(Duration::from_secs))
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.text(key)
            .map(|v| match v.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, v, "must be 'true' or 'false'")),
            })
            .transpose()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
