//! Serializes [`ConfigFile`] to the commented INI written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let sector = config.tiles.sector;
    let expiry = config
        .tiles
        .expiry
        .map(|e| e.to_rfc3339())
        .unwrap_or_default();
    let read_directories = config
        .cache
        .read_directories
        .iter()
        .map(|p| path_to_string(p))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"[scheduler]
; Worker threads fetching tiles (default: 1)
pool_size = {pool_size}
; Tasks admitted beyond those running; further requests are discarded (default: 10)
queue_depth = {queue_depth}
; Run workers at reduced OS priority
lower_thread_priority = {lower_priority}

[absence]
; Failed attempts before a host is considered unavailable (default: 8)
max_attempts = {host_attempts}
; Seconds before an unavailable host is retried (default: 120)
retry_interval = {host_interval}

[tiles]
; Dataset name, used as the cache directory when cache_name is empty
dataset = {dataset}
; Base URL of the tile service. Empty means serve from cache only
service = {service}
cache_name = {cache_name}
; Coverage as min_lat,min_lon,max_lat,max_lon
sector = {min_lat},{min_lon},{max_lat},{max_lon}
; Tile extent of level 0 in degrees; each level halves it
level_zero_delta = {delta}
num_levels = {num_levels}
; Tile width and height in pixels
tile_size = {tile_size}
format = {format}
; Failed attempts before a tile is considered absent (default: 2)
max_attempts = {tile_attempts}
; Seconds before an absent tile is retried (default: 10)
retry_interval = {tile_interval}
; Cached tiles older than this RFC 3339 timestamp are refetched
expiry = {expiry}

[network]
; Never touch the network
offline = {offline}
; Comma separated hosts probed to decide whether the network is up
test_sites = {test_sites}
; Seconds per reachability probe
probe_timeout = {probe_timeout}
; Minimum seconds between probe rounds
check_interval = {check_interval}

[cache]
; Writable tile cache root
directory = {directory}
; Comma separated read-only cache roots searched after directory
read_directories = {read_directories}
; Memory cache size, e.g. 256MB or 2GB
memory_size = {memory_size}

[bulk]
; Maximum tiles per sampling cell
max_tiles_per_cell = {cell}
; Cells sampled per level when estimating
sample_count = {samples}
; Assumed tile size when nothing is cached yet
default_tile_size = {tile_bytes}
; Tiles submitted per scheduling round
max_region_tiles = {region_tiles}
"#,
        pool_size = config.scheduler.pool_size,
        queue_depth = config.scheduler.queue_depth,
        lower_priority = config.scheduler.lower_thread_priority,
        host_attempts = config.absence.max_attempts,
        host_interval = config.absence.retry_interval.as_secs(),
        dataset = config.tiles.dataset,
        service = config.tiles.service.as_deref().unwrap_or(""),
        cache_name = config.tiles.cache_name.as_deref().unwrap_or(""),
        min_lat = sector.min_lat,
        min_lon = sector.min_lon,
        max_lat = sector.max_lat,
        max_lon = sector.max_lon,
        delta = config.tiles.level_zero_delta,
        num_levels = config.tiles.num_levels,
        tile_size = config.tiles.tile_size,
        format = config.tiles.format_suffix,
        tile_attempts = config.tiles.max_attempts,
        tile_interval = config.tiles.retry_interval.as_secs(),
        expiry = expiry,
        offline = config.network.offline,
        test_sites = config.network.test_sites.join(", "),
        probe_timeout = config.network.probe_timeout.as_secs(),
        check_interval = config.network.check_interval.as_secs(),
        directory = path_to_string(&config.cache.directory),
        read_directories = read_directories,
        memory_size = format_size(config.cache.memory_size),
        cell = config.bulk.max_tiles_per_cell,
        samples = config.bulk.sample_count,
        tile_bytes = format_size(config.bulk.default_tile_bytes),
        region_tiles = config.bulk.max_region_tiles,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_every_section() {
        let text = to_config_string(&ConfigFile::default());
        for section in ["[scheduler]", "[absence]", "[tiles]", "[network]", "[cache]", "[bulk]"] {
            assert!(text.contains(section), "missing {section}");
        }
        assert!(text.contains("pool_size = 1\n"));
        assert!(text.contains("sector = -90,-180,90,180\n"));
        assert!(text.contains("memory_size = 256MB\n"));
    }
}
