//! Integration tests for the retrieval pipeline.
//!
//! These drive the public API end to end:
//! - request cycle → scheduler → retriever → disk and memory caches
//! - repeated failures → tile absence → suppressed requests
//! - bulk estimate and download over a temporary cache
//!
//! Run with: `cargo test --test pipeline_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Url;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tilepyramid::app::TileServices;
use tilepyramid::bulk::BulkOutcome;
use tilepyramid::config::ConfigFile;
use tilepyramid::geo::{LatLon, Sector};
use tilepyramid::network::ReachabilityProbe;
use tilepyramid::retrieval::{RetrieveError, Retrieved, Retriever};

// ============================================================================
// Helpers
// ============================================================================

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

/// Serves a fixed JPEG, or fails every request when `failing`.
struct StaticRetriever {
    failing: bool,
    calls: AtomicUsize,
}

impl StaticRetriever {
    fn serving() -> Arc<Self> {
        Arc::new(Self {
            failing: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Retriever for StaticRetriever {
    fn retrieve(&self, url: &Url) -> Result<Retrieved, RetrieveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            Err(RetrieveError::Status {
                status: 404,
                url: url.to_string(),
            })
        } else {
            Ok(Retrieved::new(JPEG, Some("image/jpeg")))
        }
    }
}

struct AlwaysReachable;

impl ReachabilityProbe for AlwaysReachable {
    fn is_reachable(&self, _host: &str) -> bool {
        true
    }
}

/// Three levels of 36, 18 and 9 degree tiles over the globe.
fn config(cache_dir: &TempDir) -> ConfigFile {
    let mut config = ConfigFile::default();
    config.cache.directory = cache_dir.path().to_path_buf();
    config.tiles.num_levels = 3;
    config.tiles.service = Some("https://tiles.example.com/wms".to_string());
    config.scheduler.pool_size = 2;
    config.scheduler.queue_depth = 32;
    config
}

fn region() -> Sector {
    Sector::new(0.0, 36.0, 0.0, 36.0).unwrap()
}

const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Request cycles
// ============================================================================

/// A cycle fetches every missing tile; the next cycle finds them cached.
#[test]
fn test_request_cycle_fills_caches() {
    let dir = TempDir::new().unwrap();
    let retriever = StaticRetriever::serving();
    let services =
        TileServices::start_with(&config(&dir), retriever.clone(), Arc::new(AlwaysReachable))
            .unwrap();
    let mut requester = services.requester();
    let viewer = LatLon::new(18.0, 18.0);

    let first = requester.request_cycle(viewer, &region(), Some(2));
    assert_eq!(first.level, Some(2));
    assert_eq!(first.tiles, 16);
    assert_eq!(first.requested, 16);
    assert_eq!(first.drain.submitted, 16);
    assert!(services.scheduler().wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(retriever.calls(), 16);

    let second = requester.request_cycle(viewer, &region(), Some(2));
    assert_eq!(second.cached, 16);
    assert_eq!(second.requested, 0);
    assert_eq!(retriever.calls(), 16);

    let levels = services.levels();
    let level = levels.level(2).unwrap();
    for key in levels.tiles_in_sector(&region(), level) {
        let tile = levels.create_tile(&key).unwrap();
        assert!(dir.path().join(tile.cache_path()).exists());
        assert_eq!(requester.tile_data(&tile).unwrap().as_ref(), JPEG);
    }

    services.shutdown();
}

/// Tiles that keep failing are marked absent and stop being requested.
#[test]
fn test_failing_tiles_become_absent() {
    let dir = TempDir::new().unwrap();
    let retriever = StaticRetriever::failing();
    let mut config = config(&dir);
    config.tiles.max_attempts = 2;
    config.tiles.retry_interval = Duration::from_secs(600);
    let services =
        TileServices::start_with(&config, retriever.clone(), Arc::new(AlwaysReachable)).unwrap();
    let mut requester = services.requester();
    let viewer = LatLon::new(18.0, 18.0);

    for _ in 0..2 {
        let report = requester.request_cycle(viewer, &region(), Some(1));
        assert_eq!(report.requested, 4);
        assert!(services.scheduler().wait_until_idle(IDLE_TIMEOUT));
    }
    assert_eq!(retriever.calls(), 8);

    let third = requester.request_cycle(viewer, &region(), Some(1));
    assert_eq!(third.absent, 4);
    assert_eq!(third.requested, 0);
    assert_eq!(retriever.calls(), 8);
}

/// Offline services never touch the retriever.
#[test]
fn test_offline_defers_everything() {
    let dir = TempDir::new().unwrap();
    let retriever = StaticRetriever::serving();
    let mut config = config(&dir);
    config.network.offline = true;
    let services =
        TileServices::start_with(&config, retriever.clone(), Arc::new(AlwaysReachable)).unwrap();
    let mut requester = services.requester();

    let report = requester.request_cycle(LatLon::new(18.0, 18.0), &region(), Some(1));
    assert_eq!(report.requested, 4);
    assert!(services.scheduler().wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(retriever.calls(), 0);

    // Deferred, not absent
    let again = requester.request_cycle(LatLon::new(18.0, 18.0), &region(), Some(1));
    assert_eq!(again.absent, 0);
    assert_eq!(again.requested, 4);
}

// ============================================================================
// Bulk
// ============================================================================

/// Estimate, download, then estimate again: nothing left to fetch.
#[test]
fn test_bulk_estimate_and_download() {
    let dir = TempDir::new().unwrap();
    let retriever = StaticRetriever::serving();
    let services =
        TileServices::start_with(&config(&dir), retriever.clone(), Arc::new(AlwaysReachable))
            .unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    let before = services.estimator().estimate(&region(), 18.0, &mut rng).unwrap();
    assert_eq!(before.target_level, 1);
    // Level 0 rows straddle the equator: 2 + 4 tiles
    assert_eq!(before.total_tiles, 6);
    assert_eq!(before.missing_tiles, 6);

    let downloader = services.bulk_downloader(region(), 18.0).unwrap();
    let outcome = downloader.run(&CancellationToken::new());
    let BulkOutcome::Completed(progress) = outcome else {
        panic!("download was cancelled");
    };
    assert_eq!(progress.current_count, 6);
    assert_eq!(progress.total_count, 6);
    assert_eq!(progress.current_size, 6 * JPEG.len() as u64);
    assert_eq!(retriever.calls(), 6);

    let after = services.estimator().estimate(&region(), 18.0, &mut rng).unwrap();
    assert_eq!(after.missing_tiles, 0);
    assert_eq!(after.missing_bytes, 0);
}

/// A cancelled token stops the download before any submission.
#[test]
fn test_bulk_download_cancelled() {
    let dir = TempDir::new().unwrap();
    let retriever = StaticRetriever::serving();
    let services =
        TileServices::start_with(&config(&dir), retriever.clone(), Arc::new(AlwaysReachable))
            .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = services.bulk_downloader(region(), 18.0).unwrap().run(&cancel);

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.progress().current_count, 0);
    assert_eq!(retriever.calls(), 0);
}
