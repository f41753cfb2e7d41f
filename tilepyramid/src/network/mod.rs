//! Network availability: per-host failure tracking, an offline switch and
//! rate-limited reachability probing.

mod monitor;
mod probe;

pub use monitor::{
    extract_host, NetworkConfig, NetworkMonitor, DEFAULT_CHECK_INTERVAL, DEFAULT_PROBE_TIMEOUT,
    DEFAULT_TEST_SITES,
};
pub use probe::{HttpProbe, ReachabilityProbe};
