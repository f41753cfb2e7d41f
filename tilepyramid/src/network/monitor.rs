//! Network availability monitor.
//!
//! Tracks per-host failures with an [`AbsenceTracker`] and answers "is the
//! network usable at all" from recent traffic, falling back to a rate
//! limited probe round when recent traffic does not decide it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, info, warn};

use super::probe::ReachabilityProbe;
use crate::absence::{AbsenceConfig, AbsenceTracker, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL};

/// Default minimum time between probe rounds.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Hosts probed when no primary host answers.
pub const DEFAULT_TEST_SITES: &[&str] = &["www.google.com", "www.microsoft.com", "www.apple.com"];

/// Configuration for [`NetworkMonitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Start in offline mode.
    pub offline: bool,
    pub host_attempt_limit: u32,
    pub host_retry_interval: Duration,
    pub test_sites: Vec<String>,
    /// Host probed before the test sites, typically the tile service.
    pub primary_host: Option<String>,
    pub probe_timeout: Duration,
    /// Minimum time between probe rounds.
    pub check_interval: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            offline: false,
            host_attempt_limit: DEFAULT_MAX_ATTEMPTS,
            host_retry_interval: DEFAULT_RETRY_INTERVAL,
            test_sites: DEFAULT_TEST_SITES.iter().map(|s| s.to_string()).collect(),
            primary_host: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl NetworkConfig {
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_host_attempt_limit(mut self, limit: u32) -> Self {
        self.host_attempt_limit = limit;
        self
    }

    pub fn with_host_retry_interval(mut self, interval: Duration) -> Self {
        self.host_retry_interval = interval;
        self
    }

    pub fn with_test_sites(mut self, sites: Vec<String>) -> Self {
        self.test_sites = sites;
        self
    }

    pub fn with_primary_host(mut self, host: impl Into<String>) -> Self {
        self.primary_host = Some(host.into());
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    fn host_absence(&self) -> AbsenceConfig {
        AbsenceConfig::default()
            .with_max_attempts(self.host_attempt_limit)
            .with_retry_interval(self.host_retry_interval)
    }
}

/// Host name of a URL, or the trimmed input when it is not a URL.
pub fn extract_host(url_or_host: &str) -> String {
    let trimmed = url_or_host.trim();
    Url::parse(trimmed)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| trimmed.trim_end_matches('/').to_string())
        .to_ascii_lowercase()
}

#[derive(Default)]
struct Activity {
    last_success: Option<Instant>,
    last_failure: Option<Instant>,
}

#[derive(Default)]
struct ProbeState {
    last_check: Option<Instant>,
    unavailable: bool,
    in_progress: bool,
}

/// Clears `in_progress` when a probe round ends, even by unwinding.
struct ProbeRound<'a>(&'a Mutex<ProbeState>);

impl Drop for ProbeRound<'_> {
    fn drop(&mut self) {
        self.0.lock().in_progress = false;
    }
}

/// Shared view of network and per-host availability.
pub struct NetworkMonitor {
    config: NetworkConfig,
    offline: AtomicBool,
    hosts: AbsenceTracker<String>,
    activity: Mutex<Activity>,
    probe_state: Mutex<ProbeState>,
    probe: Arc<dyn ReachabilityProbe>,
}

impl NetworkMonitor {
    pub fn new(config: NetworkConfig, probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self {
            offline: AtomicBool::new(config.offline),
            hosts: AbsenceTracker::new(config.host_absence()),
            activity: Mutex::new(Activity::default()),
            probe_state: Mutex::new(ProbeState::default()),
            probe,
            config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    pub fn set_offline(&self, offline: bool) {
        let previous = self.offline.swap(offline, Ordering::AcqRel);
        if previous != offline {
            info!(offline, "Network offline mode changed");
        }
    }

    /// Records a failed request to the host of `url_or_host`.
    pub fn log_unavailable(&self, url_or_host: &str) {
        let host = extract_host(url_or_host);
        self.hosts.mark_absent(host.clone());
        self.activity.lock().last_failure = Some(Instant::now());
        if self.hosts.is_absent(&host) {
            warn!(host = %host, attempts = self.hosts.attempts(&host), "Host marked unavailable");
        } else {
            debug!(host = %host, "Request to host failed");
        }
    }

    /// Records a successful request to the host of `url_or_host`.
    pub fn log_available(&self, url_or_host: &str) {
        let host = extract_host(url_or_host);
        if self.hosts.attempts(&host) > 0 {
            debug!(host = %host, "Host available again");
            self.hosts.unmark(&host);
        }
        self.activity.lock().last_success = Some(Instant::now());
    }

    /// True when offline or when the host has failed too often recently.
    pub fn is_host_unavailable(&self, url_or_host: &str) -> bool {
        if self.is_offline() {
            return true;
        }
        self.hosts.is_absent(&extract_host(url_or_host))
    }

    /// Whether the network as a whole appears unusable.
    ///
    /// A success more recent than the last failure answers `false` at once.
    /// Otherwise at most one probe round runs per `check_interval`; callers
    /// inside the window, or arriving while a round is running, get the
    /// memoized answer instead of waiting on the probes.
    pub fn is_network_unavailable(&self, check_interval: Duration) -> bool {
        if self.is_offline() {
            return true;
        }

        {
            let activity = self.activity.lock();
            if let Some(success) = activity.last_success {
                if activity.last_failure.map_or(true, |failure| success > failure) {
                    return false;
                }
            }
        }

        let round = {
            let mut state = self.probe_state.lock();
            if state.in_progress {
                return state.unavailable;
            }
            if let Some(last_check) = state.last_check {
                if last_check.elapsed() < check_interval {
                    return state.unavailable;
                }
            }
            state.in_progress = true;
            ProbeRound(&self.probe_state)
        };

        let reachable = self.probe_round();
        {
            let mut state = self.probe_state.lock();
            state.last_check = Some(Instant::now());
            state.unavailable = !reachable;
        }
        drop(round);
        if reachable {
            debug!("Network reachable");
        } else {
            warn!("Network unavailable: no probe target answered");
        }
        !reachable
    }

    /// Same as [`is_network_unavailable`](Self::is_network_unavailable)
    /// with the configured interval.
    pub fn check_network(&self) -> bool {
        self.is_network_unavailable(self.config.check_interval)
    }

    fn probe_round(&self) -> bool {
        self.config
            .primary_host
            .iter()
            .chain(self.config.test_sites.iter())
            .any(|target| self.probe.is_reachable(target))
    }

    /// Host failure records currently held.
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("offline", &self.is_offline())
            .field("tracked_hosts", &self.hosts.len())
            .finish()
    }
}
