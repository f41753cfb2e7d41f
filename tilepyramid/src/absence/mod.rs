//! Resource-absence tracking.
//!
//! An [`AbsenceTracker`] is a per-resource circuit breaker. Each failed
//! attempt to obtain a resource is recorded with [`AbsenceTracker::mark_absent`].
//! Once a resource has failed `max_attempts` times it is reported absent
//! until `retry_interval` has passed since the last failure, which suppresses
//! repeated requests for tiles or hosts that are known to be unavailable.
//!
//! # State Machine
//!
//! ```text
//! Unknown --[mark_absent]--> Failing (attempts < limit)
//! Failing --[mark_absent]--> Absent  (attempts >= limit, interval running)
//! Absent  --[retry_interval elapsed]--> Retryable (one more attempt allowed)
//! Retryable --[mark_absent]--> Absent (timer restarted)
//! any --[unmark]--> Unknown
//! ```
//!
//! The attempt count is never reset by time alone; the caller clears it
//! with [`AbsenceTracker::unmark`] once a retry succeeds.
//!
//! # Thread Safety
//!
//! Records live in a sharded [`DashMap`]. Each update holds only the shard
//! lock for its key, so concurrent callers for the same id serialize without
//! deadlock and never lose the "at least one attempt" fact.

use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default attempt limit for hosts and generic resources.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Default retry interval for hosts and generic resources (120 seconds).
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(120);

/// Default attempt limit for tile resources.
pub const DEFAULT_TILE_MAX_ATTEMPTS: u32 = 2;

/// Default retry interval for tile resources (10 seconds).
pub const DEFAULT_TILE_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Default maximum number of tracked records before pruning.
pub const DEFAULT_CAPACITY: usize = 2000;

/// Configuration for an absence tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceConfig {
    /// Failed attempts before a resource is reported absent.
    pub max_attempts: u32,
    /// How long an absent resource stays absent after its last failure.
    pub retry_interval: Duration,
    /// Maximum number of records kept; the oldest are pruned beyond this.
    pub capacity: usize,
}

impl Default for AbsenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl AbsenceConfig {
    /// Defaults used by pyramid levels for tile resources.
    pub fn tiles() -> Self {
        Self {
            max_attempts: DEFAULT_TILE_MAX_ATTEMPTS,
            retry_interval: DEFAULT_TILE_RETRY_INTERVAL,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Failure record for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsenceEntry {
    /// Number of failed attempts since the last `unmark`.
    pub attempts: u32,
    /// Time of the most recent failure.
    pub last_attempt: Instant,
}

/// Per-resource failure counter with a retry timer.
pub struct AbsenceTracker<K>
where
    K: Eq + Hash,
{
    config: AbsenceConfig,
    entries: DashMap<K, AbsenceEntry>,
}

impl<K> fmt::Debug for AbsenceTracker<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbsenceTracker")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<K> Default for AbsenceTracker<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(AbsenceConfig::default())
    }
}

impl<K> AbsenceTracker<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(config: AbsenceConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AbsenceConfig {
        &self.config
    }

    /// Records a failed attempt for `id`.
    ///
    /// The first failure of an unknown id starts the count at 1. The
    /// last-attempt stamp never moves backwards.
    pub fn mark_absent(&self, id: K) {
        let now = Instant::now();
        self.entries
            .entry(id)
            .and_modify(|entry| {
                entry.attempts = entry.attempts.saturating_add(1);
                if now > entry.last_attempt {
                    entry.last_attempt = now;
                }
            })
            .or_insert(AbsenceEntry {
                attempts: 1,
                last_attempt: now,
            });

        if self.entries.len() > self.config.capacity {
            self.prune();
        }
    }

    /// Returns true while `id` has reached the attempt limit and the retry
    /// interval since its last failure has not yet elapsed.
    pub fn is_absent(&self, id: &K) -> bool {
        match self.entries.get(id) {
            Some(entry) => {
                entry.attempts >= self.config.max_attempts
                    && entry.last_attempt.elapsed() < self.config.retry_interval
            }
            None => false,
        }
    }

    /// Forgets everything about `id`.
    pub fn unmark(&self, id: &K) {
        self.entries.remove(id);
    }

    /// Number of failed attempts recorded for `id`.
    pub fn attempts(&self, id: &K) -> u32 {
        self.entries.get(id).map(|e| e.attempts).unwrap_or(0)
    }

    /// Snapshot of the record for `id`.
    pub fn entry(&self, id: &K) -> Option<AbsenceEntry> {
        self.entries.get(id).map(|e| *e)
    }

    /// Time of the most recent failure recorded across all ids.
    pub fn last_failure(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.last_attempt).max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drops the oldest records until the tracker is back under capacity.
    fn prune(&self) {
        let excess = self.entries.len().saturating_sub(self.config.capacity);
        if excess == 0 {
            return;
        }

        let mut stamps: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.last_attempt))
            .collect();
        stamps.sort_by_key(|(_, t)| *t);

        for (key, _) in stamps.into_iter().take(excess) {
            self.entries.remove(&key);
        }

        tracing::debug!(
            pruned = excess,
            capacity = self.config.capacity,
            "Absence tracker pruned oldest records"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn fast_tracker(max_attempts: u32, retry_ms: u64) -> AbsenceTracker<String> {
        AbsenceTracker::new(
            AbsenceConfig::default()
                .with_max_attempts(max_attempts)
                .with_retry_interval(Duration::from_millis(retry_ms)),
        )
    }

    #[test]
    fn test_default_config() {
        let config = AbsenceConfig::default();
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.retry_interval, Duration::from_secs(120));

        let tiles = AbsenceConfig::tiles();
        assert_eq!(tiles.max_attempts, 2);
        assert_eq!(tiles.retry_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_unknown_resource_is_not_absent() {
        let tracker = fast_tracker(2, 1000);
        assert!(!tracker.is_absent(&"a".to_string()));
        assert_eq!(tracker.attempts(&"a".to_string()), 0);
    }

    #[test]
    fn test_first_failure_starts_at_one() {
        let tracker = fast_tracker(3, 1000);
        tracker.mark_absent("a".to_string());
        assert_eq!(tracker.attempts(&"a".to_string()), 1);
        assert!(!tracker.is_absent(&"a".to_string()));
    }

    #[test]
    fn test_absent_after_limit_then_retryable_after_interval() {
        let tracker = fast_tracker(3, 50);
        let id = "tile".to_string();

        for _ in 0..3 {
            tracker.mark_absent(id.clone());
        }
        assert!(tracker.is_absent(&id));

        thread::sleep(Duration::from_millis(70));
        assert!(!tracker.is_absent(&id));
        // Count survives the interval until the caller clears it
        assert_eq!(tracker.attempts(&id), 3);

        // The allowed retry fails again: absent immediately
        tracker.mark_absent(id.clone());
        assert!(tracker.is_absent(&id));
    }

    #[test]
    fn test_unmark_gives_fresh_start() {
        let tracker = fast_tracker(1, 10_000);
        let id = "host".to_string();
        tracker.mark_absent(id.clone());
        assert!(tracker.is_absent(&id));

        tracker.unmark(&id);
        assert!(!tracker.is_absent(&id));
        assert_eq!(tracker.attempts(&id), 0);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_last_attempt_is_monotonic() {
        let tracker: AbsenceTracker<u64> = AbsenceTracker::new(
            AbsenceConfig::default()
                .with_max_attempts(5)
                .with_retry_interval(Duration::from_secs(10)),
        );
        tracker.mark_absent(1u64);
        let first = tracker.entry(&1).unwrap().last_attempt;
        thread::sleep(Duration::from_millis(5));
        tracker.mark_absent(1u64);
        let second = tracker.entry(&1).unwrap().last_attempt;
        assert!(second >= first);
    }

    #[test]
    fn test_prunes_oldest_beyond_capacity() {
        let tracker: AbsenceTracker<u32> =
            AbsenceTracker::new(AbsenceConfig::default().with_capacity(3));
        for id in 0..3 {
            tracker.mark_absent(id);
            thread::sleep(Duration::from_millis(2));
        }
        tracker.mark_absent(99);

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.attempts(&0), 0, "oldest record should be pruned");
        assert_eq!(tracker.attempts(&99), 1);
    }

    #[test]
    fn test_concurrent_marks_same_id() {
        let tracker = Arc::new(fast_tracker(1000, 10_000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.mark_absent("shared".to_string());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let attempts = tracker.attempts(&"shared".to_string());
        assert!(attempts >= 1);
        assert!(attempts <= 400);
    }
}
