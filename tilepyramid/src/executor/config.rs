//! Scheduler configuration.

/// Default number of worker threads.
pub const DEFAULT_POOL_SIZE: usize = 1;

/// Default number of tasks that may wait beyond the running ones.
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "tile-worker";

/// Nice value applied to worker threads when priority lowering is enabled.
pub const WORKER_NICE: i32 = 10;

/// Configuration for [`TaskScheduler`](super::TaskScheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of worker threads.
    pub pool_size: usize,
    /// Tasks admitted beyond the ones currently running.
    pub queue_depth: usize,
    pub thread_name_prefix: String,
    /// Lower worker OS priority so the interactive thread stays responsive.
    pub lower_thread_priority: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            lower_thread_priority: true,
        }
    }
}

impl SchedulerConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_lower_thread_priority(mut self, lower: bool) -> Self {
        self.lower_thread_priority = lower;
        self
    }

    /// Maximum number of tasks pending or running at once.
    pub fn capacity(&self) -> usize {
        self.pool_size + self.queue_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.queue_depth, 10);
        assert_eq!(config.capacity(), 11);
        assert!(config.lower_thread_priority);
    }

    #[test]
    fn test_builders() {
        let config = SchedulerConfig::default()
            .with_pool_size(4)
            .with_queue_depth(0)
            .with_thread_name_prefix("bulk")
            .with_lower_thread_priority(false);
        assert_eq!(config.capacity(), 4);
        assert_eq!(config.thread_name_prefix, "bulk");
        assert!(!config.lower_thread_priority);
    }
}
