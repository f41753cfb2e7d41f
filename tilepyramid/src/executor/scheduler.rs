//! Bounded task scheduler.
//!
//! A fixed pool of named worker threads drains a FIFO queue. Admission is
//! bounded: at most `pool_size + queue_depth` tasks may be pending or
//! running, and a submission beyond that is discarded rather than blocking
//! the caller. Tasks are deduplicated by [`TaskId`] across the queue and the
//! running set.
//!
//! ```text
//! submit ──► [dedup] ──► [capacity] ──► queue ──► worker 1..N ──► run
//!               │             │                        │
//!           Duplicate     Discarded              panic? ──► FailureHandler
//! ```

use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use super::config::{SchedulerConfig, WORKER_NICE};
use super::task::{Task, TaskId};

// =============================================================================
// Public types
// =============================================================================

/// Errors constructing a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler pool size must be at least 1")]
    EmptyPool,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result of [`TaskScheduler::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued for execution.
    Accepted,
    /// Same id already pending or running; nothing was queued.
    Duplicate,
    /// Scheduler at capacity; the task was dropped.
    Discarded,
    /// Scheduler no longer accepts work.
    ShutDown,
}

impl SubmitOutcome {
    pub fn is_accepted(self) -> bool {
        self == SubmitOutcome::Accepted
    }
}

/// Called with the task id, task name and panic message when a task panics.
pub type FailureHandler = Arc<dyn Fn(&TaskId, &str, &str) + Send + Sync>;

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub discarded: u64,
    pub completed: u64,
    pub panicked: u64,
}

// =============================================================================
// Shared state
// =============================================================================

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    discarded: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

struct State {
    queue: VecDeque<Arc<dyn Task>>,
    /// Ids queued or running.
    in_flight: HashSet<TaskId>,
    /// Running task label per worker slot.
    running: Vec<Option<String>>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    work_available: Condvar,
    task_finished: Condvar,
    capacity: usize,
    counters: Counters,
    failure_handler: Option<FailureHandler>,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Fixed-size worker pool with bounded, deduplicating admission.
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    /// Starts the worker pool.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::build(config, None)
    }

    /// Starts the worker pool with a handler invoked when a task panics.
    pub fn with_failure_handler(
        config: SchedulerConfig,
        handler: FailureHandler,
    ) -> Result<Self, SchedulerError> {
        Self::build(config, Some(handler))
    }

    fn build(
        config: SchedulerConfig,
        failure_handler: Option<FailureHandler>,
    ) -> Result<Self, SchedulerError> {
        if config.pool_size == 0 {
            return Err(SchedulerError::EmptyPool);
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(config.capacity()),
                in_flight: HashSet::with_capacity(config.capacity()),
                running: vec![None; config.pool_size],
                shutdown: false,
            }),
            work_available: Condvar::new(),
            task_finished: Condvar::new(),
            capacity: config.capacity(),
            counters: Counters::default(),
            failure_handler,
        });

        let scheduler = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(config.pool_size)),
            config,
        };

        for slot in 0..scheduler.config.pool_size {
            let shared = Arc::clone(&scheduler.shared);
            let lower_priority = scheduler.config.lower_thread_priority;
            let handle = thread::Builder::new()
                .name(format!("{}-{}", scheduler.config.thread_name_prefix, slot))
                .spawn(move || worker_loop(shared, slot, lower_priority));
            match handle {
                Ok(handle) => scheduler.workers.lock().push(handle),
                Err(e) => {
                    // Dropping the scheduler joins the workers already started
                    return Err(SchedulerError::Spawn(e));
                }
            }
        }

        info!(
            pool_size = scheduler.config.pool_size,
            queue_depth = scheduler.config.queue_depth,
            prefix = %scheduler.config.thread_name_prefix,
            "Task scheduler started"
        );
        Ok(scheduler)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Offers a task for execution. Never blocks on capacity.
    pub fn submit(&self, task: Arc<dyn Task>) -> SubmitOutcome {
        let id = task.id();
        let mut state = self.shared.state.lock();

        if state.shutdown {
            return SubmitOutcome::ShutDown;
        }
        if state.in_flight.contains(&id) {
            self.shared.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            return SubmitOutcome::Duplicate;
        }
        if state.in_flight.len() >= self.shared.capacity {
            self.shared.counters.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(task = %id, name = task.name(), "Scheduler full, discarding task");
            return SubmitOutcome::Discarded;
        }

        state.in_flight.insert(id);
        state.queue.push_back(task);
        drop(state);

        self.shared.counters.accepted.fetch_add(1, Ordering::Relaxed);
        self.shared.work_available.notify_one();
        SubmitOutcome::Accepted
    }

    /// Tasks that can still be admitted right now.
    pub fn remaining_capacity(&self) -> usize {
        let state = self.shared.state.lock();
        self.shared.capacity.saturating_sub(state.in_flight.len())
    }

    /// True when the next submission would be discarded.
    pub fn is_full(&self) -> bool {
        self.remaining_capacity() == 0
    }

    /// Tasks pending or running.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn has_active_tasks(&self) -> bool {
        !self.shared.state.lock().in_flight.is_empty()
    }

    /// True while a task with this id is pending or running.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.shared.state.lock().in_flight.contains(id)
    }

    /// Names of the tasks currently running.
    pub fn active_labels(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .running
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.shared.counters;
        SchedulerStats {
            accepted: c.accepted.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            panicked: c.panicked.load(Ordering::Relaxed),
        }
    }

    /// Blocks until no task is pending or running, or `timeout` elapses.
    /// Returns whether the scheduler went idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.in_flight.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.shared
                .task_finished
                .wait_for(&mut state, deadline - now);
        }
        true
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Stops accepting work, drops queued tasks and joins the workers.
    /// Running tasks finish first. Idempotent.
    pub fn shutdown(&self) {
        let dropped = {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                0
            } else {
                state.shutdown = true;
                let queued: Vec<Arc<dyn Task>> = state.queue.drain(..).collect();
                for task in &queued {
                    state.in_flight.remove(&task.id());
                }
                queued.len()
            }
        };
        self.shared.work_available.notify_all();
        self.shared.task_finished.notify_all();

        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Worker thread terminated abnormally");
            }
        }
        info!(dropped_tasks = dropped, "Task scheduler stopped");
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

// =============================================================================
// Worker
// =============================================================================

#[cfg(target_os = "linux")]
fn lower_current_thread_priority() {
    // On Linux, PRIO_PROCESS with who = 0 targets the calling thread only.
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, WORKER_NICE) };
    if result != 0 {
        debug!(
            error = %std::io::Error::last_os_error(),
            "Could not lower worker thread priority"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn lower_current_thread_priority() {
    let _ = WORKER_NICE;
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn worker_loop(shared: Arc<Shared>, slot: usize, lower_priority: bool) {
    if lower_priority {
        lower_current_thread_priority();
    }

    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(task) = state.queue.pop_front() {
                    state.running[slot] = Some(task.name().to_string());
                    break task;
                }
                shared.work_available.wait(&mut state);
            }
        };

        let id = task.id();
        let span = info_span!("task", name = task.name(), id = %id);
        let result = {
            let _entered = span.enter();
            panic::catch_unwind(AssertUnwindSafe(|| task.run()))
        };

        match result {
            Ok(()) => {
                shared.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                shared.counters.panicked.fetch_add(1, Ordering::Relaxed);
                error!(task = %id, name = task.name(), panic = %message, "Task panicked");
                if let Some(handler) = &shared.failure_handler {
                    handler(&id, task.name(), &message);
                }
            }
        }

        {
            let mut state = shared.state.lock();
            state.in_flight.remove(&id);
            state.running[slot] = None;
        }
        shared.task_finished.notify_all();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    /// Task that blocks until released.
    struct GatedTask {
        id: TaskId,
        gate: Arc<(Mutex<bool>, Condvar)>,
        runs: Arc<AtomicUsize>,
    }

    impl Task for GatedTask {
        fn id(&self) -> TaskId {
            self.id.clone()
        }

        fn name(&self) -> &str {
            "gated"
        }

        fn run(&self) {
            let (lock, cvar) = &*self.gate;
            let mut open = lock.lock();
            while !*open {
                cvar.wait(&mut open);
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Gate(Arc<(Mutex<bool>, Condvar)>);

    impl Gate {
        fn new() -> Self {
            Self(Arc::new((Mutex::new(false), Condvar::new())))
        }

        fn task(&self, id: &str, runs: &Arc<AtomicUsize>) -> Arc<dyn Task> {
            Arc::new(GatedTask {
                id: TaskId::new(id),
                gate: Arc::clone(&self.0),
                runs: Arc::clone(runs),
            })
        }

        fn open(&self) {
            *self.0 .0.lock() = true;
            self.0 .1.notify_all();
        }
    }

    struct FnTask<F: Fn() + Send + Sync + 'static> {
        id: TaskId,
        f: F,
    }

    impl<F: Fn() + Send + Sync + 'static> Task for FnTask<F> {
        fn id(&self) -> TaskId {
            self.id.clone()
        }

        fn name(&self) -> &str {
            "fn"
        }

        fn run(&self) {
            (self.f)()
        }
    }

    fn config(pool: usize, depth: usize) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_pool_size(pool)
            .with_queue_depth(depth)
            .with_lower_thread_priority(false)
    }

    #[test]
    fn test_rejects_empty_pool() {
        assert!(matches!(
            TaskScheduler::new(config(0, 1)),
            Err(SchedulerError::EmptyPool)
        ));
    }

    #[test]
    fn test_bounded_admission() {
        let scheduler = TaskScheduler::new(config(1, 2)).unwrap();
        let gate = Gate::new();
        let runs = Arc::new(AtomicUsize::new(0));

        assert_eq!(scheduler.submit(gate.task("a", &runs)), SubmitOutcome::Accepted);
        assert_eq!(scheduler.submit(gate.task("b", &runs)), SubmitOutcome::Accepted);
        assert!(!scheduler.is_full());
        assert_eq!(scheduler.submit(gate.task("c", &runs)), SubmitOutcome::Accepted);
        assert!(scheduler.is_full());
        assert_eq!(scheduler.submit(gate.task("d", &runs)), SubmitOutcome::Discarded);

        let stats = scheduler.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.discarded, 1);

        gate.open();
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.remaining_capacity(), 3);
    }

    #[test]
    fn test_duplicate_runs_once() {
        let scheduler = TaskScheduler::new(config(1, 4)).unwrap();
        let gate = Gate::new();
        let runs = Arc::new(AtomicUsize::new(0));

        assert_eq!(scheduler.submit(gate.task("same", &runs)), SubmitOutcome::Accepted);
        assert!(scheduler.contains(&TaskId::new("same")));
        assert_eq!(scheduler.submit(gate.task("same", &runs)), SubmitOutcome::Duplicate);

        gate.open();
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().duplicates, 1);
        assert!(!scheduler.contains(&TaskId::new("same")));
    }

    #[test]
    fn test_same_id_accepted_again_after_completion() {
        let scheduler = TaskScheduler::new(config(1, 1)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let c = Arc::clone(&count);
            let task = Arc::new(FnTask {
                id: TaskId::new("repeat"),
                f: move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
            });
            assert!(scheduler.submit(task).is_accepted());
            assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let handler: FailureHandler = Arc::new(move |id: &TaskId, _name: &str, message: &str| {
            let _ = tx.lock().send((id.to_string(), message.to_string()));
        });
        let scheduler = TaskScheduler::with_failure_handler(config(1, 4), handler).unwrap();

        let boom = Arc::new(FnTask {
            id: TaskId::new("boom"),
            f: || panic!("kaboom"),
        });
        assert!(scheduler.submit(boom).is_accepted());

        let (id, message) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(id, "boom");
        assert_eq!(message, "kaboom");

        // The worker survives and keeps processing
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        let ok = Arc::new(FnTask {
            id: TaskId::new("ok"),
            f: move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
        });
        assert!(scheduler.submit(ok).is_accepted());
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let stats = scheduler.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_active_labels_while_running() {
        let scheduler = TaskScheduler::new(config(2, 0)).unwrap();
        let gate = Gate::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.submit(gate.task("x", &runs));

        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.active_labels().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(scheduler.active_labels(), vec!["gated".to_string()]);
        assert!(scheduler.has_active_tasks());

        gate.open();
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        assert!(scheduler.active_labels().is_empty());
    }

    #[test]
    fn test_shutdown_drops_queued_and_rejects_new() {
        let scheduler = TaskScheduler::new(config(1, 4)).unwrap();
        let gate = Gate::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.submit(gate.task("running", &runs));
        scheduler.submit(gate.task("queued", &runs));

        // Wait until the first task occupies the worker
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.queued() > 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        let opener = {
            let gate = Gate(Arc::clone(&gate.0));
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                gate.open();
            })
        };
        scheduler.shutdown();
        opener.join().unwrap();

        assert!(scheduler.is_shut_down());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.submit(gate.task("late", &runs)), SubmitOutcome::ShutDown);
    }
}
