//! Per-cycle priority buffer in front of the scheduler.
//!
//! Consumers rebuild the queue on every request cycle: push everything that
//! is missing with a priority (lower = sooner), then drain it into the
//! scheduler. Whatever does not fit is dropped and will be requested again
//! on a later cycle if it is still needed.

use std::sync::Arc;

use tracing::debug;

use super::scheduler::{SubmitOutcome, TaskScheduler};
use super::task::Task;

struct RequestTask {
    task: Arc<dyn Task>,
    priority: f64,
    sequence: u64,
}

/// Counts from one [`RequestQueue::drain_into`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub submitted: usize,
    pub duplicates: usize,
    pub discarded: usize,
    /// Left undrained because the scheduler filled up or shut down.
    pub deferred: usize,
}

impl DrainReport {
    pub fn total(&self) -> usize {
        self.submitted + self.duplicates + self.discarded + self.deferred
    }
}

/// Transient priority queue of tasks, reused across cycles.
#[derive(Default)]
pub struct RequestQueue {
    entries: Vec<RequestTask>,
    next_sequence: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears whatever is left from the previous cycle.
    pub fn begin_cycle(&mut self) {
        self.entries.clear();
        self.next_sequence = 0;
    }

    /// Adds a task. Lower priority values are submitted first; equal
    /// priorities keep insertion order.
    pub fn push(&mut self, task: Arc<dyn Task>, priority: f64) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(RequestTask {
            task,
            priority,
            sequence,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Submits queued tasks in priority order until the scheduler is full.
    /// The queue is empty afterwards.
    pub fn drain_into(&mut self, scheduler: &TaskScheduler) -> DrainReport {
        self.entries.sort_by(|a, b| {
            a.priority
                .total_cmp(&b.priority)
                .then(a.sequence.cmp(&b.sequence))
        });

        let mut report = DrainReport::default();
        let total = self.entries.len();
        for (index, entry) in self.entries.drain(..).enumerate() {
            if scheduler.is_full() {
                report.deferred = total - index;
                break;
            }
            match scheduler.submit(entry.task) {
                SubmitOutcome::Accepted => report.submitted += 1,
                SubmitOutcome::Duplicate => report.duplicates += 1,
                SubmitOutcome::Discarded => report.discarded += 1,
                SubmitOutcome::ShutDown => {
                    report.deferred = total - index;
                    break;
                }
            }
        }
        self.next_sequence = 0;

        if total > 0 {
            debug!(
                submitted = report.submitted,
                duplicates = report.duplicates,
                discarded = report.discarded,
                deferred = report.deferred,
                "Drained request queue"
            );
        }
        report
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{SchedulerConfig, TaskId};
    use parking_lot::{Condvar, Mutex};
    use std::time::Duration;

    /// Blocks until released, then records its id.
    struct RecordingTask {
        id: &'static str,
        gate: Arc<(Mutex<bool>, Condvar)>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Task for RecordingTask {
        fn id(&self) -> TaskId {
            TaskId::new(self.id)
        }

        fn name(&self) -> &str {
            self.id
        }

        fn run(&self) {
            let (lock, cvar) = &*self.gate;
            let mut open = lock.lock();
            while !*open {
                cvar.wait(&mut open);
            }
            self.log.lock().push(self.id);
        }
    }

    fn fixture() -> (Arc<(Mutex<bool>, Condvar)>, Arc<Mutex<Vec<&'static str>>>) {
        (
            Arc::new((Mutex::new(false), Condvar::new())),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    fn task(
        id: &'static str,
        gate: &Arc<(Mutex<bool>, Condvar)>,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn Task> {
        Arc::new(RecordingTask {
            id,
            gate: Arc::clone(gate),
            log: Arc::clone(log),
        })
    }

    fn open(gate: &Arc<(Mutex<bool>, Condvar)>) {
        *gate.0.lock() = true;
        gate.1.notify_all();
    }

    fn scheduler(queue_depth: usize) -> TaskScheduler {
        TaskScheduler::new(
            SchedulerConfig::default()
                .with_pool_size(1)
                .with_queue_depth(queue_depth)
                .with_lower_thread_priority(false),
        )
        .unwrap()
    }

    #[test]
    fn test_drains_in_priority_order() {
        let scheduler = scheduler(10);
        let (gate, log) = fixture();
        let mut queue = RequestQueue::new();

        queue.begin_cycle();
        queue.push(task("far", &gate, &log), 30.0);
        queue.push(task("near", &gate, &log), 1.0);
        queue.push(task("mid-a", &gate, &log), 10.0);
        queue.push(task("mid-b", &gate, &log), 10.0);

        let report = queue.drain_into(&scheduler);
        assert_eq!(report.submitted, 4);
        assert!(queue.is_empty());

        open(&gate);
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(*log.lock(), vec!["near", "mid-a", "mid-b", "far"]);
    }

    #[test]
    fn test_overflow_is_deferred() {
        let scheduler = scheduler(1); // capacity 2
        let (gate, log) = fixture();
        let mut queue = RequestQueue::new();

        for (i, id) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
            queue.push(task(id, &gate, &log), i as f64);
        }
        let report = queue.drain_into(&scheduler);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.deferred, 3);
        assert_eq!(report.total(), 5);
        assert!(queue.is_empty());

        open(&gate);
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicates_counted() {
        let scheduler = scheduler(10);
        let (gate, log) = fixture();
        let mut queue = RequestQueue::new();

        queue.push(task("same", &gate, &log), 1.0);
        queue.push(task("same", &gate, &log), 2.0);
        let report = queue.drain_into(&scheduler);
        assert_eq!(report.submitted, 1);
        assert_eq!(report.duplicates, 1);

        open(&gate);
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_begin_cycle_clears_leftovers() {
        let (gate, log) = fixture();
        let mut queue = RequestQueue::new();
        queue.push(task("stale", &gate, &log), 0.0);
        assert_eq!(queue.len(), 1);
        queue.begin_cycle();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_nan_priorities_sort_last() {
        let scheduler = scheduler(10);
        let (gate, log) = fixture();
        let mut queue = RequestQueue::new();
        queue.push(task("nan", &gate, &log), f64::NAN);
        queue.push(task("zero", &gate, &log), 0.0);
        queue.drain_into(&scheduler);

        open(&gate);
        assert!(scheduler.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(*log.lock(), vec!["zero", "nan"]);
    }
}
