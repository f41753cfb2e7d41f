//! Background work execution.
//!
//! - [`TaskScheduler`]: fixed worker pool with bounded, deduplicating
//!   admission
//! - [`RequestQueue`]: per-cycle priority buffer drained into the scheduler
//! - [`Task`]: the unit of work, identified by a [`TaskId`]

mod config;
mod request_queue;
mod scheduler;
mod task;

pub use config::{
    SchedulerConfig, DEFAULT_POOL_SIZE, DEFAULT_QUEUE_DEPTH, DEFAULT_THREAD_NAME_PREFIX,
};
pub use request_queue::{DrainReport, RequestQueue};
pub use scheduler::{FailureHandler, SchedulerError, SchedulerStats, SubmitOutcome, TaskScheduler};
pub use task::{Task, TaskId};
