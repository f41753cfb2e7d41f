//! Task trait and identity.
//!
//! A task is one unit of background work, usually "fetch this tile". Tasks
//! carry a [`TaskId`] so the scheduler can refuse a second copy of work
//! that is already pending or running.
//!
//! # Example
//!
//! ```
//! use tilepyramid::executor::{Task, TaskId};
//!
//! struct Ping;
//!
//! impl Task for Ping {
//!     fn id(&self) -> TaskId {
//!         TaskId::new("ping")
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Ping"
//!     }
//!
//!     fn run(&self) {}
//! }
//! ```

use std::fmt;
use std::sync::Arc;

/// Identity of a unit of work. Two tasks with equal ids are the same work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Arc<str>);

impl TaskId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A unit of background work executed by the
/// [`TaskScheduler`](super::TaskScheduler).
///
/// `run` executes on a worker thread. It should handle its own errors; a
/// panic is caught by the scheduler, logged and routed to the failure
/// handler, and never takes the worker down.
pub trait Task: Send + Sync + 'static {
    /// Deduplication key.
    fn id(&self) -> TaskId;

    /// Short label used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Performs the work.
    fn run(&self);
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_task_id_equality() {
        let a = TaskId::new("tile/3/1_2");
        let b = TaskId::from("tile/3/1_2".to_string());
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "tile/3/1_2");
        assert_eq!(a.to_string(), "tile/3/1_2");

        let set: HashSet<TaskId> = [a, b, TaskId::from("other")].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
