//! Bulk download progress counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`BulkProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ProgressSnapshot {
    pub current_count: u64,
    pub current_size: u64,
    pub total_count: u64,
    pub total_size: u64,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`; 1.0 when there is nothing to do.
    pub fn fraction(&self) -> f64 {
        if self.total_count == 0 {
            1.0
        } else {
            (self.current_count as f64 / self.total_count as f64).min(1.0)
        }
    }
}

/// Lock-free progress counters shared between the driver, its fetch tasks
/// and observers.
///
/// Totals start as an upper bound and are corrected downward as tiles turn
/// out to be present, absent or already in flight. Every update keeps
/// `total >= current` for both counts and sizes.
#[derive(Debug, Default)]
pub struct BulkProgress {
    current_count: AtomicU64,
    current_size: AtomicU64,
    total_count: AtomicU64,
    total_size: AtomicU64,
}

impl BulkProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the totals, raised to at least the current values.
    pub fn set_totals(&self, count: u64, size: u64) {
        let current_count = self.current_count.load(Ordering::Acquire);
        let current_size = self.current_size.load(Ordering::Acquire);
        self.total_count
            .store(count.max(current_count), Ordering::Release);
        self.total_size.store(size.max(current_size), Ordering::Release);
    }

    /// Records one finished tile of `size` bytes.
    pub fn record_completion(&self, size: u64) {
        let count = self.current_count.fetch_add(1, Ordering::AcqRel) + 1;
        let bytes = self.current_size.fetch_add(size, Ordering::AcqRel) + size;
        self.total_count.fetch_max(count, Ordering::AcqRel);
        self.total_size.fetch_max(bytes, Ordering::AcqRel);
    }

    /// Removes work that will not be done from the totals.
    pub fn discount(&self, count: u64, size: u64) {
        Self::lower(&self.total_count, &self.current_count, count);
        Self::lower(&self.total_size, &self.current_size, size);
    }

    fn lower(total: &AtomicU64, current: &AtomicU64, by: u64) {
        let _ = total.fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
            let floor = current.load(Ordering::Acquire);
            Some(t.saturating_sub(by).max(floor))
        });
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current_count: self.current_count.load(Ordering::Acquire),
            current_size: self.current_size.load(Ordering::Acquire),
            total_count: self.total_count.load(Ordering::Acquire),
            total_size: self.total_size.load(Ordering::Acquire),
        }
    }
}
