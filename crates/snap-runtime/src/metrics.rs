//! Runtime counters.
//!
//! [`RuntimeMetrics`] is a point-in-time copy of the counters the runtime
//! maintains while dispatching; [`Counters`] is the live, lock-free side.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of runtime activity since startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeMetrics {
    /// Launch calls accepted.
    pub launches: u64,
    /// Point tasks created (one per single launch, one per color of an
    /// index launch).
    pub points_launched: u64,
    /// Point tasks whose callback returned successfully.
    pub points_completed: u64,
    /// Point tasks whose callback failed or panicked.
    pub points_failed: u64,
    /// Point tasks discarded because the runtime was poisoned first.
    pub points_discarded: u64,
    /// Inline maps served.
    pub inline_maps: u64,
    /// Largest number of callbacks observed executing at once.
    pub peak_concurrency: usize,
    /// Worker thread count.
    pub workers: usize,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) launches: AtomicU64,
    pub(crate) points_launched: AtomicU64,
    pub(crate) points_completed: AtomicU64,
    pub(crate) points_failed: AtomicU64,
    pub(crate) points_discarded: AtomicU64,
    pub(crate) inline_maps: AtomicU64,
    executing: AtomicUsize,
    peak: AtomicUsize,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Mark a callback as started; tracks the concurrency high-water mark.
    pub(crate) fn enter(&self) {
        let now = self.executing.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
    }

    pub(crate) fn exit(&self) {
        self.executing.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn snapshot(&self, workers: usize) -> RuntimeMetrics {
        RuntimeMetrics {
            launches: self.launches.load(Ordering::Relaxed),
            points_launched: self.points_launched.load(Ordering::Relaxed),
            points_completed: self.points_completed.load(Ordering::Relaxed),
            points_failed: self.points_failed.load(Ordering::Relaxed),
            points_discarded: self.points_discarded.load(Ordering::Relaxed),
            inline_maps: self.inline_maps.load(Ordering::Relaxed),
            peak_concurrency: self.peak.load(Ordering::Acquire),
            workers,
        }
    }
}
