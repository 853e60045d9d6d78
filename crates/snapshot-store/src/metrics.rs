use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::DiffResult;

#[derive(Default)]
struct Counters {
    pushes: AtomicU64,
    no_previous: AtomicU64,
    unchanged: AtomicU64,
    url_changed: AtomicU64,
    small_diff: AtomicU64,
    large_diff: AtomicU64,
    pruned: AtomicU64,
    persist_failures: AtomicU64,
}

/// Shared counters; clones observe the same values.
#[derive(Clone, Default)]
pub struct SnapMetrics {
    inner: Arc<Counters>,
}

/// Point-in-time copy of [`SnapMetrics`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pushes: u64,
    pub no_previous: u64,
    pub unchanged: u64,
    pub url_changed: u64,
    pub small_diff: u64,
    pub large_diff: u64,
    pub pruned: u64,
    pub persist_failures: u64,
}

impl SnapMetrics {
    pub fn record_push(&self, diff: &DiffResult) {
        let c = &self.inner;
        c.pushes.fetch_add(1, Ordering::Relaxed);
        let slot = match diff {
            DiffResult::NoPrevious => &c.no_previous,
            DiffResult::Unchanged => &c.unchanged,
            DiffResult::UrlChanged { .. } => &c.url_changed,
            DiffResult::SmallDiff { .. } => &c.small_diff,
            DiffResult::LargeDiff { .. } => &c.large_diff,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prune(&self, removed: usize) {
        self.inner
            .pruned
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.inner.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.inner;
        MetricsSnapshot {
            pushes: c.pushes.load(Ordering::Relaxed),
            no_previous: c.no_previous.load(Ordering::Relaxed),
            unchanged: c.unchanged.load(Ordering::Relaxed),
            url_changed: c.url_changed.load(Ordering::Relaxed),
            small_diff: c.small_diff.load(Ordering::Relaxed),
            large_diff: c.large_diff.load(Ordering::Relaxed),
            pruned: c.pruned.load(Ordering::Relaxed),
            persist_failures: c.persist_failures.load(Ordering::Relaxed),
        }
    }
}
