//! Per-tree delivery counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a tree that delivers entries out of band
#[derive(Debug, Default)]
pub struct TreeMetrics {
    /// Entries accepted but not yet delivered
    pending: AtomicU64,
    /// Entries handed to the inner tree or transport
    delivered: AtomicU64,
    /// Deliveries that panicked or failed
    failed: AtomicU64,
    /// Entries discarded (queue closed, buffer cap)
    dropped: AtomicU64,
}

impl TreeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn inc_pending(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_pending(&self) {
        // saturating: a dropped job may be counted without having been queued
        let _ = self
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_delivered(&self, n: u64) {
        self.delivered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn add_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pending: self.pending(),
            delivered: self.delivered(),
            failed: self.failed(),
            dropped: self.dropped(),
        }
    }
}

/// Snapshot of tree counters (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub pending: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}
