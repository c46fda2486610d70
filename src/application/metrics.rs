//! Observability metrics for the store.
//!
//! Provides counters for admission decisions, sweeps and persistence for
//! monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking store and limiter statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Total number of requests admitted
    requests_admitted: AtomicU64,
    /// Total number of requests denied
    requests_denied: AtomicU64,
    /// Total number of counters removed by the sweeper
    counters_swept: AtomicU64,
    /// Total number of reads answered through the snapshot fallback
    fallback_reads: AtomicU64,
    /// Total number of snapshot writes that failed or timed out
    flush_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                requests_admitted: AtomicU64::new(0),
                requests_denied: AtomicU64::new(0),
                counters_swept: AtomicU64::new(0),
                fallback_reads: AtomicU64::new(0),
                flush_failures: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.requests_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.inner.requests_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_swept(&self, count: u64) {
        self.inner.counters_swept.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_read(&self) {
        self.inner.fallback_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_failure(&self) {
        self.inner.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of requests admitted.
    pub fn requests_admitted(&self) -> u64 {
        self.inner.requests_admitted.load(Ordering::Relaxed)
    }

    /// Get the total number of requests denied.
    pub fn requests_denied(&self) -> u64 {
        self.inner.requests_denied.load(Ordering::Relaxed)
    }

    /// Get the total number of counters swept.
    pub fn counters_swept(&self) -> u64 {
        self.inner.counters_swept.load(Ordering::Relaxed)
    }

    /// Get the total number of fallback reads.
    pub fn fallback_reads(&self) -> u64 {
        self.inner.fallback_reads.load(Ordering::Relaxed)
    }

    /// Get the total number of failed flushes.
    pub fn flush_failures(&self) -> u64 {
        self.inner.flush_failures.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_admitted: self.requests_admitted(),
            requests_denied: self.requests_denied(),
            counters_swept: self.counters_swept(),
            fallback_reads: self.fallback_reads(),
            flush_failures: self.flush_failures(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.requests_admitted.store(0, Ordering::Relaxed);
        self.inner.requests_denied.store(0, Ordering::Relaxed);
        self.inner.counters_swept.store(0, Ordering::Relaxed);
        self.inner.fallback_reads.store(0, Ordering::Relaxed);
        self.inner.flush_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total number of requests admitted
    pub requests_admitted: u64,
    /// Total number of requests denied
    pub requests_denied: u64,
    /// Total number of counters removed by the sweeper
    pub counters_swept: u64,
    /// Total number of reads answered through the snapshot fallback
    pub fallback_reads: u64,
    /// Total number of snapshot writes that failed or timed out
    pub flush_failures: u64,
}

impl MetricsSnapshot {
    /// Calculate the denial rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been checked.
    pub fn denial_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.requests_denied as f64 / total as f64
        }
    }

    /// Get the total number of requests checked (admitted + denied).
    pub fn total_requests(&self) -> u64 {
        self.requests_admitted.saturating_add(self.requests_denied)
    }
}
