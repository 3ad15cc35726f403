use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Runtime counters of a single collector.
///
/// Purpose:
/// - Make dropped ticks, failed fetches and failed writes observable
/// - Give the unbounded retry loop a visible failure count
///
/// Design:
/// - Lock-free (Atomics)
/// - Shared between the polling loop, write tasks and the handle
#[derive(Default, Debug)]
pub struct CollectorMetrics {
    // Scheduling
    pub ticks: AtomicUsize,
    pub ticks_dropped: AtomicUsize,

    // Fetching
    pub fetches: AtomicUsize,
    pub fetch_errors: AtomicUsize,
    pub retries: AtomicUsize,
    pub rows_fetched: AtomicUsize,

    // Writing
    pub flushes: AtomicUsize,
    pub rows_written: AtomicUsize,
    pub write_errors: AtomicUsize,
    pub rows_dropped: AtomicUsize,
}

/// Point-in-time copy of [`CollectorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: usize,
    pub ticks_dropped: usize,
    pub fetches: usize,
    pub fetch_errors: usize,
    pub retries: usize,
    pub rows_fetched: usize,
    pub flushes: usize,
    pub rows_written: usize,
    pub write_errors: usize,
    pub rows_dropped: usize,
}

impl CollectorMetrics {
    pub(crate) fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rows_fetched: self.rows_fetched.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} dropped_ticks={} fetch={} fetch_err={} retry={} rows_in={} flush={} rows_out={} write_err={} rows_dropped={}",
            self.ticks,
            self.ticks_dropped,
            self.fetches,
            self.fetch_errors,
            self.retries,
            self.rows_fetched,
            self.flushes,
            self.rows_written,
            self.write_errors,
            self.rows_dropped,
        )
    }
}
