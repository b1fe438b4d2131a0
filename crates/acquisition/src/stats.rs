//! Acquisition metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Live scan counters
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    /// Read requests entered
    pub requests_issued: AtomicU64,

    /// Read requests completed
    pub requests_completed: AtomicU64,

    /// Native lines entered into requests
    pub lines_requested: AtomicU64,

    /// Native lines delivered by the transport
    pub lines_received: AtomicU64,

    /// Output rows written
    pub lines_emitted: AtomicU64,

    /// Reads that delivered fewer lines than requested
    pub short_reads: AtomicU64,
}

impl AcquisitionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_issued(&self, lines: u32) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
        self.lines_requested.fetch_add(u64::from(lines), Ordering::Relaxed);
    }

    pub fn record_completed(&self, lines: usize, short: bool) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
        self.lines_received.fetch_add(lines as u64, Ordering::Relaxed);
        if short {
            self.short_reads.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_emitted(&self, rows: usize) {
        self.lines_emitted.fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            lines_requested: self.lines_requested.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            lines_emitted: self.lines_emitted.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_issued: u64,
    pub requests_completed: u64,
    pub lines_requested: u64,
    pub lines_received: u64,
    pub lines_emitted: u64,
    pub short_reads: u64,
}
