//! Execution metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every execution of one executor
///
/// Uses Relaxed ordering; counters are independent of each other.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    rejected: AtomicU64,
    rows_received: AtomicU64,
    duplicate_signals: AtomicU64,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows(&self, rows: u64) {
        self.rows_received.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_duplicate_signals(&self) {
        self.duplicate_signals.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            rows_received: self.rows_received.load(Ordering::Relaxed),
            duplicate_signals: self.duplicate_signals.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"cancelled":{},"completed":{},"duplicate_signals":{},"failed":{},"rejected":{},"rows_received":{},"submitted":{}}}"#,
            s.cancelled, s.completed, s.duplicate_signals, s.failed, s.rejected, s.rows_received, s.submitted,
        )
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub rejected: u64,
    pub rows_received: u64,
    pub duplicate_signals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        assert_eq!(ExecutionMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_to_json() {
        let metrics = ExecutionMetrics::new();
        metrics.add_rows(42);
        metrics.increment_completed();

        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["rows_received"], 42);
        assert_eq!(parsed["completed"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(ExecutionMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.add_rows(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().rows_received, 800);
    }
}
