//! Replication counters
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one replication group.
///
/// Uses Relaxed ordering; counters are read for reporting only.
#[derive(Debug, Default)]
pub struct ReplicationMetrics {
    connect_attempts: AtomicU64,
    filter_installs: AtomicU64,
    filter_install_failures: AtomicU64,
    retry_attempts: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_cancelled: AtomicU64,
}

impl ReplicationMetrics {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `connect()` calls
    pub fn increment_connect_attempts(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment successful filter installations (including no-op installs)
    pub fn increment_filter_installs(&self) {
        self.filter_installs.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed filter installations
    pub fn increment_filter_install_failures(&self) {
        self.filter_install_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment retry loop ticks
    pub fn increment_retry_attempts(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Add opened sync sessions
    pub fn add_sessions_opened(&self, count: u64) {
        self.sessions_opened.fetch_add(count, Ordering::Relaxed);
    }

    /// Add cancelled sync sessions
    pub fn add_sessions_cancelled(&self, count: u64) {
        self.sessions_cancelled.fetch_add(count, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            filter_installs: self.filter_installs.load(Ordering::Relaxed),
            filter_install_failures: self.filter_install_failures.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_cancelled: self.sessions_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`ReplicationMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub filter_installs: u64,
    pub filter_install_failures: u64,
    pub retry_attempts: u64,
    pub sessions_opened: u64,
    pub sessions_cancelled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = ReplicationMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = ReplicationMetrics::new();
        metrics.increment_connect_attempts();
        metrics.increment_connect_attempts();
        metrics.increment_filter_install_failures();
        metrics.add_sessions_opened(3);
        metrics.add_sessions_cancelled(2);

        let snap = metrics.snapshot();
        assert_eq!(snap.connect_attempts, 2);
        assert_eq!(snap.filter_install_failures, 1);
        assert_eq!(snap.sessions_opened, 3);
        assert_eq!(snap.sessions_cancelled, 2);
        assert_eq!(snap.retry_attempts, 0);
    }
}
