//! Process-wide chat counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Atomic request counters shared by the pipeline and the HTTP surface.
#[derive(Debug)]
pub struct ChatMetrics {
    started: Instant,
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    gateway_calls: AtomicU64,
    searches: AtomicU64,
}

impl Default for ChatMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            gateway_calls: AtomicU64::new(0),
            searches: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gateway_call(&self) {
        self.gateway_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view. `cache_size` comes from the query cache.
    pub fn snapshot(&self, cache_size: usize) -> MetricsSnapshot {
        let uptime = self.started.elapsed().as_secs_f64();
        let total = self.requests.load(Ordering::Relaxed);
        let successful = self.successes.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime_seconds: round2(uptime),
            requests_per_second: if uptime > 0.0 {
                round2(total as f64 / uptime)
            } else {
                0.0
            },
            success_rate: if total > 0 {
                round2(successful as f64 / total as f64 * 100.0)
            } else {
                0.0
            },
            total_requests: total,
            successful_requests: successful,
            failed_requests: self.failures.load(Ordering::Relaxed),
            gateway_calls: self.gateway_calls.load(Ordering::Relaxed),
            search_queries: self.searches.load(Ordering::Relaxed),
            cache_size,
        }
    }
}

/// Serializable metrics report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: f64,
    pub requests_per_second: f64,
    /// Percentage of requests answered by the generator.
    pub success_rate: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub gateway_calls: u64,
    pub search_queries: u64,
    pub cache_size: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_empty() {
        let snap = ChatMetrics::new().snapshot(0);
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.success_rate, 0.0);
        assert_eq!(snap.cache_size, 0);
    }

    #[test]
    fn test_snapshot_counts() {
        let m = ChatMetrics::new();
        for _ in 0..4 {
            m.record_request();
        }
        m.record_success();
        m.record_success();
        m.record_success();
        m.record_failure();
        m.record_gateway_call();
        m.record_search();

        let snap = m.snapshot(7);
        assert_eq!(snap.total_requests, 4);
        assert_eq!(snap.successful_requests, 3);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.success_rate, 75.0);
        assert_eq!(snap.gateway_calls, 1);
        assert_eq!(snap.search_queries, 1);
        assert_eq!(snap.cache_size, 7);
    }

    #[test]
    fn test_counters_across_threads() {
        let m = std::sync::Arc::new(ChatMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = m.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        m.record_request();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.snapshot(0).total_requests, 1000);
    }
}
