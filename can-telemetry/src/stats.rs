//! Pipeline counters and health reporting
//!
//! Each counter has a single writer (the listener owns `received`,
//! `malformed` and `processed`) but is read from other threads, so all of them
//! are atomics.

use crate::shutdown::CancellationToken;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-wide packet counters
#[derive(Debug)]
pub struct Stats {
    packets_received: AtomicU64,
    packets_processed: AtomicU64,
    packets_malformed: AtomicU64,
    start_time: Instant,
    start_timestamp: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            packets_processed: AtomicU64::new(0),
            packets_malformed: AtomicU64::new(0),
            start_time: Instant::now(),
            start_timestamp: crate::types::now_timestamp(),
        }
    }

    /// One datagram arrived, whatever its content
    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    /// One frame with a known ID was decoded
    pub fn record_processed(&self) {
        self.packets_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// One datagram failed to parse
    pub fn record_malformed(&self) {
        self.packets_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Consistent-enough copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_processed: self.packets_processed.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            start_time: self.start_timestamp,
        }
    }
}

/// Point-in-time copy of [`Stats`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub packets_processed: u64,
    pub packets_malformed: u64,
    /// Process start, seconds since the UNIX epoch
    pub start_time: f64,
}

/// Health query result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    /// Seconds since start
    pub uptime: f64,
    pub stats: StatsSnapshot,
    /// Distinct signal names in the latest-value cache
    pub signal_count: usize,
}

impl HealthReport {
    /// One-line summary used by the periodic status log
    pub fn summary(&self) -> String {
        format!(
            "Status: Uptime={:.1}s, Received={}, Processed={}, Malformed={}, Signals={}",
            self.uptime,
            self.stats.packets_received,
            self.stats.packets_processed,
            self.stats.packets_malformed,
            self.signal_count
        )
    }
}

/// Background worker that logs a health summary at a fixed interval
pub struct StatsReporter {
    hub: Arc<crate::hub::Hub>,
    interval: Duration,
    token: CancellationToken,
}

impl StatsReporter {
    pub fn new(hub: Arc<crate::hub::Hub>, interval: Duration, token: CancellationToken) -> Self {
        Self {
            hub,
            interval,
            token,
        }
    }

    /// Run until cancelled
    pub fn run(&self) {
        log::debug!("Stats reporter started (interval {:?})", self.interval);

        while self.token.sleep(self.interval) {
            log::info!("{}", self.hub.get_health().summary());
        }

        log::debug!("Stats reporter exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = Stats::new();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_received, 0);
        assert_eq!(snapshot.packets_processed, 0);
        assert_eq!(snapshot.packets_malformed, 0);
        assert!(snapshot.start_time > 0.0);
    }

    #[test]
    fn test_counters_increment_independently() {
        let stats = Stats::new();
        stats.record_received();
        stats.record_received();
        stats.record_malformed();
        stats.record_processed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_received, 2);
        assert_eq!(snapshot.packets_malformed, 1);
        assert_eq!(snapshot.packets_processed, 1);
    }

    #[test]
    fn test_concurrent_reads_see_monotonic_counts() {
        let stats = Arc::new(Stats::new());
        let writer = {
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    stats.record_received();
                }
            })
        };

        let mut last = 0;
        for _ in 0..100 {
            let now = stats.snapshot().packets_received;
            assert!(now >= last);
            last = now;
        }
        writer.join().unwrap();
        assert_eq!(stats.snapshot().packets_received, 10_000);
    }

    #[test]
    fn test_health_summary_format() {
        let report = HealthReport {
            status: "ok",
            uptime: 12.34,
            stats: StatsSnapshot {
                packets_received: 10,
                packets_processed: 7,
                packets_malformed: 2,
                start_time: 0.0,
            },
            signal_count: 5,
        };
        assert_eq!(
            report.summary(),
            "Status: Uptime=12.3s, Received=10, Processed=7, Malformed=2, Signals=5"
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["stats"]["packets_malformed"], 2);
        assert_eq!(json["signal_count"], 5);
    }
}
