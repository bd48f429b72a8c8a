//! Cache performance metrics

use std::{
    sync::atomic::{AtomicI64, AtomicU64, Ordering},
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time cache statistics snapshot.
///
/// Never persisted; this is observability data, not a source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of cache hits.
    pub hits: u64,
    /// Total number of cache misses.
    pub misses: u64,
    /// Keys removed by invalidation or optimizer eviction.
    pub evictions: u64,
    /// Cumulative moving average of hit response time in milliseconds.
    pub avg_response_time_ms: f64,
    /// Backing store's reported memory footprint.
    pub store_size_bytes: u64,
    /// When the metrics were last reset (process start if never).
    pub last_reset: DateTime<Utc>,
}

impl CacheStats {
    /// Hit rate as a fraction of all lookups, 0.0 when none happened yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe metrics aggregator.
///
/// All counters use relaxed atomics: metrics reads race with updates, so a
/// snapshot is only ever approximately consistent.
#[derive(Debug)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    response_time_micros: AtomicU64,
    timed_hits: AtomicU64,
    store_size_bytes: AtomicU64,
    last_reset_ms: AtomicI64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            response_time_micros: AtomicU64::new(0),
            timed_hits: AtomicU64::new(0),
            store_size_bytes: AtomicU64::new(0),
            last_reset_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Record a cache hit and fold its response time into the average.
    pub fn record_hit(&self, elapsed: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.response_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.timed_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record keys removed by invalidation or eviction.
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Refresh the backing store's reported footprint.
    pub fn set_store_size(&self, bytes: u64) {
        self.store_size_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Current statistics snapshot.
    pub fn snapshot(&self) -> CacheStats {
        let timed_hits = self.timed_hits.load(Ordering::Relaxed);
        let avg_response_time_ms = if timed_hits > 0 {
            let total_micros = self.response_time_micros.load(Ordering::Relaxed);
            total_micros as f64 / timed_hits as f64 / 1000.0
        } else {
            0.0
        };

        let last_reset_ms = self.last_reset_ms.load(Ordering::Relaxed);
        let last_reset = Utc
            .timestamp_millis_opt(last_reset_ms)
            .single()
            .unwrap_or_else(Utc::now);

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            avg_response_time_ms,
            store_size_bytes: self.store_size_bytes.load(Ordering::Relaxed),
            last_reset,
        }
    }

    /// Zero all counters and stamp the reset time.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.response_time_micros.store(0, Ordering::Relaxed);
        self.timed_hits.store(0, Ordering::Relaxed);
        self.store_size_bytes.store(0, Ordering::Relaxed);
        self.last_reset_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_hit_and_miss() {
        let metrics = CacheMetrics::new();
        metrics.record_hit(Duration::from_millis(4));
        metrics.record_hit(Duration::from_millis(2));
        metrics.record_miss();

        let stats = metrics.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.avg_response_time_ms - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_hit_rate() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.snapshot().hit_rate(), 0.0);

        metrics.record_hit(Duration::from_millis(1));
        metrics.record_hit(Duration::from_millis(1));
        metrics.record_hit(Duration::from_millis(1));
        metrics.record_miss();
        assert!((metrics.snapshot().hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_evictions_accumulate() {
        let metrics = CacheMetrics::new();
        metrics.record_evictions(3);
        metrics.record_evictions(2);
        assert_eq!(metrics.snapshot().evictions, 5);
    }

    #[test]
    fn test_store_size_is_latest_value() {
        let metrics = CacheMetrics::new();
        metrics.set_store_size(100);
        metrics.set_store_size(42);
        assert_eq!(metrics.snapshot().store_size_bytes, 42);
    }

    #[test]
    fn test_reset_zeroes_and_stamps() {
        let metrics = CacheMetrics::new();
        metrics.record_hit(Duration::from_millis(1));
        metrics.record_miss();
        metrics.record_evictions(1);
        let before = metrics.snapshot().last_reset;

        metrics.reset();
        let stats = metrics.snapshot();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.avg_response_time_ms, 0.0);
        assert!(stats.last_reset >= before);
    }
}
