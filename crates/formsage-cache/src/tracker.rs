//! Per-key access counting

use dashmap::DashMap;

/// Concurrent per-key access counters.
///
/// Increment-on-access is the hot path of every cache hit, so the counters
/// live in a sharded map: unrelated keys never serialize against each other.
/// Counts are monotonically non-decreasing until explicitly forgotten, which
/// happens when a key is invalidated, evicted by the optimizer, or cleared in
/// bulk. The state is best-effort; losing it on restart only resets TTL
/// tuning, never answer correctness.
#[derive(Debug, Default)]
pub struct AccessTracker {
    counts: DashMap<String, u64>,
}

impl AccessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one access to a key, creating the counter on first sight.
    pub fn record(&self, key: &str) {
        *self.counts.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Current count for a key, zero when unknown.
    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).map(|c| *c).unwrap_or(0)
    }

    /// Drop a key's counter.
    pub fn forget(&self, key: &str) {
        self.counts.remove(key);
    }

    /// Point-in-time copy of every tracked (key, count) pair.
    ///
    /// Used by the optimizer; the copy keeps the maintenance pass from
    /// holding shard locks across store round trips.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Drop all counters.
    pub fn clear(&self) {
        self.counts.clear();
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
