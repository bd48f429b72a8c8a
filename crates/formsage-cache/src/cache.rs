//! The response-cache façade

use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashSet;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::{CacheError, Result},
    key::KeyBuilder,
    metrics::{CacheMetrics, CacheStats},
    storage::CacheStore,
    strategy::{CacheStrategy, TtlPolicy, TtlTable},
    tracker::AccessTracker,
};

/// Scalar facts qualifying a request (form type, locale, project kind, ...).
pub type Context = HashMap<String, serde_json::Value>;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace prefix for every key written by this cache.
    pub namespace: String,
    /// Strategy applied when `set` is called without one.
    pub default_strategy: CacheStrategy,
    /// Per-strategy base TTLs.
    pub ttls: TtlTable,
    /// Access counts strictly below this are cold.
    pub cold_threshold: u64,
    /// Access counts strictly above this are hot.
    pub hot_threshold: u64,
    /// Adaptive TTL multiplier for cold keys.
    pub adaptive_cold_factor: f64,
    /// Adaptive TTL multiplier for hot keys.
    pub adaptive_hot_factor: f64,
    /// Hot keys whose remaining TTL dips below this get extended...
    pub hot_ttl_floor_secs: u64,
    /// ...to this.
    pub hot_ttl_ceiling_secs: u64,
    /// Keys fetched per scan round trip during bulk operations.
    pub scan_batch_size: usize,
    /// Deadline applied to each backing-store round trip, unlimited if unset.
    pub op_timeout_ms: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "ai_cache".to_string(),
            default_strategy: CacheStrategy::Moderate,
            ttls: TtlTable::default(),
            cold_threshold: 2,
            hot_threshold: 10,
            adaptive_cold_factor: 0.5,
            adaptive_hot_factor: 1.5,
            hot_ttl_floor_secs: 1800,
            hot_ttl_ceiling_secs: 3600,
            scan_batch_size: 512,
            op_timeout_ms: None,
        }
    }
}

impl CacheConfig {
    fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }
}

/// Report produced by [`ResponseCache::optimize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizeReport {
    /// Keys the access tracker knew about when the pass started.
    pub keys_analyzed: usize,
    /// Cold keys actually removed from the store.
    pub keys_evicted: u64,
    /// Human-readable description of each action taken.
    pub optimizations: Vec<String>,
}

/// One entry of a warm-load batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmEntry {
    pub category: String,
    pub identifier: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub context: Option<Context>,
}

/// Adaptive cache for AI responses.
///
/// Composes the key builder, TTL policy, access tracker, and metrics over an
/// injected [`CacheStore`]. The cache is an optimization, never a dependency:
/// no operation here fails a caller's request because of store trouble, and
/// losing the entire store is indistinguishable from a cold cache.
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    keys: KeyBuilder,
    policy: TtlPolicy,
    tracker: AccessTracker,
    metrics: CacheMetrics,
    warm_keys: DashSet<String>,
    config: CacheConfig,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Create a cache over a backing store with default configuration.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Create a cache over a backing store with explicit configuration.
    pub fn with_config(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        let keys = KeyBuilder::new(config.namespace.clone());
        let policy = TtlPolicy::new(
            config.ttls.clone(),
            config.cold_threshold,
            config.hot_threshold,
            config.adaptive_cold_factor,
            config.adaptive_hot_factor,
        );
        Self {
            store,
            keys,
            policy,
            tracker: AccessTracker::new(),
            metrics: CacheMetrics::new(),
            warm_keys: DashSet::new(),
            config,
        }
    }

    pub fn builder() -> ResponseCacheBuilder {
        ResponseCacheBuilder::new()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached value.
    ///
    /// Store failures, deadline overruns, and corrupt entries all degrade to
    /// a miss; only [`CacheError::Configuration`] (bad key inputs) surfaces.
    pub async fn get<T: DeserializeOwned>(
        &self,
        category: &str,
        identifier: &str,
        context: Option<&Context>,
    ) -> Result<Option<T>> {
        let key = self.keys.build(category, identifier, context)?;
        let started = Instant::now();

        let bytes = match self.with_deadline(self.store.get(&key)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(category, identifier, error = %e, "cache get failed, treating as miss");
                self.metrics.record_miss();
                return Ok(None);
            }
        };

        let Some(bytes) = bytes else {
            self.metrics.record_miss();
            debug!(category, identifier, "cache miss");
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                self.tracker.record(&key);
                let elapsed = started.elapsed();
                self.metrics.record_hit(elapsed);
                debug!(
                    category,
                    identifier,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "cache hit"
                );
                Ok(Some(value))
            }
            Err(e) => {
                // Corrupt entry: drop it rather than surface it.
                warn!(category, identifier, error = %e, "corrupt cache entry, dropping");
                let _ = self
                    .with_deadline(self.store.delete(std::slice::from_ref(&key)))
                    .await;
                self.metrics.record_miss();
                Ok(None)
            }
        }
    }

    /// Write a value through to the store.
    ///
    /// The TTL comes from the policy (consulting the key's current access
    /// count) unless `ttl_override` is given, which is used verbatim. Returns
    /// `Ok(false)` on store or serialization failure.
    pub async fn set<T: Serialize + Sync>(
        &self,
        category: &str,
        identifier: &str,
        value: &T,
        context: Option<&Context>,
        strategy: Option<CacheStrategy>,
        ttl_override: Option<Duration>,
    ) -> Result<bool> {
        let key = self.keys.build(category, identifier, context)?;
        let strategy = strategy.unwrap_or(self.config.default_strategy);
        let ttl = match ttl_override {
            Some(ttl) => ttl,
            None => self.policy.resolve(strategy, self.tracker.count(&key)),
        };

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(category, identifier, error = %e, "failed to serialize value for cache");
                return Ok(false);
            }
        };

        match self
            .with_deadline(self.store.set_with_ttl(&key, &bytes, ttl))
            .await
        {
            Ok(()) => {
                self.tracker.record(&key);
                if strategy == CacheStrategy::Aggressive {
                    self.warm_keys.insert(key);
                }
                debug!(
                    category,
                    identifier,
                    ttl_secs = ttl.as_secs(),
                    strategy = %strategy,
                    "cache set"
                );
                Ok(true)
            }
            Err(e) => {
                warn!(category, identifier, error = %e, "cache set failed");
                Ok(false)
            }
        }
    }

    /// Remove one key (identifier given) or every key of a category.
    ///
    /// Returns how many keys were removed; store failures log and report the
    /// keys removed before the failure.
    pub async fn invalidate(
        &self,
        category: &str,
        identifier: Option<&str>,
        context: Option<&Context>,
    ) -> Result<u64> {
        let removed = match identifier {
            Some(identifier) => {
                let key = self.keys.build(category, identifier, context)?;
                match self
                    .with_deadline(self.store.delete(std::slice::from_ref(&key)))
                    .await
                {
                    Ok(removed) => {
                        self.tracker.forget(&key);
                        self.warm_keys.remove(&key);
                        removed
                    }
                    Err(e) => {
                        warn!(category, identifier, error = %e, "cache invalidation failed");
                        0
                    }
                }
            }
            None => match self
                .delete_by_prefix(&self.keys.category_prefix(category))
                .await
            {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(category, error = %e, "category invalidation failed");
                    0
                }
            },
        };

        if removed > 0 {
            self.metrics.record_evictions(removed);
            info!(category, removed, "cache invalidated");
        }
        Ok(removed)
    }

    /// Pre-populate the cache with known-common entries.
    ///
    /// Best-effort bulk load, not a transaction: a failing entry never aborts
    /// the batch. Returns how many entries were cached.
    pub async fn warm_cache(&self, entries: &[WarmEntry], strategy: Option<CacheStrategy>) -> u64 {
        let strategy = strategy.unwrap_or(CacheStrategy::Aggressive);
        let mut succeeded = 0u64;
        for entry in entries {
            match self
                .set(
                    &entry.category,
                    &entry.identifier,
                    &entry.value,
                    entry.context.as_ref(),
                    Some(strategy),
                    None,
                )
                .await
            {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        category = %entry.category,
                        identifier = %entry.identifier,
                        error = %e,
                        "cache warm entry rejected"
                    );
                }
            }
        }
        info!(total = entries.len(), succeeded, "cache warmed");
        succeeded
    }

    /// Maintenance pass correcting write-time TTL decisions with the access
    /// counts accumulated since.
    ///
    /// Cold keys are evicted and forgotten; hot keys whose remaining TTL has
    /// dipped below the retention floor are extended to the ceiling.
    pub async fn optimize(&self) -> OptimizeReport {
        let counts = self.tracker.snapshot();
        let mut report = OptimizeReport {
            keys_analyzed: counts.len(),
            ..Default::default()
        };

        let cold: Vec<String> = counts
            .iter()
            .filter(|(_, count)| *count < self.config.cold_threshold)
            .map(|(key, _)| key.clone())
            .collect();
        if !cold.is_empty() {
            match self.with_deadline(self.store.delete(&cold)).await {
                Ok(evicted) => {
                    for key in &cold {
                        self.tracker.forget(key);
                        self.warm_keys.remove(key);
                    }
                    self.metrics.record_evictions(evicted);
                    report.keys_evicted = evicted;
                    report
                        .optimizations
                        .push(format!("evicted {evicted} rarely accessed keys"));
                }
                Err(e) => warn!(error = %e, "cold eviction failed"),
            }
        }

        let floor = Duration::from_secs(self.config.hot_ttl_floor_secs);
        let ceiling = Duration::from_secs(self.config.hot_ttl_ceiling_secs);
        for (key, _) in counts
            .iter()
            .filter(|(_, count)| *count > self.config.hot_threshold)
        {
            match self.with_deadline(self.store.ttl_remaining(key)).await {
                Ok(Some(remaining)) if remaining < floor => {
                    match self.with_deadline(self.store.expire(key, ceiling)).await {
                        Ok(true) => report
                            .optimizations
                            .push(format!("extended TTL for frequently accessed key {key}")),
                        Ok(false) => {}
                        Err(e) => warn!(key = %key, error = %e, "TTL extension failed"),
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "TTL probe failed"),
            }
        }

        info!(
            keys_analyzed = report.keys_analyzed,
            keys_evicted = report.keys_evicted,
            "cache optimized"
        );
        report
    }

    /// Current metrics snapshot, refreshing the store footprint first.
    pub async fn metrics(&self) -> CacheStats {
        match self.with_deadline(self.store.memory_usage_bytes()).await {
            Ok(bytes) => self.metrics.set_store_size(bytes),
            Err(e) => warn!(error = %e, "failed to read store footprint"),
        }
        self.metrics.snapshot()
    }

    /// Zero all metrics and stamp the reset time.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
        info!("cache metrics reset");
    }

    /// Number of keys written under the aggressive strategy since startup.
    pub fn warm_key_count(&self) -> usize {
        self.warm_keys.len()
    }

    /// Remove every key under the cache's namespace and reset all tracking.
    ///
    /// Idempotent; returns `false` only when the store failed mid-sweep.
    pub async fn clear_all(&self) -> bool {
        match self.delete_by_prefix(&self.keys.namespace_prefix()).await {
            Ok(removed) => {
                self.tracker.clear();
                self.warm_keys.clear();
                info!(removed, "cache namespace cleared");
                true
            }
            Err(e) => {
                warn!(error = %e, "cache clear failed");
                false
            }
        }
    }

    /// Read-through helper: return the cached value or run `compute`, caching
    /// its result best-effort.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        category: &str,
        identifier: &str,
        context: Option<&Context>,
        strategy: Option<CacheStrategy>,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get(category, identifier, context).await? {
            return Ok(value);
        }
        let value = compute().await;
        // A failed write only costs a recomputation next time.
        let _ = self
            .set(category, identifier, &value, context, strategy, None)
            .await;
        Ok(value)
    }

    /// Delete every key under `prefix` in bounded scan rounds, so one sweep
    /// never holds the store for an unbounded namespace.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let mut removed = 0u64;
        loop {
            let keys = self
                .with_deadline(
                    self.store
                        .scan_keys(prefix, Some(self.config.scan_batch_size)),
                )
                .await?;
            if keys.is_empty() {
                break;
            }
            removed += self.with_deadline(self.store.delete(&keys)).await?;
            for key in &keys {
                self.tracker.forget(key);
                self.warm_keys.remove(key);
            }
            if keys.len() < self.config.scan_batch_size {
                break;
            }
        }
        Ok(removed)
    }

    /// Apply the configured per-round-trip deadline to a store call.
    async fn with_deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.op_timeout() {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(CacheError::store(format!(
                    "store call exceeded {}ms deadline",
                    limit.as_millis()
                ))),
            },
            None => fut.await,
        }
    }
}

/// Builder for explicit dependency injection of the backing store and
/// configuration.
pub struct ResponseCacheBuilder {
    store: Option<Arc<dyn CacheStore>>,
    config: CacheConfig,
}

impl ResponseCacheBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            config: CacheConfig::default(),
        }
    }

    /// Set the backing store (required).
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ResponseCache> {
        let store = self
            .store
            .ok_or_else(|| CacheError::configuration("a backing store is required"))?;
        Ok(ResponseCache::with_config(store, self.config))
    }
}

impl Default for ResponseCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
