//! Backing store contract and implementations

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::Result;

/// Capability contract the cache engine requires from a backing key-value
/// store.
///
/// Any conforming implementation is acceptable (in-process map, Redis, a
/// distributed store) as long as `set_with_ttl` enforces expiration at or
/// after the given TTL and never before it. The engine never touches entry
/// storage except through this trait.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the raw bytes for a key, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write bytes under a key with an expiration relative to now.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Delete keys, returning how many were actually removed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// List live keys under a prefix, up to `limit` per call.
    ///
    /// Finite and restartable: each call re-observes the current key set, so
    /// callers drive bulk operations in bounded rounds.
    async fn scan_keys(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<String>>;

    /// Remaining TTL for a key, `None` when the key is absent.
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>>;

    /// Rewrite a key's TTL. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Approximate memory footprint of the stored entries.
    async fn memory_usage_bytes(&self) -> Result<u64>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process store over a guarded map.
///
/// Expiry is enforced lazily on read and swept on write; an expired entry is
/// indistinguishable from an absent one through the trait. Serves as the
/// default test double and as the fallback half of a [`FallbackStore`].
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        // Expired: upgrade to a write lock and re-check before removing.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired()) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let mut removed = 0u64;
        for key in keys {
            if entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan_keys(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        if let Some(limit) = limit {
            keys.truncate(limit);
        }
        Ok(keys)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.expires_at - Instant::now()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn memory_usage_bytes(&self) -> Result<u64> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .map(|(key, entry)| (key.len() + entry.value.len()) as u64)
            .sum())
    }
}

/// Decorator composing a primary store with a fallback behind the same
/// contract.
///
/// Reads and writes go to the primary and degrade to the fallback only when
/// the primary errors; scan-based operations address whichever side answers.
/// This replaces ad hoc "remote store errored, use the local map" branching
/// inside the engine with plain composition: the engine sees one store.
pub struct FallbackStore {
    primary: Arc<dyn CacheStore>,
    fallback: Arc<dyn CacheStore>,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn CacheStore>, fallback: Arc<dyn CacheStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl CacheStore for FallbackStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.primary.get(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(error = %e, "primary store get failed, using fallback");
                self.fallback.get(key).await
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        match self.primary.set_with_ttl(key, value, ttl).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "primary store set failed, writing to fallback");
                self.fallback.set_with_ttl(key, value, ttl).await
            }
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        // Delete from both sides so a fallback copy can't resurrect a key.
        let fallback_removed = self.fallback.delete(keys).await.unwrap_or(0);
        match self.primary.delete(keys).await {
            Ok(removed) => Ok(removed.max(fallback_removed)),
            Err(e) => {
                warn!(error = %e, "primary store delete failed");
                Ok(fallback_removed)
            }
        }
    }

    async fn scan_keys(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<String>> {
        match self.primary.scan_keys(prefix, limit).await {
            Ok(keys) if !keys.is_empty() => Ok(keys),
            Ok(_) => self.fallback.scan_keys(prefix, limit).await,
            Err(e) => {
                warn!(error = %e, "primary store scan failed, using fallback");
                self.fallback.scan_keys(prefix, limit).await
            }
        }
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        match self.primary.ttl_remaining(key).await {
            Ok(ttl) => Ok(ttl),
            Err(e) => {
                warn!(error = %e, "primary store ttl probe failed, using fallback");
                self.fallback.ttl_remaining(key).await
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        match self.primary.expire(key, ttl).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                warn!(error = %e, "primary store expire failed, using fallback");
                self.fallback.expire(key, ttl).await
            }
        }
    }

    async fn memory_usage_bytes(&self) -> Result<u64> {
        match self.primary.memory_usage_bytes().await {
            Ok(bytes) => Ok(bytes),
            Err(_) => self.fallback.memory_usage_bytes().await,
        }
    }
}
