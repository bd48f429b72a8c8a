//! Adaptive caching for AI-generated form assistance.
//!
//! FormSage answers field suggestion and validation requests with LLM calls
//! that are slow and billed per token, while the answers themselves are
//! highly repetitive. This crate caches those responses behind a pluggable
//! backing store and tunes entry lifetimes to observed access patterns.
//!
//! - [`ResponseCache`] is the façade: get, set, invalidate, warm, optimize
//! - [`CacheStore`] is the backing-store contract; [`MemoryStore`] is the
//!   in-process implementation and [`FallbackStore`] composes two stores
//! - [`CacheStrategy`] and [`TtlPolicy`] decide how long entries live
//! - [`CacheMetrics`] aggregates hit/miss/eviction counters
//!
//! The cache is always an optimization: store failures degrade to misses and
//! never surface to callers as request failures.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use formsage_cache::{MemoryStore, ResponseCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> formsage_cache::Result<()> {
//! let cache = ResponseCache::new(Arc::new(MemoryStore::new()));
//! cache.set("suggestion", "database", &"PostgreSQL", None, None, None).await?;
//! let hit: Option<String> = cache.get("suggestion", "database", None).await?;
//! assert_eq!(hit.as_deref(), Some("PostgreSQL"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod key;
pub mod metrics;
pub mod storage;
pub mod strategy;
pub mod tracker;

pub use cache::{
    CacheConfig, Context, OptimizeReport, ResponseCache, ResponseCacheBuilder, WarmEntry,
};
pub use error::CacheError;
pub use key::KeyBuilder;
pub use metrics::{CacheMetrics, CacheStats};
pub use storage::{CacheStore, FallbackStore, MemoryStore};
pub use strategy::{CacheStrategy, TtlPolicy, TtlTable};
pub use tracker::AccessTracker;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
