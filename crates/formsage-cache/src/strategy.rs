//! Named TTL strategies and the adaptive resolution policy

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Caching strategies for different kinds of AI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Long-lived entries (field suggestions).
    Aggressive,
    /// Medium-lived entries (validations).
    Moderate,
    /// Short-lived entries (near-real-time data).
    Conservative,
    /// Base TTL adjusted by observed access frequency.
    Adaptive,
}

impl CacheStrategy {
    /// Strategy name as used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Aggressive => "aggressive",
            CacheStrategy::Moderate => "moderate",
            CacheStrategy::Conservative => "conservative",
            CacheStrategy::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" => Ok(CacheStrategy::Aggressive),
            "moderate" => Ok(CacheStrategy::Moderate),
            "conservative" => Ok(CacheStrategy::Conservative),
            "adaptive" => Ok(CacheStrategy::Adaptive),
            other => Err(CacheError::configuration(format!(
                "unknown cache strategy '{other}'"
            ))),
        }
    }
}

/// Base TTLs in seconds for each strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlTable {
    pub aggressive_secs: u64,
    pub moderate_secs: u64,
    pub conservative_secs: u64,
    pub adaptive_base_secs: u64,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            aggressive_secs: 3600,
            moderate_secs: 900,
            conservative_secs: 300,
            adaptive_base_secs: 600,
        }
    }
}

impl TtlTable {
    /// Base TTL for a strategy, before any adaptive adjustment.
    pub fn base_ttl(&self, strategy: CacheStrategy) -> Duration {
        let secs = match strategy {
            CacheStrategy::Aggressive => self.aggressive_secs,
            CacheStrategy::Moderate => self.moderate_secs,
            CacheStrategy::Conservative => self.conservative_secs,
            CacheStrategy::Adaptive => self.adaptive_base_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Maps a strategy plus an observed access count to a concrete TTL.
///
/// Non-adaptive strategies return their base TTL unconditionally. Adaptive
/// resolution keeps frequently-revisited answers longer (the upstream cost is
/// amortized further) and expires rarely-revisited ones quickly to bound
/// memory growth from one-off queries. Thresholds and multipliers are
/// deployment tuning knobs, not invariants.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    table: TtlTable,
    cold_threshold: u64,
    hot_threshold: u64,
    cold_factor: f64,
    hot_factor: f64,
}

impl TtlPolicy {
    pub fn new(
        table: TtlTable,
        cold_threshold: u64,
        hot_threshold: u64,
        cold_factor: f64,
        hot_factor: f64,
    ) -> Self {
        Self {
            table,
            cold_threshold,
            hot_threshold,
            cold_factor,
            hot_factor,
        }
    }

    /// Resolve the TTL for a write under `strategy` given the key's current
    /// access count. A caller-supplied TTL override bypasses this entirely;
    /// the engine never calls in for overridden writes.
    pub fn resolve(&self, strategy: CacheStrategy, access_count: u64) -> Duration {
        let base = self.table.base_ttl(strategy);
        if strategy != CacheStrategy::Adaptive {
            return base;
        }
        if access_count > self.hot_threshold {
            base.mul_f64(self.hot_factor)
        } else if access_count < self.cold_threshold {
            base.mul_f64(self.cold_factor)
        } else {
            base
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(TtlTable::default(), 2, 10, 0.5, 1.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "aggressive".parse::<CacheStrategy>().unwrap(),
            CacheStrategy::Aggressive
        );
        assert_eq!(
            "ADAPTIVE".parse::<CacheStrategy>().unwrap(),
            CacheStrategy::Adaptive
        );
        assert!(matches!(
            "eager".parse::<CacheStrategy>().unwrap_err(),
            CacheError::Configuration { .. }
        ));
    }

    #[test]
    fn test_strategy_serde_lowercase() {
        let json = serde_json::to_string(&CacheStrategy::Moderate).unwrap();
        assert_eq!(json, "\"moderate\"");
        let back: CacheStrategy = serde_json::from_str("\"conservative\"").unwrap();
        assert_eq!(back, CacheStrategy::Conservative);
    }

    #[test]
    fn test_base_ttl_ordering() {
        let table = TtlTable::default();
        let aggressive = table.base_ttl(CacheStrategy::Aggressive);
        let moderate = table.base_ttl(CacheStrategy::Moderate);
        let adaptive = table.base_ttl(CacheStrategy::Adaptive);
        let conservative = table.base_ttl(CacheStrategy::Conservative);
        assert!(aggressive > moderate);
        assert!(moderate > adaptive);
        assert!(adaptive > conservative);
    }

    #[test]
    fn test_fixed_strategies_ignore_access_count() {
        let policy = TtlPolicy::default();
        for strategy in [
            CacheStrategy::Aggressive,
            CacheStrategy::Moderate,
            CacheStrategy::Conservative,
        ] {
            let base = policy.resolve(strategy, 0);
            assert_eq!(policy.resolve(strategy, 100), base);
        }
    }

    #[test]
    fn test_adaptive_extension_and_shrinkage() {
        let policy = TtlPolicy::default();
        let hot = policy.resolve(CacheStrategy::Adaptive, 11);
        let steady = policy.resolve(CacheStrategy::Adaptive, 5);
        let cold = policy.resolve(CacheStrategy::Adaptive, 1);
        assert!(hot > steady);
        assert!(steady > cold);
        assert_eq!(hot, Duration::from_secs(900));
        assert_eq!(steady, Duration::from_secs(600));
        assert_eq!(cold, Duration::from_secs(300));
    }

    #[test]
    fn test_adaptive_thresholds_are_exclusive() {
        let policy = TtlPolicy::default();
        // count == hot_threshold is not hot, count == cold_threshold is not cold
        assert_eq!(
            policy.resolve(CacheStrategy::Adaptive, 10),
            Duration::from_secs(600)
        );
        assert_eq!(
            policy.resolve(CacheStrategy::Adaptive, 2),
            Duration::from_secs(600)
        );
    }
}
