//! Cache-related error types

use thiserror::Error;

/// Cache operation errors
///
/// Only `Configuration` is allowed to cross the public boundary of the cache
/// engine: it signals caller-side misuse. Every other variant is recovered
/// locally, since the cache is an optimization and not a dependency: a failed
/// read degrades to a miss and a failed write to a `false` return.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("deserialization error: {message}")]
    Deserialization { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    /// Shorthand for a store-level failure with a formatted cause.
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Shorthand for a caller-side configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Re-export commonly used Result type
pub type Result<T> = std::result::Result<T, CacheError>;
