//! Error types for cache operations
//!
//! This module defines custom error types for the aicache library. Most of
//! these never reach a cache caller: connectivity and serialization problems
//! degrade to misses, and only validation and construction errors propagate.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed call arguments or configuration, raised before any I/O
    #[error("Validation error for `{field}`: {reason}")]
    Validation { field: String, reason: String },

    /// Connection error - remote store unreachable or handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation timeout against the remote store
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// Serialization/Deserialization error (corrupted or unrecognized payload)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Factory-level construction failure (strict mode only)
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// Redis driver error (wrapper)
    #[error("Redis driver error: {0}")]
    Driver(#[from] redis::RedisError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl CacheError {
    /// Shorthand for a validation error pinpointing the offending field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CacheError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}
