//! Error types for cache operations
//!
//! This module defines custom error types for the remedy-cache library.
//! Note that absence of an entry and corrupt entries are not errors at the
//! API surface: both are handled internally as cache misses. Errors here are
//! reserved for failures the caller must see - storage I/O on the mutating
//! path, invalid configuration, and compute callback failures.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Underlying filesystem read/write/delete failed (disk full, permissions)
    #[error("Storage I/O error: {0}")]
    StorageIo(#[from] std::io::Error),

    /// Entry or sidecar could not be encoded for persistence
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied compute function failed; propagated unchanged
    #[error(transparent)]
    Compute(#[from] anyhow::Error),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<bincode::Error> for CacheError {
    fn from(e: bincode::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}
