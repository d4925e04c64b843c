//! Configuration for the cache system

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the artifact cache
///
/// Defaults:
/// - Cache root: `cache` relative to the working directory
/// - Sweep age: 7 days (search results and classification verdicts go stale
///   slowly; vector indexes are invalidated by content fingerprints instead)
/// - Batch size: 15 items per classification call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding one subdirectory per namespace
    pub root: PathBuf,

    /// Default maximum entry age for janitor sweeps, in days
    pub max_age_days: u64,

    /// Advisory batch size for callers grouping classification items.
    /// Not enforced by the cache; stable batching maximizes hit rates
    /// because batch keys cover the exact item set submitted.
    pub default_batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cache"),
            max_age_days: 7,
            default_batch_size: 15,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Reads `CACHE_DIR`, `CACHE_EXPIRY_DAYS` and `CACHE_BATCH_SIZE` after
    /// loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let root = match std::env::var("CACHE_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => defaults.root,
        };

        let max_age_days = match std::env::var("CACHE_EXPIRY_DAYS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|e| {
                CacheError::Config(format!("invalid CACHE_EXPIRY_DAYS={:?}: {}", raw, e))
            })?,
            Err(_) => defaults.max_age_days,
        };

        let default_batch_size = match std::env::var("CACHE_BATCH_SIZE") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|e| {
                CacheError::Config(format!("invalid CACHE_BATCH_SIZE={:?}: {}", raw, e))
            })?,
            Err(_) => defaults.default_batch_size,
        };

        let config = Self {
            root,
            max_age_days,
            default_batch_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(CacheError::Config("root must not be empty".to_string()));
        }

        if self.max_age_days == 0 {
            return Err(CacheError::Config(
                "max_age_days must be greater than 0".to_string(),
            ));
        }

        if self.default_batch_size == 0 {
            return Err(CacheError::Config(
                "default_batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    root: Option<PathBuf>,
    max_age_days: Option<u64>,
    default_batch_size: Option<usize>,
}

impl CacheConfigBuilder {
    /// Set the cache root directory
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the default sweep age in days
    pub fn max_age_days(mut self, days: u64) -> Self {
        self.max_age_days = Some(days);
        self
    }

    /// Set the advisory classification batch size
    pub fn default_batch_size(mut self, size: usize) -> Self {
        self.default_batch_size = Some(size);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            root: self.root.unwrap_or(defaults.root),
            max_age_days: self.max_age_days.unwrap_or(defaults.max_age_days),
            default_batch_size: self
                .default_batch_size
                .unwrap_or(defaults.default_batch_size),
        }
    }
}
