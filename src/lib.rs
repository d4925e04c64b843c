//! # remedy-cache
//!
//! A multi-tier disk cache for RAG pipeline artifacts: built vector
//! indexes, search results, external-API responses, and batched LLM
//! classification verdicts.
//!
//! ## Features
//!
//! - **Deterministic keys**: every key is a pure function of the
//!   operation's logically relevant inputs (normalized query text, sorted
//!   batch membership, source file identity), stable across process
//!   restarts and platforms
//! - **Content-hash invalidation**: index artifacts are trusted only while
//!   their source files are byte-identical to the recorded fingerprint -
//!   modification times are never consulted
//! - **Corruption resilience**: an entry that fails to deserialize is a
//!   cache miss, never an error; the worst case is one recomputation
//! - **Multi-process safe**: entries are written via temp-file-and-rename,
//!   so concurrent readers across threads and processes see either the
//!   prior complete entry or the new one
//! - **TTL sweeps**: age-based cleanup with per-namespace statistics
//!
//! ## Architecture
//!
//! Three stateless typed caches share one disk store, each in its own
//! namespace:
//! - [`IndexCache`] (`vectors`) - large derived artifacts validated by
//!   source fingerprints
//! - [`QueryCache`] (`search`) - normalized-query lookups with context
//!   isolation and raw/parsed variants
//! - [`BatchMatchCache`] (`matching`) - exact-batch classification
//!   verdicts
//!
//! The [`Janitor`] runs off the request path against the same store.
//!
//! ## Example
//!
//! ```no_run
//! use remedy_cache::{Cache, CacheConfig, Namespace};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = Cache::init(CacheConfig::builder().root(".cache").build())?;
//!
//! let (results, status) = cache
//!     .query()
//!     .get_or_fetch(Namespace::Search, "tylenol dosage", "tabular-corpus", || async {
//!         Ok(vec!["Tylenol 500mg: 1-2 tablets every 4-6 hours".to_string()])
//!     })
//!     .await?;
//!
//! println!("{} ({})", results.join("; "), status);
//!
//! let report = cache.janitor().sweep(7)?;
//! println!("swept {} entries", report.deleted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod janitor;
pub mod key;
pub mod matching;
pub mod query;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::{CacheError, Result};
pub use fingerprint::Fingerprint;
pub use index::IndexCache;
pub use janitor::{Janitor, SweepReport};
pub use matching::{BatchMatchCache, Verdicts};
pub use query::QueryCache;
pub use store::Store;
pub use types::{CacheKey, CacheStats, CacheStatus, Namespace, NamespaceStats};

use std::sync::Arc;
use tracing::info;

/// Handle over the full cache subsystem.
///
/// Explicitly constructed and passed to collaborators that need caching -
/// there is no global instance. All state lives on disk, so no teardown is
/// required beyond process exit, and independent handles (including ones in
/// other processes) pointed at the same root observe a consistent view
/// through the filesystem.
#[derive(Debug, Clone)]
pub struct Cache {
    config: CacheConfig,
    index: IndexCache,
    query: QueryCache,
    matching: BatchMatchCache,
    janitor: Janitor,
}

impl Cache {
    /// Validate `config`, open the store (creating the directory layout if
    /// needed), and return a handle.
    pub fn init(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(Store::open(&config.root)?);
        info!("cache initialized at {}", config.root.display());

        Ok(Self {
            index: IndexCache::new(store.clone()),
            query: QueryCache::new(store.clone()),
            matching: BatchMatchCache::new(store.clone()),
            janitor: Janitor::new(store),
            config,
        })
    }

    /// The configuration this handle was initialized with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Vector-index cache (namespace `vectors`)
    pub fn index(&self) -> &IndexCache {
        &self.index
    }

    /// Query/search-result cache (namespace `search`)
    pub fn query(&self) -> &QueryCache {
        &self.query
    }

    /// Batched-classification cache (namespace `matching`)
    pub fn matching(&self) -> &BatchMatchCache {
        &self.matching
    }

    /// Sweep and statistics surface
    pub fn janitor(&self) -> &Janitor {
        &self.janitor
    }

    /// Sweep using the configured default age
    pub fn sweep_default(&self) -> Result<SweepReport> {
        self.janitor.sweep(self.config.max_age_days)
    }
}
