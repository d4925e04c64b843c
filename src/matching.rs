//! Cache for batched LLM relevance-judgment calls
//!
//! One classification call asks the model whether each item in a batch
//! relates to a condition ("does this medicine treat headaches?"). The
//! verdict set for the whole batch is cached as one entry, keyed by the
//! condition and the exact item set submitted. The key is deliberately
//! batch-level, not per-item: overlapping but non-identical batches are
//! different entries and do not share cached sub-results. Callers wanting
//! high hit rates must batch the same way for the same corpus across runs.

use crate::error::Result;
use crate::key;
use crate::store::Store;
use crate::types::{CacheStatus, Namespace};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verdicts returned by one classification call, keyed by item identifier
pub type Verdicts = BTreeMap<String, bool>;

/// Cache for batched classification verdicts
#[derive(Debug, Clone)]
pub struct BatchMatchCache {
    store: Arc<Store>,
}

impl BatchMatchCache {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Return the cached verdicts for `(condition, items)`, or classify,
    /// persist and return fresh ones.
    ///
    /// Item order within the batch does not affect the key; membership
    /// does. `classify_fn` receives the condition and the item list as
    /// submitted and must return a verdict per item.
    pub async fn get_or_classify<F, Fut>(
        &self,
        condition: &str,
        items: &[String],
        classify_fn: F,
    ) -> Result<(Verdicts, CacheStatus)>
    where
        F: FnOnce(String, Vec<String>) -> Fut,
        Fut: Future<Output = anyhow::Result<Verdicts>>,
    {
        let cache_key = key::batch_key(condition, items);

        if let Some(payload) = self.store.read(Namespace::Matching, &cache_key)? {
            match serde_json::from_slice::<Verdicts>(&payload) {
                Ok(verdicts) => {
                    debug!(
                        "matching cache hit: {} ({} items)",
                        cache_key,
                        items.len()
                    );
                    return Ok((verdicts, CacheStatus::Hit));
                }
                Err(e) => {
                    warn!("matching cache payload undecodable at {}: {}", cache_key, e);
                }
            }
        }

        debug!(
            "matching cache miss: {} ({} items)",
            cache_key,
            items.len()
        );
        let verdicts = classify_fn(condition.to_string(), items.to_vec()).await?;

        let status = match serde_json::to_vec(&verdicts)
            .map_err(crate::error::CacheError::from)
            .and_then(|bytes| self.store.write(Namespace::Matching, &cache_key, &bytes))
        {
            Ok(()) => CacheStatus::Miss,
            Err(e) => {
                warn!("failed to persist verdicts {}: {}", cache_key, e);
                CacheStatus::MissUnpersisted
            }
        };
        Ok((verdicts, status))
    }
}
