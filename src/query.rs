//! Cache for search results and external-API responses
//!
//! Smaller, frequent lookups keyed by normalized query text plus a context
//! string naming the corpus or provider being queried. Normalization folds
//! casing and incidental whitespace so a small, repetitive query set hits as
//! often as possible; the context keeps identical query text aimed at
//! different corpora apart. The namespace is part of the physical storage
//! path, so even a coincidentally equal key string in another namespace
//! addresses a different file.

use crate::error::Result;
use crate::key;
use crate::store::Store;
use crate::types::{CacheStatus, Namespace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache for query-shaped lookups with caller-supplied fetch on miss
#[derive(Debug, Clone)]
pub struct QueryCache {
    store: Arc<Store>,
}

impl QueryCache {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Return the cached result for `(raw_query, context)` in `namespace`,
    /// or fetch, persist and return a fresh one.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        namespace: Namespace,
        raw_query: &str,
        context: &str,
        fetch_fn: F,
    ) -> Result<(T, CacheStatus)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.get_or_fetch_variant(namespace, raw_query, context, None, fetch_fn)
            .await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), with a variant tag mixed
    /// into the key.
    ///
    /// External-API callers cache the raw provider response under one
    /// variant and the parsed/summarized form under another; changing the
    /// summarization then re-derives from the cached raw response instead of
    /// re-fetching from the provider.
    pub async fn get_or_fetch_variant<T, F, Fut>(
        &self,
        namespace: Namespace,
        raw_query: &str,
        context: &str,
        variant: Option<&str>,
        fetch_fn: F,
    ) -> Result<(T, CacheStatus)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let cache_key = key::query_variant_key(raw_query, context, variant);

        if let Some(payload) = self.store.read(namespace, &cache_key)? {
            match serde_json::from_slice(&payload) {
                Ok(value) => {
                    debug!("query cache hit: {}/{}", namespace, cache_key);
                    return Ok((value, CacheStatus::Hit));
                }
                Err(e) => {
                    // Payload decoded from disk but does not parse as T;
                    // treat like any other corrupt entry and refetch.
                    warn!(
                        "query cache payload undecodable at {}/{}: {}",
                        namespace, cache_key, e
                    );
                }
            }
        }

        debug!("query cache miss: {}/{}", namespace, cache_key);
        let value = fetch_fn().await?;

        let status = match serde_json::to_vec(&value)
            .map_err(crate::error::CacheError::from)
            .and_then(|bytes| self.store.write(namespace, &cache_key, &bytes))
        {
            Ok(()) => CacheStatus::Miss,
            Err(e) => {
                warn!(
                    "failed to persist query result {}/{}: {}",
                    namespace, cache_key, e
                );
                CacheStatus::MissUnpersisted
            }
        };
        Ok((value, status))
    }
}
