//! Fingerprint-validated cache for built vector indexes
//!
//! The highest-value tier: building an index means re-embedding an entire
//! corpus, so a stored artifact is reused for as long as the source files it
//! was built from are byte-identical. The artifact itself is an opaque byte
//! blob - whatever serialized form the vector-search engine natively
//! produces - paired with a fingerprint sidecar recording the source
//! content hashes and the artifact digest.

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::key;
use crate::store::Store;
use crate::types::{CacheStatus, Namespace};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache for large derived artifacts keyed by fingerprinted source content
#[derive(Debug, Clone)]
pub struct IndexCache {
    store: Arc<Store>,
}

impl IndexCache {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Return the cached artifact for `sources`, or build, persist and
    /// return a fresh one.
    ///
    /// A hit requires all of: a readable fingerprint sidecar, source
    /// contents matching it, a readable artifact entry, and the artifact
    /// digest matching the sidecar. Anything less - first build, mutated
    /// sources, corrupt files, a fingerprint left over from a different
    /// write - is a miss and triggers `build_fn`. Corruption never surfaces
    /// to the caller; worst case is the cost of a rebuild.
    ///
    /// On a miss the artifact entry is written before the fingerprint, so a
    /// crash between the two leaves a missing/stale fingerprint (rebuilt
    /// next time) rather than a fresh fingerprint pointing at a stale
    /// artifact. If `build_fn` fails, nothing is written.
    pub async fn get_or_build<P, F, Fut>(
        &self,
        sources: &[P],
        build_fn: F,
    ) -> Result<(Vec<u8>, CacheStatus)>
    where
        P: AsRef<Path>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<u8>>>,
    {
        let cache_key = key::source_set_key(sources);

        if let Some(artifact) = self.lookup(&cache_key, sources)? {
            debug!("index cache hit: {}", cache_key);
            return Ok((artifact, CacheStatus::Hit));
        }

        info!("index cache miss, building: {}", cache_key);
        let artifact = build_fn().await?;

        let status = match self.persist(&cache_key, sources, &artifact) {
            Ok(()) => CacheStatus::Miss,
            Err(e) => {
                warn!("failed to persist index {}: {}", cache_key, e);
                CacheStatus::MissUnpersisted
            }
        };
        Ok((artifact, status))
    }

    fn lookup<P: AsRef<Path>>(&self, cache_key: &str, sources: &[P]) -> Result<Option<Vec<u8>>> {
        let Some(fingerprint) = self.store.read_fingerprint(cache_key) else {
            return Ok(None);
        };
        if fingerprint.is_stale(sources) {
            debug!("index fingerprint stale: {}", cache_key);
            return Ok(None);
        }

        let Some(artifact) = self.store.read(Namespace::Vectors, cache_key)? else {
            return Ok(None);
        };
        if !fingerprint.matches_artifact(&artifact) {
            // Fingerprint and artifact come from different writes.
            warn!(
                "index artifact digest mismatch for {}, treating as stale",
                cache_key
            );
            return Ok(None);
        }
        Ok(Some(artifact))
    }

    fn persist<P: AsRef<Path>>(
        &self,
        cache_key: &str,
        sources: &[P],
        artifact: &[u8],
    ) -> Result<()> {
        self.store.write(Namespace::Vectors, cache_key, artifact)?;
        let fingerprint =
            Fingerprint::compute(sources)?.with_artifact_digest(key::content_hash(artifact));
        self.store.write_fingerprint(cache_key, &fingerprint)
    }
}
