//! Content fingerprints for source-file invalidation
//!
//! A fingerprint records the full-content hash of each source file backing a
//! derived artifact, plus a combined hash over the set. Index-type caches
//! trust a stored artifact only while its fingerprint matches a fresh
//! recomputation: a single changed byte, a removed file, or a newly added
//! file all flip the combined hash. Modification times are deliberately not
//! used - copies and checkouts refresh mtimes without changing content.

use crate::error::Result;
use crate::key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Hash recorded for a source path that does not currently exist. Keeping
/// absent files in the map (rather than erroring) means a file appearing or
/// disappearing changes the combined hash like any other edit.
const MISSING_MARKER: &str = "missing";

/// A content-derived snapshot of a set of source files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Per-source content hashes, keyed by source identifier (path)
    pub sources: BTreeMap<String, String>,

    /// Combined hash over the sorted (identifier, hash) pairs
    pub combined: String,

    /// SHA-256 of the artifact payload this fingerprint validates.
    /// Pairs the fingerprint with one specific artifact write, so a
    /// fingerprint left over from a different write is staleness, not
    /// corruption.
    pub artifact_digest: String,

    /// When the fingerprint was recorded
    pub recorded_at: DateTime<Utc>,
}

impl Fingerprint {
    /// Compute a fingerprint over the given source files, reading full
    /// contents. Absent files are recorded under a fixed marker hash.
    pub fn compute<P: AsRef<Path>>(sources: &[P]) -> Result<Self> {
        let mut map = BTreeMap::new();
        for source in sources {
            let path = source.as_ref();
            let id = path.to_string_lossy().into_owned();
            let hash = if path.exists() {
                key::file_content_hash(path)?
            } else {
                MISSING_MARKER.to_string()
            };
            map.insert(id, hash);
        }

        let combined = combined_hash(&map);
        Ok(Self {
            sources: map,
            combined,
            artifact_digest: String::new(),
            recorded_at: Utc::now(),
        })
    }

    /// Attach the digest of the artifact this fingerprint validates
    pub fn with_artifact_digest(mut self, digest: impl Into<String>) -> Self {
        self.artifact_digest = digest.into();
        self
    }

    /// True when the stored fingerprint no longer describes the current
    /// source contents. Any failure to recompute (unreadable file mid-hash)
    /// reports stale rather than an error: worst case is a rebuild.
    pub fn is_stale<P: AsRef<Path>>(&self, sources: &[P]) -> bool {
        match Self::compute(sources) {
            Ok(current) => current.combined != self.combined,
            Err(e) => {
                tracing::warn!("fingerprint recomputation failed, treating as stale: {}", e);
                true
            }
        }
    }

    /// True when `artifact` is the payload this fingerprint was recorded for
    pub fn matches_artifact(&self, artifact: &[u8]) -> bool {
        key::content_hash(artifact) == self.artifact_digest
    }
}

fn combined_hash(sources: &BTreeMap<String, String>) -> String {
    // BTreeMap iteration is sorted, so the combined hash is independent of
    // the order the caller listed the files in.
    let mut acc = Vec::new();
    for (id, hash) in sources {
        acc.extend_from_slice(id.as_bytes());
        acc.push(0);
        acc.extend_from_slice(hash.as_bytes());
        acc.push(b'\n');
    }
    key::content_hash(&acc)
}
