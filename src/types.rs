//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cache key type - lowercase hex rendering of a SHA-256 digest
pub type CacheKey = String;

/// Top-level cache category. Each namespace maps to its own subdirectory
/// under the cache root and isolates its key space: equal key strings in
/// different namespaces address different entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Built vector indexes, validated by content fingerprints
    Vectors,

    /// Search results and external-API responses, keyed by normalized query
    Search,

    /// Batched LLM classification verdicts
    Matching,
}

impl Namespace {
    /// All namespaces, in stable order
    pub const ALL: [Namespace; 3] = [Namespace::Vectors, Namespace::Search, Namespace::Matching];

    /// Subdirectory name for this namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Vectors => "vectors",
            Namespace::Search => "search",
            Namespace::Matching => "matching",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a `get_or_*` lookup.
///
/// `MissUnpersisted` means the computed value is valid and returned to the
/// caller, but writing it back to disk failed - the next lookup for the same
/// key will recompute. Callers that care (e.g. to retry or fall back to an
/// uncached code path) can distinguish it from a plain miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    /// A valid entry was found and returned
    Hit,

    /// No valid entry existed; the compute function ran and the result was stored
    Miss,

    /// The compute function ran but the result could not be stored
    MissUnpersisted,
}

impl CacheStatus {
    /// True when the lookup was served from the cache
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::Hit)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "hit"),
            CacheStatus::Miss => write!(f, "miss"),
            CacheStatus::MissUnpersisted => write!(f, "miss_unpersisted"),
        }
    }
}

/// Per-namespace entry count and size, computed on demand by the janitor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceStats {
    /// Number of readable entries
    pub entries: usize,

    /// Total size of entry files in bytes
    pub total_bytes: u64,

    /// Entries whose envelope could not be read (skipped, not fatal)
    pub unreadable: usize,
}

/// Aggregate cache statistics across all namespaces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Statistics keyed by namespace
    pub per_namespace: BTreeMap<Namespace, NamespaceStats>,
}

impl CacheStats {
    /// Total readable entries across namespaces
    pub fn total_entries(&self) -> usize {
        self.per_namespace.values().map(|s| s.entries).sum()
    }

    /// Total bytes across namespaces
    pub fn total_bytes(&self) -> u64 {
        self.per_namespace.values().map(|s| s.total_bytes).sum()
    }

    /// Total unreadable entries across namespaces
    pub fn total_unreadable(&self) -> usize {
        self.per_namespace.values().map(|s| s.unreadable).sum()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ entries: {}, size: {} bytes, unreadable: {} }}",
            self.total_entries(),
            self.total_bytes(),
            self.total_unreadable()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_str() {
        assert_eq!(Namespace::Vectors.as_str(), "vectors");
        assert_eq!(Namespace::Search.as_str(), "search");
        assert_eq!(Namespace::Matching.as_str(), "matching");
        assert_eq!(format!("{}", Namespace::Search), "search");
    }

    #[test]
    fn test_namespace_all_is_distinct() {
        for (i, a) in Namespace::ALL.iter().enumerate() {
            for b in &Namespace::ALL[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
            }
        }
    }

    #[test]
    fn test_status_is_hit() {
        assert!(CacheStatus::Hit.is_hit());
        assert!(!CacheStatus::Miss.is_hit());
        assert!(!CacheStatus::MissUnpersisted.is_hit());
    }

    #[test]
    fn test_stats_totals() {
        let mut stats = CacheStats::default();
        stats.per_namespace.insert(
            Namespace::Search,
            NamespaceStats {
                entries: 3,
                total_bytes: 300,
                unreadable: 1,
            },
        );
        stats.per_namespace.insert(
            Namespace::Matching,
            NamespaceStats {
                entries: 2,
                total_bytes: 150,
                unreadable: 0,
            },
        );

        assert_eq!(stats.total_entries(), 5);
        assert_eq!(stats.total_bytes(), 450);
        assert_eq!(stats.total_unreadable(), 1);

        let display = format!("{}", stats);
        assert!(display.contains("entries: 5"));
    }
}
