//! TTL sweep and cache statistics
//!
//! The janitor runs off the request path and touches only the store. A
//! sweep deletes entries whose recorded `created_at` is older than the
//! cutoff; it is safe to run while other threads or processes read and
//! write, because each delete targets a single entry file and a racing
//! reader sees either the old entry or a clean miss. One bad entry or one
//! failed delete never aborts the rest of the pass.

use crate::error::Result;
use crate::store::Store;
use crate::types::{CacheStats, Namespace, NamespaceStats};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result summary from a sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Number of entries deleted
    pub deleted: usize,

    /// Total size of deleted entry files in bytes
    pub freed_bytes: u64,
}

/// Age-based cleanup and statistics over the store
#[derive(Debug, Clone)]
pub struct Janitor {
    store: Arc<Store>,
}

impl Janitor {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Delete entries older than `max_age_days` across all namespaces.
    ///
    /// Entries whose envelope cannot be read are skipped - their age is
    /// unknowable here, and they already read as misses on the request
    /// path. Per-entry delete failures are logged and the sweep continues.
    pub fn sweep(&self, max_age_days: u64) -> Result<SweepReport> {
        // An age too large to represent as a cutoff means nothing is old
        // enough to qualify.
        let cutoff = match i64::try_from(max_age_days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
        {
            Some(cutoff) => cutoff,
            None => return Ok(SweepReport::default()),
        };
        let mut report = SweepReport::default();

        for ns in Namespace::ALL {
            for path in self.store.list_entries(ns)? {
                let envelope = match Store::read_envelope(&path) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        debug!("sweep skipping unreadable entry {}: {}", path.display(), e);
                        continue;
                    }
                };
                if envelope.created_at >= cutoff {
                    continue;
                }

                let mut size = entry_size(&path);
                if ns == Namespace::Vectors {
                    // delete() removes the fingerprint sidecar too; count it.
                    size += entry_size(&self.store.fingerprint_path(&envelope.key));
                }
                match self.store.delete(ns, &envelope.key) {
                    Ok(true) => {
                        debug!("swept expired entry {}/{}", ns, envelope.key);
                        report.deleted += 1;
                        report.freed_bytes += size;
                    }
                    Ok(false) => {} // raced with another deleter
                    Err(e) => {
                        warn!("sweep failed to delete {}/{}: {}", ns, envelope.key, e);
                    }
                }
            }
        }

        info!(
            "sweep complete: {} entries deleted, {} bytes freed",
            report.deleted, report.freed_bytes
        );
        Ok(report)
    }

    /// Per-namespace entry count and byte size, computed by scanning the
    /// current entry set. Read-only; unreadable entries are tallied, not
    /// fatal.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();

        for ns in Namespace::ALL {
            let mut ns_stats = NamespaceStats::default();
            for path in self.store.list_entries(ns)? {
                match Store::read_envelope(&path) {
                    Ok(_) => {
                        ns_stats.entries += 1;
                        ns_stats.total_bytes += entry_size(&path);
                    }
                    Err(e) => {
                        debug!("stats skipping unreadable entry {}: {}", path.display(), e);
                        ns_stats.unreadable += 1;
                    }
                }
            }
            stats.per_namespace.insert(ns, ns_stats);
        }

        Ok(stats)
    }

    /// Delete every entry in every namespace. Returns the number deleted.
    pub fn clear_all(&self) -> Result<usize> {
        let mut count = 0;
        for ns in Namespace::ALL {
            count += self.clear_namespace(ns)?;
        }
        info!("cleared all namespaces: {} entries", count);
        Ok(count)
    }

    /// Delete every entry in one namespace (including fingerprint
    /// sidecars for vectors). Returns the number of entries deleted.
    pub fn clear_namespace(&self, namespace: Namespace) -> Result<usize> {
        let mut count = 0;
        for path in self.store.list_entries(namespace)? {
            let Some(key) = entry_key(&path) else {
                continue;
            };
            match self.store.delete(namespace, &key) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("failed to delete {}/{}: {}", namespace, key, e);
                }
            }
        }
        debug!("cleared namespace {}: {} entries", namespace, count);
        Ok(count)
    }
}

fn entry_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn entry_key(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn janitor() -> (TempDir, Arc<Store>, Janitor) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(Store::open(tmp.path()).unwrap());
        let janitor = Janitor::new(store.clone());
        (tmp, store, janitor)
    }

    fn write_aged(store: &Store, key: &str, age_days: i64) {
        store
            .write_with_created_at(
                Namespace::Search,
                key,
                format!("payload-{key}").as_bytes(),
                Utc::now() - Duration::days(age_days),
            )
            .unwrap();
    }

    #[test]
    fn test_sweep_deletes_exactly_the_old_entries() {
        let (_tmp, store, janitor) = janitor();
        for (key, age) in [("day1", 1), ("day5", 5), ("day10", 10), ("day30", 30)] {
            write_aged(&store, key, age);
        }

        let before_day1 = store.read(Namespace::Search, "day1").unwrap().unwrap();
        let before_day5 = store.read(Namespace::Search, "day5").unwrap().unwrap();

        let report = janitor.sweep(7).unwrap();
        assert_eq!(report.deleted, 2);
        assert!(report.freed_bytes > 0);

        // Survivors are byte-identical to before the sweep.
        assert_eq!(
            store.read(Namespace::Search, "day1").unwrap().unwrap(),
            before_day1
        );
        assert_eq!(
            store.read(Namespace::Search, "day5").unwrap().unwrap(),
            before_day5
        );
        assert!(store.read(Namespace::Search, "day10").unwrap().is_none());
        assert!(store.read(Namespace::Search, "day30").unwrap().is_none());

        let stats = janitor.stats().unwrap();
        assert_eq!(stats.per_namespace[&Namespace::Search].entries, 2);
    }

    #[test]
    fn test_sweep_skips_unreadable_entries() {
        let (_tmp, store, janitor) = janitor();
        write_aged(&store, "old", 30);
        fs::write(store.entry_path(Namespace::Search, "junk"), b"not an envelope").unwrap();

        let report = janitor.sweep(7).unwrap();
        assert_eq!(report.deleted, 1);
        // The junk file is untouched; it shows up in stats as unreadable.
        assert!(store.entry_path(Namespace::Search, "junk").exists());

        let stats = janitor.stats().unwrap();
        assert_eq!(stats.per_namespace[&Namespace::Search].unreadable, 1);
        assert_eq!(stats.per_namespace[&Namespace::Search].entries, 0);
    }

    #[test]
    fn test_sweep_removes_vector_sidecars() {
        let (_tmp, store, janitor) = janitor();
        store
            .write_with_created_at(
                Namespace::Vectors,
                "idx",
                b"artifact",
                Utc::now() - Duration::days(30),
            )
            .unwrap();
        let fp = crate::Fingerprint::compute::<&Path>(&[]).unwrap();
        store.write_fingerprint("idx", &fp).unwrap();

        janitor.sweep(7).unwrap();
        assert!(!store.entry_path(Namespace::Vectors, "idx").exists());
        assert!(!store.fingerprint_path("idx").exists());
    }

    #[test]
    fn test_sweep_counts_sidecar_bytes_for_vectors() {
        let (_tmp, store, janitor) = janitor();
        store
            .write_with_created_at(
                Namespace::Vectors,
                "idx",
                b"artifact",
                Utc::now() - Duration::days(30),
            )
            .unwrap();
        let fp = crate::Fingerprint::compute::<&Path>(&[]).unwrap();
        store.write_fingerprint("idx", &fp).unwrap();

        let payload_bytes = entry_size(&store.entry_path(Namespace::Vectors, "idx"));
        let sidecar_bytes = entry_size(&store.fingerprint_path("idx"));
        assert!(sidecar_bytes > 0);

        let report = janitor.sweep(7).unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.freed_bytes, payload_bytes + sidecar_bytes);
    }

    #[test]
    fn test_sweep_with_unrepresentable_age_deletes_nothing() {
        let (_tmp, store, janitor) = janitor();
        write_aged(&store, "old", 30);

        let report = janitor.sweep(u64::MAX).unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(store.read(Namespace::Search, "old").unwrap().is_some());
    }

    #[test]
    fn test_stats_counts_per_namespace() {
        let (_tmp, store, janitor) = janitor();
        store.write(Namespace::Search, "s1", b"one").unwrap();
        store.write(Namespace::Search, "s2", b"two").unwrap();
        store.write(Namespace::Matching, "m1", b"three").unwrap();

        let stats = janitor.stats().unwrap();
        assert_eq!(stats.per_namespace[&Namespace::Search].entries, 2);
        assert_eq!(stats.per_namespace[&Namespace::Matching].entries, 1);
        assert_eq!(stats.per_namespace[&Namespace::Vectors].entries, 0);
        assert!(stats.per_namespace[&Namespace::Search].total_bytes > 0);
        assert_eq!(stats.total_entries(), 3);
    }

    #[test]
    fn test_clear_namespace_leaves_others() {
        let (_tmp, store, janitor) = janitor();
        store.write(Namespace::Search, "s1", b"one").unwrap();
        store.write(Namespace::Matching, "m1", b"two").unwrap();

        let cleared = janitor.clear_namespace(Namespace::Search).unwrap();
        assert_eq!(cleared, 1);
        assert!(store.read(Namespace::Search, "s1").unwrap().is_none());
        assert!(store.read(Namespace::Matching, "m1").unwrap().is_some());
    }

    #[test]
    fn test_clear_all() {
        let (_tmp, store, janitor) = janitor();
        store.write(Namespace::Search, "s1", b"one").unwrap();
        store.write(Namespace::Matching, "m1", b"two").unwrap();
        store.write(Namespace::Vectors, "v1", b"three").unwrap();

        let cleared = janitor.clear_all().unwrap();
        assert_eq!(cleared, 3);
        assert_eq!(janitor.stats().unwrap().total_entries(), 0);
    }

    #[test]
    fn test_sweep_on_empty_store() {
        let (_tmp, _store, janitor) = janitor();
        let report = janitor.sweep(7).unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
