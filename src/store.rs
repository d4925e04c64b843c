//! Physical storage layer: one file per entry, one directory per namespace
//!
//! The store is the only component that owns on-disk state. Entries are
//! immutable once written; a write with the same key replaces the entry
//! wholesale. Writes go to a uniquely named temporary file in the target
//! directory and are renamed into place, so a concurrent reader - in this
//! process or another sharing the directory - observes either the prior
//! complete entry or the new complete entry, never a partial one. No
//! in-process locking is relied upon for correctness; racing writers are
//! last-writer-wins.

use crate::error::{CacheError, Result};
use crate::types::Namespace;
use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Bumped when the envelope layout changes; mismatched entries read as
/// misses and are rebuilt instead of crashing on deserialize.
const ENTRY_FORMAT_VERSION: u32 = 1;

/// Upper bound on any envelope we will attempt to deserialize. Corruption
/// must degrade to a miss, not an out-of-memory crash from a mangled
/// length prefix.
const ENVELOPE_LIMIT_BYTES: u64 = 256 * 1024 * 1024;

const ENTRY_EXT: &str = "bin";
const FINGERPRINT_EXT: &str = "fp.json";

fn bincode_options() -> impl Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(ENVELOPE_LIMIT_BYTES)
}

/// On-disk envelope wrapping every cached payload
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub format_version: u32,
    pub key: String,
    pub namespace: Namespace,
    pub created_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// Directory-organized, namespaced entry store
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open a store rooted at `root`, creating the namespace layout
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for ns in Namespace::ALL {
            fs::create_dir_all(root.join(ns.as_str()))?;
        }
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the payload file for `(namespace, key)`. Lookup is direct
    /// path construction; no index or database is consulted.
    pub fn entry_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.root
            .join(namespace.as_str())
            .join(format!("{}.{}", key, ENTRY_EXT))
    }

    /// Path of the fingerprint sidecar for a vectors entry
    pub fn fingerprint_path(&self, key: &str) -> PathBuf {
        self.root
            .join(Namespace::Vectors.as_str())
            .join(format!("{}.{}", key, FINGERPRINT_EXT))
    }

    /// Write a payload under `(namespace, key)`, replacing any prior entry
    pub fn write(&self, namespace: Namespace, key: &str, payload: &[u8]) -> Result<()> {
        self.write_with_created_at(namespace, key, payload, Utc::now())
    }

    pub(crate) fn write_with_created_at(
        &self,
        namespace: Namespace,
        key: &str,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let envelope = Envelope {
            format_version: ENTRY_FORMAT_VERSION,
            key: key.to_string(),
            namespace,
            created_at,
            payload: payload.to_vec(),
        };
        let bytes = bincode_options().serialize(&envelope)?;
        atomic_write(&self.entry_path(namespace, key), &bytes)?;
        debug!("stored entry {}/{} ({} bytes)", namespace, key, bytes.len());
        Ok(())
    }

    /// Read the payload stored under `(namespace, key)`.
    ///
    /// Returns `Ok(None)` for both absence and corruption: an entry that
    /// fails to deserialize, carries a different format version, or does not
    /// match the requested identity is a miss, never an error. Only
    /// unexpected filesystem failures surface as `Err`.
    pub fn read(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(namespace, key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decode_envelope(&bytes) {
            Some(envelope) if envelope.key == key && envelope.namespace == namespace => {
                Ok(Some(envelope.payload))
            }
            Some(envelope) => {
                warn!(
                    "entry at {} has mismatched identity ({}/{}), treating as miss",
                    path.display(),
                    envelope.namespace,
                    envelope.key
                );
                Ok(None)
            }
            None => {
                warn!("corrupt entry at {}, treating as miss", path.display());
                Ok(None)
            }
        }
    }

    /// Read the full envelope at `path`, failing on corruption. Used by the
    /// janitor, which needs `created_at` and wants to tally unreadable
    /// entries instead of silently skipping them.
    pub(crate) fn read_envelope(path: &Path) -> Result<Envelope> {
        let bytes = fs::read(path)?;
        decode_envelope(&bytes)
            .ok_or_else(|| CacheError::Serialization(format!("corrupt envelope at {}", path.display())))
    }

    /// Delete the entry (and, for vectors, its fingerprint sidecar).
    /// Returns whether a payload file existed.
    pub fn delete(&self, namespace: Namespace, key: &str) -> Result<bool> {
        if namespace == Namespace::Vectors {
            remove_if_exists(&self.fingerprint_path(key))?;
        }
        remove_if_exists(&self.entry_path(namespace, key))
    }

    /// List payload files in a namespace, skipping sidecars and in-flight
    /// temporary files
    pub fn list_entries(&self, namespace: Namespace) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(namespace.as_str());
        let mut paths = Vec::new();
        if !dir.exists() {
            return Ok(paths);
        }

        for entry in fs::read_dir(&dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Entries can race with deletion from another process.
                    debug!("skipping unreadable directory entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Write a fingerprint sidecar as JSON
    pub fn write_fingerprint(&self, key: &str, fingerprint: &crate::Fingerprint) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(fingerprint)?;
        atomic_write(&self.fingerprint_path(key), &bytes)
    }

    /// Read a fingerprint sidecar. Missing or unreadable sidecars return
    /// `None` - the index cache treats that as stale.
    pub fn read_fingerprint(&self, key: &str) -> Option<crate::Fingerprint> {
        let path = self.fingerprint_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("failed to read fingerprint at {}: {}", path.display(), e);
                }
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(fp) => Some(fp),
            Err(e) => {
                warn!("corrupt fingerprint at {}, treating as stale: {}", path.display(), e);
                None
            }
        }
    }
}

fn decode_envelope(bytes: &[u8]) -> Option<Envelope> {
    let envelope: Envelope = bincode_options().deserialize(bytes).ok()?;
    if envelope.format_version != ENTRY_FORMAT_VERSION {
        return None;
    }
    Some(envelope)
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path` via a unique temporary file in the same
/// directory followed by a rename. The pid+counter suffix keeps concurrent
/// writers (threads or processes) from clobbering each other's temp files.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CacheError::StorageIo(io::Error::other("path has no parent")))?;
    fs::create_dir_all(parent)?;

    let (tmp_path, mut file) = open_unique_tmp_file(path, parent)?;
    let write_result = file
        .write_all(bytes)
        .and_then(|_| file.sync_all());
    if let Err(e) = write_result {
        drop(file);
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_open_creates_namespace_dirs() {
        let (tmp, _store) = store();
        for ns in Namespace::ALL {
            assert!(tmp.path().join(ns.as_str()).is_dir());
        }
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (_tmp, store) = store();
        store.write(Namespace::Search, "k1", b"payload").unwrap();

        let read = store.read(Namespace::Search, "k1").unwrap();
        assert_eq!(read.as_deref(), Some(b"payload".as_slice()));
    }

    #[test]
    fn test_missing_entry_is_none() {
        let (_tmp, store) = store();
        assert!(store.read(Namespace::Search, "nope").unwrap().is_none());
    }

    #[test]
    fn test_namespace_isolation() {
        let (_tmp, store) = store();
        store.write(Namespace::Search, "shared-key", b"search data").unwrap();

        assert!(store.read(Namespace::Matching, "shared-key").unwrap().is_none());
        assert!(store.read(Namespace::Vectors, "shared-key").unwrap().is_none());
    }

    #[test]
    fn test_overwrite_replaces_wholesale() {
        let (_tmp, store) = store();
        store.write(Namespace::Search, "k", b"first").unwrap();
        store.write(Namespace::Search, "k", b"second").unwrap();

        let read = store.read(Namespace::Search, "k").unwrap();
        assert_eq!(read.as_deref(), Some(b"second".as_slice()));
    }

    #[test]
    fn test_corrupt_entry_reads_as_miss() {
        let (_tmp, store) = store();
        store.write(Namespace::Search, "k", b"payload").unwrap();

        fs::write(store.entry_path(Namespace::Search, "k"), b"garbage").unwrap();
        assert!(store.read(Namespace::Search, "k").unwrap().is_none());
    }

    #[test]
    fn test_truncated_entry_reads_as_miss() {
        let (_tmp, store) = store();
        store.write(Namespace::Search, "k", vec![9u8; 4096].as_slice()).unwrap();

        let path = store.entry_path(Namespace::Search, "k");
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(store.read(Namespace::Search, "k").unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let (_tmp, store) = store();
        store.write(Namespace::Search, "k", b"payload").unwrap();

        assert!(store.delete(Namespace::Search, "k").unwrap());
        assert!(store.read(Namespace::Search, "k").unwrap().is_none());
        assert!(!store.delete(Namespace::Search, "k").unwrap());
    }

    #[test]
    fn test_delete_vectors_removes_sidecar() {
        let (_tmp, store) = store();
        store.write(Namespace::Vectors, "idx", b"artifact").unwrap();
        let fp = crate::Fingerprint::compute::<&Path>(&[]).unwrap();
        store.write_fingerprint("idx", &fp).unwrap();
        assert!(store.fingerprint_path("idx").exists());

        store.delete(Namespace::Vectors, "idx").unwrap();
        assert!(!store.fingerprint_path("idx").exists());
    }

    #[test]
    fn test_list_entries_skips_sidecars_and_tmp() {
        let (_tmp, store) = store();
        store.write(Namespace::Vectors, "idx", b"artifact").unwrap();
        let fp = crate::Fingerprint::compute::<&Path>(&[]).unwrap();
        store.write_fingerprint("idx", &fp).unwrap();
        fs::write(
            store.root().join("vectors").join("idx.bin.tmp.123.0"),
            b"partial",
        )
        .unwrap();

        let entries = store.list_entries(Namespace::Vectors).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("idx.bin"));
    }

    #[test]
    fn test_fingerprint_roundtrip_and_corruption() {
        let (_tmp, store) = store();
        let fp = crate::Fingerprint::compute::<&Path>(&[]).unwrap().with_artifact_digest("d");
        store.write_fingerprint("idx", &fp).unwrap();

        let loaded = store.read_fingerprint("idx").unwrap();
        assert_eq!(loaded, fp);

        fs::write(store.fingerprint_path("idx"), b"{not json").unwrap();
        assert!(store.read_fingerprint("idx").is_none());
    }

    #[test]
    fn test_atomic_write_leaves_no_tmp_files() {
        let (_tmp, store) = store();
        store.write(Namespace::Search, "k", b"payload").unwrap();

        let dir = store.root().join("search");
        for entry in fs::read_dir(dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.contains(".tmp."), "leftover temp file {name}");
        }
    }
}
