//! Deterministic cache key derivation
//!
//! Pure functions turning heterogeneous inputs (file contents, free-text
//! queries, batched item sets) into stable SHA-256 keys. Every derivation is
//! a pure function of its logically relevant inputs: the same inputs yield
//! the same key across processes and platforms, and each key family mixes in
//! a distinct domain prefix so families can never collide with each other.

use crate::types::CacheKey;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

const QUERY_DOMAIN: &[u8] = b"query\0";
const BATCH_DOMAIN: &[u8] = b"batch\0";
const SOURCE_SET_DOMAIN: &[u8] = b"sources\0";

/// Normalize free-text query input: lowercase, trim, collapse internal
/// whitespace. Queries differing only in casing or incidental spacing
/// collapse to the same key, which is intentional - the query set is small
/// and repetitive, and normalization maximizes the hit rate.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the key for a normalized query within a context (corpus or
/// external provider). Context is part of the key so identical query text
/// against different corpora cannot collide.
pub fn query_key(raw_query: &str, context: &str) -> CacheKey {
    query_variant_key(raw_query, context, None)
}

/// Derive a query key with an optional variant tag.
///
/// Variants let related results of one fetch live under distinct keys, e.g.
/// the raw external-API response vs. its parsed summary - re-summarizing
/// then invalidates only the parsed entry, not the expensive raw fetch.
pub fn query_variant_key(raw_query: &str, context: &str, variant: Option<&str>) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(QUERY_DOMAIN);
    hasher.update(context.as_bytes());
    hasher.update([0u8]);
    // Presence is encoded before the tag so Some("") cannot alias None.
    match variant {
        Some(tag) => {
            hasher.update([1u8]);
            hasher.update(tag.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update([0u8]);
    hasher.update(normalize_query(raw_query).as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the key for a batched classification call.
///
/// Item identifiers are sorted before hashing, so the key is independent of
/// caller-side ordering. It does depend on the exact item set: overlapping
/// but non-identical batches produce different keys and do not share cached
/// sub-results. Callers wanting high hit rates must batch the same way for
/// the same corpus.
pub fn batch_key(condition: &str, item_ids: &[String]) -> CacheKey {
    let mut sorted: Vec<&str> = item_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(BATCH_DOMAIN);
    hasher.update(content_hash(condition.as_bytes()).as_bytes());
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Derive the key identifying a set of source files, independent of their
/// contents. The entry key for a built index must stay stable while the
/// sources mutate - content changes are detected by the fingerprint, not by
/// the key.
pub fn source_set_key<P: AsRef<Path>>(sources: &[P]) -> CacheKey {
    let mut ids: Vec<String> = sources
        .iter()
        .map(|p| p.as_ref().to_string_lossy().into_owned())
        .collect();
    ids.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(SOURCE_SET_DOMAIN);
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// SHA-256 of a byte slice, as lowercase hex
pub fn content_hash(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    hex::encode(hasher.finalize())
}

/// SHA-256 of bytes drawn from a reader, as lowercase hex.
///
/// Streams in 64 KiB chunks so multi-megabyte source files are never held
/// in memory whole.
pub fn reader_hash(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a file's full contents, as lowercase hex
pub fn file_content_hash(path: impl AsRef<Path>) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    reader_hash(file)
}
