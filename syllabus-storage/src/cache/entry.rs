//! Stored cache entries and ETag derivation.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A versioned entry as held by a backend.
///
/// `data` is the serialized payload. Entries never leave the store by
/// reference; readers receive a deserialized copy wrapped in [`Cached`].
///
/// [`Cached`]: super::traits::Cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Serialized payload bytes.
    pub data: Vec<u8>,
    /// Integrity and recency tag of this write.
    pub etag: String,
    /// Wall-clock write time in Unix milliseconds.
    pub written_at_millis: i64,
    /// Monotonic write counter, starting at 1.
    pub version: i64,
}

impl CacheEntry {
    /// Age of the entry relative to `now_millis`. Entries stamped in the
    /// future count as age zero.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        (now_millis - self.written_at_millis).max(0)
    }

    /// Write time as a UTC timestamp.
    pub fn written_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.written_at_millis).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Derive an ETag from payload bytes and the write timestamp.
///
/// Equality-only: 128 bits of a SHA-256, hex encoded. Any payload change
/// produces a different tag, and so does rewriting identical bytes later.
pub fn compute_etag(data: &[u8], written_at_millis: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(written_at_millis.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
