//! Redis-backed entry store.
//!
//! Layout:
//!
//! - Entries are hashes with fields `data`, `etag`, `written_at` (Unix
//!   millis) and `version`, expired with `PEXPIRE`.
//! - Locks are plain strings holding the holder id, set with `SET NX PX`.
//!
//! Conditional writes and lock release run as Lua scripts so the compare
//! and the mutation are one atomic step on the server. Pattern
//! invalidation iterates with `SCAN MATCH ... COUNT` and deletes each page
//! with `UNLINK`, never `KEYS`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use syllabus_core::{CacheError, CacheResult};

use super::entry::CacheEntry;
use super::traits::{EntryBackend, EntryWrite, WriteOutcome};

/// KEYS[1] entry key.
/// ARGV: expected etag ('' for none), data, etag, written_at, ttl millis.
/// Returns {1, version} on write, {0, current etag} on conflict.
const CONDITIONAL_WRITE: &str = r#"
local expected = ARGV[1]
local current = redis.call('HGET', KEYS[1], 'etag')
if expected ~= '' and current ~= expected then
  if current then
    return {0, current}
  end
  return {0, ''}
end
local previous = tonumber(redis.call('HGET', KEYS[1], 'version') or '0') or 0
local version = previous + 1
redis.call('HSET', KEYS[1],
  'data', ARGV[2], 'etag', ARGV[3], 'written_at', ARGV[4], 'version', version)
redis.call('PEXPIRE', KEYS[1], ARGV[5])
return {1, tostring(version)}
"#;

/// KEYS[1] lock key, ARGV[1] holder id. Returns 1 when deleted.
const COMPARE_DELETE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Error type for Redis cache operations.
#[derive(Debug, thiserror::Error)]
pub enum RedisCacheError {
    /// Failed to open the client or establish the connection.
    #[error("Failed to connect to Redis: {0}")]
    Connect(String),

    /// A command or script failed.
    #[error("Redis command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// A stored hash is missing fields or holds unparsable values.
    #[error("Malformed cache entry at {key}: {reason}")]
    MalformedEntry { key: String, reason: String },
}

/// Convert RedisCacheError to CacheError.
impl From<RedisCacheError> for CacheError {
    fn from(e: RedisCacheError) -> Self {
        CacheError::Backend {
            reason: e.to_string(),
        }
    }
}

/// [`EntryBackend`] over a shared Redis instance.
///
/// Holds a [`ConnectionManager`], which multiplexes one connection and
/// reconnects on failure; clones share it.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    write_script: Script,
    release_script: Script,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, RedisCacheError> {
        let client =
            redis::Client::open(url).map_err(|e| RedisCacheError::Connect(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| RedisCacheError::Connect(e.to_string()))?;

        tracing::info!("Connected to Redis cache backend");

        Ok(Self {
            conn,
            write_script: Script::new(CONDITIONAL_WRITE),
            release_script: Script::new(COMPARE_DELETE),
        })
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> Result<(), RedisCacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn duration_millis(d: Duration) -> u64 {
    // PX 0 is rejected by Redis.
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn parse_entry(
    key: &str,
    mut fields: HashMap<String, Vec<u8>>,
) -> Result<CacheEntry, RedisCacheError> {
    let malformed = |reason: &str| RedisCacheError::MalformedEntry {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let mut text = |name: &str| -> Result<String, RedisCacheError> {
        let raw = fields
            .remove(name)
            .ok_or_else(|| malformed(&format!("missing field {name}")))?;
        String::from_utf8(raw).map_err(|_| malformed(&format!("field {name} is not UTF-8")))
    };

    let etag = text("etag")?;
    let written_at_millis = text("written_at")?
        .parse()
        .map_err(|_| malformed("written_at is not an integer"))?;
    let version = text("version")?
        .parse()
        .map_err(|_| malformed("version is not an integer"))?;
    let data = fields
        .remove("data")
        .ok_or_else(|| malformed("missing field data"))?;

    Ok(CacheEntry {
        data,
        etag,
        written_at_millis,
        version,
    })
}

impl RedisBackend {
    async fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>, RedisCacheError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, Vec<u8>> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        parse_entry(key, fields).map(Some)
    }

    async fn write_entry(
        &self,
        key: &str,
        write: EntryWrite<'_>,
    ) -> Result<WriteOutcome, RedisCacheError> {
        let mut conn = self.conn.clone();
        let (written, value): (i64, String) = self
            .write_script
            .key(key)
            .arg(write.expected_etag.unwrap_or(""))
            .arg(write.data)
            .arg(write.etag)
            .arg(write.written_at_millis)
            .arg(duration_millis(write.ttl))
            .invoke_async(&mut conn)
            .await?;

        if written == 1 {
            let version = value.parse().map_err(|_| RedisCacheError::MalformedEntry {
                key: key.to_string(),
                reason: format!("script returned version {value:?}"),
            })?;
            Ok(WriteOutcome::Written { version })
        } else {
            Ok(WriteOutcome::Conflict {
                current_etag: value,
            })
        }
    }

    async fn unlink_matching(
        &self,
        pattern: &str,
        batch_size: usize,
    ) -> Result<u64, RedisCacheError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(batch_size)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let n: u64 = redis::cmd("UNLINK").arg(&keys).query_async(&mut conn).await?;
                removed += n;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}

#[async_trait]
impl EntryBackend for RedisBackend {
    async fn read(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self.read_entry(key).await?)
    }

    async fn write(&self, key: &str, write: EntryWrite<'_>) -> CacheResult<WriteOutcome> {
        Ok(self.write_entry(key, write).await?)
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let n: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(RedisCacheError::from)?;
        Ok(n > 0)
    }

    async fn remove_matching(&self, pattern: &str, batch_size: usize) -> CacheResult<u64> {
        Ok(self.unlink_matching(pattern, batch_size.max(1)).await?)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(duration_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(RedisCacheError::from)?;
        Ok(reply.is_some())
    }

    async fn remove_if_equals(&self, key: &str, value: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let n: i64 = self
            .release_script
            .key(key)
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(RedisCacheError::from)?;
        Ok(n == 1)
    }
}
