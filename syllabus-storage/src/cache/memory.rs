//! In-process backend over a single keyspace map.
//!
//! Mirrors the Redis layout: entries and lock values share one keyspace and
//! every primitive runs inside one write-lock section, so each call is
//! atomic with respect to the others. Expiry uses the tokio clock, which
//! lets tests drive TTLs with a paused runtime.
//!
//! Expired keys are invisible to every primitive at once, and a background
//! sweeper (see [`MemoryBackend::spawn_sweeper`]) drops them from the map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use syllabus_core::{CacheError, CacheResult};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::entry::CacheEntry;
use super::glob::glob_to_regex;
use super::traits::{EntryBackend, EntryWrite, WriteOutcome};

#[derive(Debug, Clone)]
enum Value {
    Entry(CacheEntry),
    Plain(String),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local [`EntryBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: Arc<Slots>,
}

type Slots = RwLock<HashMap<String, Slot>>;

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry verbatim, bypassing versioning. Used to seed fixtures
    /// such as entries written long ago.
    pub fn insert_entry(
        &self,
        key: &str,
        entry: CacheEntry,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        slots.insert(
            key.to_string(),
            Slot {
                value: Value::Entry(entry),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    /// Whether a live key exists, entry or lock.
    pub fn contains(&self, key: &str) -> CacheResult<bool> {
        let slots = self.slots.read().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        Ok(slots.get(key).is_some_and(|s| s.is_live(now)))
    }

    /// Number of live keys.
    pub fn len(&self) -> CacheResult<usize> {
        let slots = self.slots.read().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        Ok(slots.values().filter(|s| s.is_live(now)).count())
    }

    /// Whether the backend holds no live keys.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of keys held in the map, expired or not.
    pub fn resident_len(&self) -> CacheResult<usize> {
        let slots = self.slots.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(slots.len())
    }

    /// Drop expired slots. Expired slots are already invisible to reads;
    /// this only reclaims memory.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        purge(&self.slots)
    }

    /// Spawn a task that calls [`purge_expired`](Self::purge_expired) every
    /// `every`. The task holds a weak handle and exits once the backend is
    /// dropped.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let slots = Arc::downgrade(&self.slots);
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + every, every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(slots) = slots.upgrade() else {
                    break;
                };
                match purge(&slots) {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Swept expired cache keys"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Cache sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}

fn purge(slots: &Slots) -> CacheResult<usize> {
    let mut slots = slots.write().map_err(|_| CacheError::LockPoisoned)?;
    let now = Instant::now();
    let before = slots.len();
    slots.retain(|_, s| s.is_live(now));
    Ok(before - slots.len())
}

fn live_entry<'a>(
    slots: &'a HashMap<String, Slot>,
    key: &str,
    now: Instant,
) -> Option<&'a CacheEntry> {
    match slots.get(key) {
        Some(slot) if slot.is_live(now) => match &slot.value {
            Value::Entry(entry) => Some(entry),
            Value::Plain(_) => None,
        },
        _ => None,
    }
}

#[async_trait]
impl EntryBackend for MemoryBackend {
    async fn read(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let slots = self.slots.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(live_entry(&slots, key, Instant::now()).cloned())
    }

    async fn write(&self, key: &str, write: EntryWrite<'_>) -> CacheResult<WriteOutcome> {
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();

        let current = live_entry(&slots, key, now);
        if let Some(expected) = write.expected_etag {
            let current_etag = current.map(|e| e.etag.as_str());
            if current_etag != Some(expected) {
                return Ok(WriteOutcome::Conflict {
                    current_etag: current_etag.unwrap_or_default().to_string(),
                });
            }
        }

        let version = current.map_or(0, |e| e.version) + 1;
        slots.insert(
            key.to_string(),
            Slot {
                value: Value::Entry(CacheEntry {
                    data: write.data.to_vec(),
                    etag: write.etag.to_string(),
                    written_at_millis: write.written_at_millis,
                    version,
                }),
                expires_at: Some(now + write.ttl),
            },
        );

        Ok(WriteOutcome::Written { version })
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        Ok(slots.remove(key).is_some_and(|s| s.is_live(now)))
    }

    async fn remove_matching(&self, pattern: &str, _batch_size: usize) -> CacheResult<u64> {
        let matcher = glob_to_regex(pattern).map_err(|e| CacheError::Backend {
            reason: format!("invalid pattern {pattern:?}: {e}"),
        })?;

        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        let mut removed = 0u64;
        slots.retain(|key, slot| {
            if matcher.is_match(key) {
                if slot.is_live(now) {
                    removed += 1;
                }
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        if slots.get(key).is_some_and(|s| s.is_live(now)) {
            return Ok(false);
        }
        slots.insert(
            key.to_string(),
            Slot {
                value: Value::Plain(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn remove_if_equals(&self, key: &str, value: &str) -> CacheResult<bool> {
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        let owned = matches!(
            slots.get(key),
            Some(Slot { value: Value::Plain(v), expires_at }) if v == value
                && expires_at.map_or(true, |at| now < at)
        );
        if owned {
            slots.remove(key);
        }
        Ok(owned)
    }
}
