//! Cache storage backends.
//!
//! The trait mirrors the handful of primitives a key/value server offers:
//! plain values with a TTL, plus sets with atomic member addition and an
//! atomic read-and-delete. Tag bookkeeping is built only on the set
//! primitives, so concurrent writers under one tag never lose a member.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;

use super::config::CacheConfig;
use super::lock::mutex_lock;
use crate::util::clock::Clock;

const SOURCE: &str = "cache::backend";
/// Minimum clock time between two sweeps of expired tag sets.
const SET_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache payload codec failure: {0}")]
    Codec(String),
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Adds `member` to the set and pushes its expiry out to at least `ttl`.
    async fn add_to_set(&self, set_key: &str, member: &str, ttl: Duration)
    -> Result<(), CacheError>;

    /// Removes the set and returns its members in one step.
    async fn take_set(&self, set_key: &str) -> Result<Vec<String>, CacheError>;
}

struct StoredValue {
    payload: String,
    expires_at: OffsetDateTime,
}

struct StoredSet {
    members: HashSet<String>,
    expires_at: OffsetDateTime,
}

/// Process-local backend: LRU-bounded values and expiring sets. Expired
/// sets are swept from any call at most once per `SET_SWEEP_INTERVAL`.
pub struct MemoryCacheBackend {
    clock: Arc<dyn Clock>,
    values: Mutex<LruCache<String, StoredValue>>,
    sets: DashMap<String, StoredSet>,
    next_set_sweep: Mutex<OffsetDateTime>,
}

impl MemoryCacheBackend {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            values: Mutex::new(LruCache::new(config.capacity_non_zero())),
            sets: DashMap::new(),
            next_set_sweep: Mutex::new(OffsetDateTime::UNIX_EPOCH),
        }
    }

    /// Number of values currently held, expired or not.
    pub fn len(&self) -> usize {
        mutex_lock(&self.values, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tag sets currently held, expired or not.
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Drops expired sets when the sweep interval has elapsed. Must not be
    /// called while holding a `sets` entry.
    fn sweep_sets(&self, now: OffsetDateTime) {
        {
            let mut next = mutex_lock(&self.next_set_sweep, SOURCE, "sweep_sets");
            if now < *next {
                return;
            }
            *next = now + SET_SWEEP_INTERVAL;
        }
        self.sets.retain(|_, set| set.expires_at > now);
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now();
        self.sweep_sets(now);
        let mut values = mutex_lock(&self.values, SOURCE, "get");
        match values.get(key) {
            None => return Ok(None),
            Some(value) if value.expires_at > now => return Ok(Some(value.payload.clone())),
            Some(_) => {}
        }
        values.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = self.clock.now();
        self.sweep_sets(now);
        let expires_at = now + ttl;
        let evicted = mutex_lock(&self.values, SOURCE, "set").push(
            key.to_string(),
            StoredValue {
                payload: value,
                expires_at,
            },
        );
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!("inkpost_cache_evict_total").increment(1);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = self.clock.now();
        let removed = mutex_lock(&self.values, SOURCE, "delete").pop(key);
        Ok(removed.is_some_and(|value| value.expires_at > now))
    }

    async fn add_to_set(
        &self,
        set_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = self.clock.now();
        self.sweep_sets(now);
        let expires_at = now + ttl;
        let mut set = self
            .sets
            .entry(set_key.to_string())
            .or_insert_with(|| StoredSet {
                members: HashSet::new(),
                expires_at,
            });
        if set.expires_at <= now {
            set.members.clear();
        }
        set.members.insert(member.to_string());
        if set.expires_at < expires_at {
            set.expires_at = expires_at;
        }
        Ok(())
    }

    async fn take_set(&self, set_key: &str) -> Result<Vec<String>, CacheError> {
        let now = self.clock.now();
        self.sweep_sets(now);
        Ok(match self.sets.remove(set_key) {
            Some((_, set)) if set.expires_at > now => set.members.into_iter().collect(),
            _ => Vec::new(),
        })
    }
}
