//! Tag-indexed cache.
//!
//! Values are stored as JSON under string keys. Each `set` also appends the
//! key to the bookkeeping set of every tag it carries; `invalidate_tag`
//! takes that set and deletes every member.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::backend::{CacheBackend, CacheError};
use super::config::CacheConfig;
use super::keys::CacheTag;

#[derive(Clone)]
pub struct CacheIndex {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl CacheIndex {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let Some(payload) = self.backend.get(key).await? else {
            counter!("inkpost_cache_miss_total").increment(1);
            return Ok(None);
        };

        let value = serde_json::from_str(&payload).map_err(CacheError::codec)?;
        counter!("inkpost_cache_hit_total").increment(1);
        Ok(Some(value))
    }

    /// Registers `key` under every tag, then stores `value`. A failed tag
    /// append leaves nothing stored, so a value is never cached unreachable
    /// by invalidation.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        tags: &[CacheTag],
    ) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }

        let payload = serde_json::to_string(value).map_err(CacheError::codec)?;

        let tag_ttl = self.config.tag_ttl_for(ttl);
        for tag in tags {
            self.backend
                .add_to_set(&tag.bookkeeping_key(), key, tag_ttl)
                .await?;
        }
        self.backend.set(key, payload, ttl).await
    }

    /// Deletes every key registered under `tag` and the tag itself.
    /// Returns the number of live values removed.
    ///
    /// A failed delete does not stop the sweep. Members that could not be
    /// deleted are put back under the tag and the first error is returned.
    pub async fn invalidate_tag(&self, tag: &CacheTag) -> Result<usize, CacheError> {
        let set_key = tag.bookkeeping_key();
        let members = self.backend.take_set(&set_key).await?;
        let mut removed = 0;
        let mut failed = Vec::new();
        let mut first_error = None;
        for key in &members {
            match self.backend.delete(key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(error) => {
                    failed.push(key);
                    first_error.get_or_insert(error);
                }
            }
        }

        counter!("inkpost_cache_invalidated_keys_total").increment(removed as u64);
        debug!(
            tag = %tag,
            members = members.len(),
            removed,
            failed = failed.len(),
            "Cache tag invalidated"
        );

        let Some(error) = first_error else {
            return Ok(removed);
        };
        for key in failed {
            if let Err(restore) = self
                .backend
                .add_to_set(&set_key, key, self.config.tag_ttl)
                .await
            {
                warn!(
                    tag = %tag,
                    key = %key,
                    error = %restore,
                    "Could not restore tag member"
                );
            }
        }
        Err(error)
    }

    /// Read-through helper. Cache failures degrade to calling `factory`;
    /// only the factory's own error is returned. Concurrent misses on the
    /// same key each run the factory.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        tags: &[CacheTag],
        factory: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(error) => {
                counter!("inkpost_cache_bypass_total").increment(1);
                warn!(key, error = %error, "Cache read failed; computing value");
            }
        }

        let value = factory().await?;

        if let Err(error) = self.set(key, &value, ttl, tags).await {
            counter!("inkpost_cache_bypass_total").increment(1);
            warn!(key, error = %error, "Cache write failed; serving computed value");
        }
        Ok(value)
    }
}
