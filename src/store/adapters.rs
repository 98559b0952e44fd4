//! Bounded access to the cache and the store.

use super::error::{StoreError, StoreResult};
use super::{Cache, GateStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bounds for backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound for durable store calls.
    pub store: Duration,
    /// Bound for cache calls.
    pub cache: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_millis(250),
            cache: Duration::from_millis(50),
        }
    }
}

/// A store and a cache, plus the bounds every call through them respects.
#[derive(Clone)]
pub struct Adapters {
    store: Arc<dyn GateStore>,
    cache: Arc<dyn Cache>,
    timeouts: Timeouts,
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl Adapters {
    /// Bundle a store and a cache.
    #[must_use]
    pub fn new(store: Arc<dyn GateStore>, cache: Arc<dyn Cache>, timeouts: Timeouts) -> Self {
        Self {
            store,
            cache,
            timeouts,
        }
    }

    /// The durable store. Wrap calls in [`Adapters::store_call`].
    #[must_use]
    pub fn store(&self) -> &dyn GateStore {
        self.store.as_ref()
    }

    /// The configured bounds.
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Await a store call, abandoning it once the store bound elapses.
    ///
    /// # Errors
    ///
    /// Returns the call's own error, or [`StoreError::Timeout`].
    pub async fn store_call<T, F>(&self, operation: &'static str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        bounded(operation, self.timeouts.store, call).await
    }

    /// Read and decode a cached value.
    ///
    /// Every failure (timeout, backend error, undecodable payload) reads as
    /// a miss so the caller falls through to the store.
    pub async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match bounded("cache_get", self.timeouts.cache, self.cache.get(key)).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                debug!(key, error = %e, "cache read failed, treating as miss");
                return None;
            },
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "cached value could not be decoded");
                None
            },
        }
    }

    /// Populate the cache without making the caller wait.
    ///
    /// The write runs on a detached task. Concurrent fills for the same key
    /// are harmless: the last one wins and every value is an immutable
    /// snapshot of the same source row.
    pub fn cache_fill<T: Serialize>(
        &self,
        key: String,
        value: &T,
        ttl: Option<Duration>,
        tags: &'static [&'static str],
    ) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "value could not be encoded for the cache");
                return;
            },
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(key = %key, "no runtime available, skipping cache fill");
            return;
        };

        let cache = Arc::clone(&self.cache);
        let after = self.timeouts.cache;
        runtime.spawn(async move {
            let write = cache.set_tagged(&key, value, ttl, tags);
            if let Err(e) = bounded("cache_fill", after, write).await {
                debug!(key = %key, error = %e, "detached cache fill failed");
            }
        });
    }

    /// Delete one cache entry and wait for the delete.
    ///
    /// # Errors
    ///
    /// Returns the cache error or a timeout.
    pub async fn cache_evict(&self, key: &str) -> StoreResult<()> {
        bounded("cache_delete", self.timeouts.cache, self.cache.delete(key)).await
    }

    /// Delete every cache entry carrying `tag` and wait for the delete.
    ///
    /// # Errors
    ///
    /// Returns the cache error or a timeout.
    pub async fn cache_evict_tag(&self, tag: &str) -> StoreResult<()> {
        bounded(
            "cache_delete_by_tag",
            self.timeouts.cache,
            self.cache.delete_by_tag(tag),
        )
        .await
    }
}

async fn bounded<T, F>(operation: &'static str, after: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, after }),
    }
}
