//! The cache-store coordinator.
//!
//! Routes reads through the cache with transparent store fallback, and
//! orders writes store-first so the cache never runs ahead of the
//! source of truth. Batched operations issue one cache and at most one
//! store round trip and aggregate per-position outcomes positionally.

use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;

use lamina_core::{
    classify, validate_all, BatchShape, CacheError, EntityKey, MultiError, StoreError, StoreResult,
};
use tracing::{debug, trace};

use crate::codec;
use crate::fingerprint::fingerprint;
use crate::traits::{CacheBackend, Entity, EntityStore};

/// Configuration for the caching layer.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// TTL applied to cache writes. `None` leaves expiry entirely to
    /// the cache service.
    pub entry_ttl: Option<Duration>,
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL applied to cache writes.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }
}

/// All best-effort cache traffic funnels through here: failures are
/// logged and dropped, never surfaced, because the cache is an
/// optimization rather than a source of truth.
fn discard_cache_error<T>(result: Result<T, CacheError>, op: &'static str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            debug!(op, %error, "cache operation dropped");
            None
        }
    }
}

/// Gate a batch on its element shape before any network traffic.
fn check_batch_shape<T: Entity>() -> StoreResult<BatchShape> {
    classify(T::BINDING).ok_or_else(|| StoreError::UnsupportedShape {
        type_name: type_name::<T>().to_string(),
    })
}

/// Write-through cached view of a persistent entity store.
///
/// The store is the authority for every write and delete; the cache is
/// only touched after the store confirms a change. Reads prefer the
/// cache and fall back to the store transparently, repopulating the
/// cache on the way out.
///
/// Concurrent callers against overlapping keys are not coordinated:
/// a racing writer may leave the cache briefly older or newer than the
/// store's current value, corrected on the next store-backed read.
pub struct CachedStore<S, C>
where
    S: EntityStore,
    C: CacheBackend,
{
    store: Arc<S>,
    cache: Arc<C>,
    config: CacheConfig,
}

impl<S, C> CachedStore<S, C>
where
    S: EntityStore,
    C: CacheBackend,
{
    /// Create a new cached store.
    pub fn new(store: Arc<S>, cache: Arc<C>, config: CacheConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Create a new cached store with default configuration.
    pub fn with_defaults(store: Arc<S>, cache: Arc<C>) -> Self {
        Self::new(store, cache, CacheConfig::default())
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the persistent store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the cache backend.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Cache probe for one fingerprint; any backend failure or corrupt
    /// entry reads as a miss and the store copy wins.
    async fn cache_lookup<T: Entity>(&self, fp: &str) -> Option<T> {
        let bytes = discard_cache_error(self.cache.get(fp).await, "cache.get")??;
        discard_cache_error(codec::decode::<T>(&bytes), "cache.decode")
    }

    /// Fetch one record, preferring the cache.
    ///
    /// A cache hit decodes directly. A miss reads the store and
    /// opportunistically repopulates the cache. Store errors, not-found
    /// included, propagate unchanged; a cache miss alone is never an
    /// error.
    pub async fn get<T: Entity>(&self, key: &EntityKey) -> StoreResult<T> {
        if !key.is_valid() {
            return Err(StoreError::InvalidKey);
        }
        let fp = fingerprint(key);
        if let Some(record) = self.cache_lookup::<T>(&fp).await {
            return Ok(record);
        }
        let record: T = self.store.get(key).await?;
        if let Some(bytes) = discard_cache_error(codec::encode(&record), "cache.encode") {
            discard_cache_error(
                self.cache.set(&fp, bytes, self.config.entry_ttl).await,
                "cache.set",
            );
        }
        Ok(record)
    }

    /// Write one record, store first.
    ///
    /// An incomplete key is completed by the store, and the returned
    /// key is the authoritative address — it is also the one cached. A
    /// store failure leaves the cache untouched.
    pub async fn put<T: Entity>(&self, key: &EntityKey, record: &T) -> StoreResult<EntityKey> {
        if !key.is_valid() {
            return Err(StoreError::InvalidKey);
        }
        let final_key = self.store.put(key, record).await?;
        if let Some(bytes) = discard_cache_error(codec::encode(record), "cache.encode") {
            discard_cache_error(
                self.cache
                    .set(&fingerprint(&final_key), bytes, self.config.entry_ttl)
                    .await,
                "cache.set",
            );
        }
        Ok(final_key)
    }

    /// Delete one record, store first.
    ///
    /// The cache entry is only dropped once the store confirms the
    /// delete, so a failed store delete cannot evict a still-valid
    /// entry.
    pub async fn delete(&self, key: &EntityKey) -> StoreResult<()> {
        if !key.is_valid() {
            return Err(StoreError::InvalidKey);
        }
        self.store.delete(key).await?;
        discard_cache_error(self.cache.delete(&fingerprint(key)).await, "cache.delete");
        Ok(())
    }

    /// Batched fetch across `keys`, filling `dst` positionally.
    ///
    /// The cache is consulted with a single batched lookup, then the
    /// remaining positions go to the store in a single batched read.
    /// Invalid keys and per-position store errors are aggregated into
    /// [`StoreError::Partial`] without blocking the other positions,
    /// whose records are still written into `dst`; entries read from
    /// the store are opportunistically written back to the cache.
    pub async fn get_multi<T: Entity>(
        &self,
        keys: &[EntityKey],
        dst: &mut [Option<T>],
    ) -> StoreResult<()> {
        if keys.len() != dst.len() {
            return Err(StoreError::LengthMismatch {
                keys: keys.len(),
                records: dst.len(),
            });
        }
        if keys.is_empty() {
            return Ok(());
        }
        let shape = check_batch_shape::<T>()?;
        trace!(?shape, elements = keys.len(), "batch decode strategy");
        for slot in dst.iter_mut() {
            *slot = None;
        }

        let mut errors: Vec<Option<StoreError>> = match validate_all(keys) {
            Ok(()) => vec![None; keys.len()],
            Err(aggregate) => aggregate.into_slots(),
        };

        // One batched cache probe over the positions still in play.
        let fingerprints: Vec<Option<String>> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| errors[i].is_none().then(|| fingerprint(key)))
            .collect();
        let probe: Vec<String> = fingerprints.iter().flatten().cloned().collect();
        let cached = if probe.is_empty() {
            Default::default()
        } else {
            discard_cache_error(self.cache.get_multi(&probe).await, "cache.get_multi")
                .unwrap_or_default()
        };
        for (i, fp) in fingerprints.iter().enumerate() {
            let Some(fp) = fp else { continue };
            if let Some(bytes) = cached.get(fp) {
                if let Some(record) = discard_cache_error(codec::decode::<T>(bytes), "cache.decode")
                {
                    dst[i] = Some(record);
                }
            }
        }

        // One batched store read for whatever the cache did not cover.
        let pending: Vec<usize> = (0..keys.len())
            .filter(|&i| errors[i].is_none() && dst[i].is_none())
            .collect();
        if !pending.is_empty() {
            let pending_keys: Vec<EntityKey> = pending.iter().map(|&i| keys[i].clone()).collect();
            let results = self.store.get_multi::<T>(&pending_keys).await?;
            if results.len() != pending_keys.len() {
                return Err(StoreError::Backend {
                    reason: format!(
                        "store returned {} results for {} keys",
                        results.len(),
                        pending_keys.len()
                    ),
                });
            }
            let mut refill: Vec<(String, Vec<u8>)> = Vec::new();
            for (j, outcome) in results.into_iter().enumerate() {
                let i = pending[j];
                match outcome {
                    Ok(record) => {
                        if let (Some(fp), Some(bytes)) = (
                            &fingerprints[i],
                            discard_cache_error(codec::encode(&record), "cache.encode"),
                        ) {
                            refill.push((fp.clone(), bytes));
                        }
                        dst[i] = Some(record);
                    }
                    Err(error) => errors[i] = Some(error),
                }
            }
            if !refill.is_empty() {
                discard_cache_error(
                    self.cache.set_multi(refill, self.config.entry_ttl).await,
                    "cache.set_multi",
                );
            }
        }

        match MultiError::collect(errors) {
            None => Ok(()),
            Some(aggregate) => Err(StoreError::Partial(aggregate)),
        }
    }

    /// Batched write across parallel `keys` and `records`.
    ///
    /// The whole sequence goes to the store in one call. Positions the
    /// store confirms are cached under their store-completed keys even
    /// when other positions fail; a mixed outcome surfaces as
    /// [`StoreError::Partial`], and a uniform store failure propagates
    /// unchanged. On full success the completed keys are returned in
    /// input order.
    pub async fn put_multi<T: Entity>(
        &self,
        keys: &[EntityKey],
        records: &[T],
    ) -> StoreResult<Vec<EntityKey>> {
        if keys.len() != records.len() {
            return Err(StoreError::LengthMismatch {
                keys: keys.len(),
                records: records.len(),
            });
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let shape = check_batch_shape::<T>()?;
        trace!(?shape, elements = keys.len(), "batch decode strategy");

        let mut errors: Vec<Option<StoreError>> = match validate_all(keys) {
            Ok(()) => vec![None; keys.len()],
            Err(aggregate) => aggregate.into_slots(),
        };

        let pending: Vec<usize> = (0..keys.len()).filter(|&i| errors[i].is_none()).collect();
        let mut completed: Vec<EntityKey> = Vec::with_capacity(pending.len());
        if !pending.is_empty() {
            let pending_keys: Vec<EntityKey> = pending.iter().map(|&i| keys[i].clone()).collect();
            let pending_records: Vec<T> = pending.iter().map(|&i| records[i].clone()).collect();
            let results = self.store.put_multi(&pending_keys, &pending_records).await?;
            if results.len() != pending_keys.len() {
                return Err(StoreError::Backend {
                    reason: format!(
                        "store returned {} results for {} keys",
                        results.len(),
                        pending_keys.len()
                    ),
                });
            }
            let mut fill: Vec<(String, Vec<u8>)> = Vec::new();
            for (j, outcome) in results.into_iter().enumerate() {
                let i = pending[j];
                match outcome {
                    Ok(final_key) => {
                        if let Some(bytes) =
                            discard_cache_error(codec::encode(&records[i]), "cache.encode")
                        {
                            fill.push((fingerprint(&final_key), bytes));
                        }
                        completed.push(final_key);
                    }
                    Err(error) => errors[i] = Some(error),
                }
            }
            if !fill.is_empty() {
                discard_cache_error(
                    self.cache.set_multi(fill, self.config.entry_ttl).await,
                    "cache.set_multi",
                );
            }
        }

        if let Some(aggregate) = MultiError::collect(errors) {
            return Err(StoreError::Partial(aggregate));
        }
        // No errors means every position was pending and every put
        // succeeded, so `completed` is positionally complete.
        Ok(completed)
    }

    /// Batched delete across `keys`.
    ///
    /// Cache entries are only dropped, in one batched call, for the
    /// positions whose store delete is confirmed. Invalid keys and
    /// per-position store errors are aggregated positionally and never
    /// block deletion of the other positions.
    pub async fn delete_multi(&self, keys: &[EntityKey]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut errors: Vec<Option<StoreError>> = match validate_all(keys) {
            Ok(()) => vec![None; keys.len()],
            Err(aggregate) => aggregate.into_slots(),
        };

        let pending: Vec<usize> = (0..keys.len()).filter(|&i| errors[i].is_none()).collect();
        if !pending.is_empty() {
            let pending_keys: Vec<EntityKey> = pending.iter().map(|&i| keys[i].clone()).collect();
            let results = self.store.delete_multi(&pending_keys).await?;
            if results.len() != pending_keys.len() {
                return Err(StoreError::Backend {
                    reason: format!(
                        "store returned {} results for {} keys",
                        results.len(),
                        pending_keys.len()
                    ),
                });
            }
            let mut confirmed: Vec<String> = Vec::new();
            for (j, outcome) in results.into_iter().enumerate() {
                let i = pending[j];
                match outcome {
                    Ok(()) => confirmed.push(fingerprint(&keys[i])),
                    Err(error) => errors[i] = Some(error),
                }
            }
            if !confirmed.is_empty() {
                discard_cache_error(
                    self.cache.delete_multi(&confirmed).await,
                    "cache.delete_multi",
                );
            }
        }

        match MultiError::collect(errors) {
            None => Ok(()),
            Some(aggregate) => Err(StoreError::Partial(aggregate)),
        }
    }
}

impl<S, C> Clone for CachedStore<S, C>
where
    S: EntityStore,
    C: CacheBackend,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}
