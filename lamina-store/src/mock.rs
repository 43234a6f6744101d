//! In-memory mock collaborators for testing.
//!
//! [`MemoryStore`] and [`MemoryCache`] implement the collaborator
//! traits over process-local maps, close enough to the real services
//! for the coordinator's behavior to be exercised end to end: the
//! store completes incomplete keys and reports not-found per position,
//! the cache expires entries by TTL and tracks hit/miss statistics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lamina_core::{CacheError, CacheResult, EntityKey, StoreError, StoreResult};

use crate::codec;
use crate::traits::{CacheBackend, CacheStats, Entity, EntityStore};

fn store_poisoned() -> StoreError {
    StoreError::Backend {
        reason: "store lock poisoned".to_string(),
    }
}

fn cache_poisoned() -> CacheError {
    CacheError::Backend {
        reason: "cache lock poisoned".to_string(),
    }
}

/// In-memory persistent-store mock.
///
/// Entities are held as encoded bytes keyed by their completed key.
/// Incomplete keys are completed from a process-local id sequence, the
/// way the real store assigns ids on insert. Deletes are blind:
/// removing an absent entity is not an error. A call counter lets
/// tests assert which operations reached the store at all.
#[derive(Debug)]
pub struct MemoryStore {
    entities: RwLock<HashMap<EntityKey, Vec<u8>>>,
    next_id: AtomicI64,
    calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of trait calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of entities currently stored.
    pub fn len(&self) -> usize {
        self.entities.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn get_one<T: Entity>(&self, key: &EntityKey) -> StoreResult<T> {
        if !key.is_valid() || !key.is_complete() {
            return Err(StoreError::InvalidKey);
        }
        let entities = self.entities.read().map_err(|_| store_poisoned())?;
        let bytes = entities
            .get(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        codec::decode(bytes).map_err(|err| StoreError::Backend {
            reason: err.to_string(),
        })
    }

    fn put_one<T: Entity>(&self, key: &EntityKey, record: &T) -> StoreResult<EntityKey> {
        if !key.is_valid() {
            return Err(StoreError::InvalidKey);
        }
        let completed = if key.is_complete() {
            key.clone()
        } else {
            key.with_id(self.next_id.fetch_add(1, Ordering::Relaxed))
        };
        let bytes = codec::encode(record).map_err(|err| StoreError::Backend {
            reason: err.to_string(),
        })?;
        self.entities
            .write()
            .map_err(|_| store_poisoned())?
            .insert(completed.clone(), bytes);
        Ok(completed)
    }

    fn delete_one(&self, key: &EntityKey) -> StoreResult<()> {
        if !key.is_valid() || !key.is_complete() {
            return Err(StoreError::InvalidKey);
        }
        self.entities
            .write()
            .map_err(|_| store_poisoned())?
            .remove(key);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get<T: Entity>(&self, key: &EntityKey) -> StoreResult<T> {
        self.record_call();
        self.get_one(key)
    }

    async fn get_multi<T: Entity>(
        &self,
        keys: &[EntityKey],
    ) -> StoreResult<Vec<StoreResult<T>>> {
        self.record_call();
        Ok(keys.iter().map(|key| self.get_one(key)).collect())
    }

    async fn put<T: Entity>(&self, key: &EntityKey, record: &T) -> StoreResult<EntityKey> {
        self.record_call();
        self.put_one(key, record)
    }

    async fn put_multi<T: Entity>(
        &self,
        keys: &[EntityKey],
        records: &[T],
    ) -> StoreResult<Vec<StoreResult<EntityKey>>> {
        self.record_call();
        if keys.len() != records.len() {
            return Err(StoreError::LengthMismatch {
                keys: keys.len(),
                records: records.len(),
            });
        }
        Ok(keys
            .iter()
            .zip(records)
            .map(|(key, record)| self.put_one(key, record))
            .collect())
    }

    async fn delete(&self, key: &EntityKey) -> StoreResult<()> {
        self.record_call();
        self.delete_one(key)
    }

    async fn delete_multi(&self, keys: &[EntityKey]) -> StoreResult<Vec<StoreResult<()>>> {
        self.record_call();
        Ok(keys.iter().map(|key| self.delete_one(key)).collect())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory cache mock with TTL expiry and hit/miss statistics.
///
/// Provides exactly the contract the coordinator relies on: last write
/// wins, entries may disappear (here, by expiring), and lookups of
/// absent or expired entries are misses rather than errors.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    stats: RwLock<CacheStats>,
    calls: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Snapshot of the hit/miss statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// Whether a live (unexpired) entry exists for `key`. Does not
    /// count as a hit or miss.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.get(key).is_some_and(Self::live))
            .unwrap_or(false)
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_lookup(&self, hit: bool) {
        if let Ok(mut stats) = self.stats.write() {
            if hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
    }

    fn sync_entry_count(&self, count: usize) {
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = count as u64;
        }
    }

    fn live(entry: &CacheEntry) -> bool {
        entry.expires_at.map_or(true, |at| Utc::now() < at)
    }

    fn expires_at(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        let delta = chrono::Duration::from_std(ttl?).ok()?;
        Utc::now().checked_add_signed(delta)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.record_call();
        let entries = self.entries.read().map_err(|_| cache_poisoned())?;
        match entries.get(key).filter(|entry| Self::live(entry)) {
            Some(entry) => {
                self.record_lookup(true);
                Ok(Some(entry.bytes.clone()))
            }
            None => {
                self.record_lookup(false);
                Ok(None)
            }
        }
    }

    async fn get_multi(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>> {
        self.record_call();
        let entries = self.entries.read().map_err(|_| cache_poisoned())?;
        let mut found = HashMap::new();
        for key in keys {
            match entries.get(key).filter(|entry| Self::live(entry)) {
                Some(entry) => {
                    self.record_lookup(true);
                    found.insert(key.clone(), entry.bytes.clone());
                }
                None => self.record_lookup(false),
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.record_call();
        let entry = CacheEntry {
            bytes: value,
            expires_at: Self::expires_at(ttl),
        };
        let mut entries = self.entries.write().map_err(|_| cache_poisoned())?;
        entries.insert(key.to_string(), entry);
        let count = entries.len();
        drop(entries);
        self.sync_entry_count(count);
        Ok(())
    }

    async fn set_multi(
        &self,
        batch: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        self.record_call();
        let expires_at = Self::expires_at(ttl);
        let mut entries = self.entries.write().map_err(|_| cache_poisoned())?;
        for (key, bytes) in batch {
            entries.insert(key, CacheEntry { bytes, expires_at });
        }
        let count = entries.len();
        drop(entries);
        self.sync_entry_count(count);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.record_call();
        let mut entries = self.entries.write().map_err(|_| cache_poisoned())?;
        entries.remove(key);
        let count = entries.len();
        drop(entries);
        self.sync_entry_count(count);
        Ok(())
    }

    async fn delete_multi(&self, keys: &[String]) -> CacheResult<()> {
        self.record_call();
        let mut entries = self.entries.write().map_err(|_| cache_poisoned())?;
        for key in keys {
            entries.remove(key);
        }
        let count = entries.len();
        drop(entries);
        self.sync_entry_count(count);
        Ok(())
    }
}
