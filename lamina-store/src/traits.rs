//! Collaborator traits: the persistent store, the volatile cache, and
//! the marker trait for storable record types.
//!
//! Both collaborators are external services. The store is the source
//! of truth and its errors always surface; the cache is an optimization
//! whose errors the coordinator discards. Neither trait is implemented
//! by the coordinator itself, which only orchestrates the two.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use lamina_core::{CacheResult, ElementBinding, EntityKey, PropertyList, StoreResult};
use serde::{de::DeserializeOwned, Serialize};

/// Marker trait for record types that can move through the caching
/// layer.
///
/// # Implementation Requirements
///
/// - `BINDING` must be the shape tag the data-binding layer reports for
///   this element type; multi-item operations use it to pick, or
///   refuse, a per-element decode strategy before any network call.
/// - Implementations must be `Clone`, `Serialize`, and
///   `DeserializeOwned` so values round-trip through the cache codec,
///   and `Send + Sync + 'static` for async use.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Shape tag for batches of this element type.
    const BINDING: ElementBinding;
}

// ============================================================================
// BINDINGS FOR REFERENCE AND PROPERTY-LIST ELEMENTS
// ============================================================================

/// References to records are themselves storable. A referenced plain
/// struct becomes a struct-reference element; every other category
/// (load/save capability included) is carried through unchanged, so a
/// boxed property list stays as unsupported for batches as a bare one.
impl<T: Entity> Entity for Box<T> {
    const BINDING: ElementBinding = match T::BINDING {
        ElementBinding::Struct | ElementBinding::StructRef => ElementBinding::StructRef,
        other => other,
    };
}

/// Bare property lists can be stored and fetched singly, but they are
/// not a supported batch element shape and multi-item operations refuse
/// them.
impl Entity for PropertyList {
    const BINDING: ElementBinding = ElementBinding::PropertyList;
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// The persistent entity store.
///
/// Authoritative for all reads, writes, and deletes. Multi-item methods
/// return one outcome per input key, in key order; the outer `Err` on
/// any method is a uniform whole-batch failure and is propagated to
/// callers verbatim.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one record. An absent entity is
    /// [`StoreError::NotFound`](lamina_core::StoreError::NotFound); an
    /// incomplete key is invalid for fetching.
    async fn get<T: Entity>(&self, key: &EntityKey) -> StoreResult<T>;

    /// Batched fetch, one logical request for the whole sequence.
    async fn get_multi<T: Entity>(&self, keys: &[EntityKey])
        -> StoreResult<Vec<StoreResult<T>>>;

    /// Write one record. An incomplete key is completed by the store;
    /// the returned key is the authoritative address of the entity.
    async fn put<T: Entity>(&self, key: &EntityKey, record: &T) -> StoreResult<EntityKey>;

    /// Batched write, one logical request for the whole sequence.
    async fn put_multi<T: Entity>(
        &self,
        keys: &[EntityKey],
        records: &[T],
    ) -> StoreResult<Vec<StoreResult<EntityKey>>>;

    /// Delete one record. Deleting an absent entity is not an error.
    async fn delete(&self, key: &EntityKey) -> StoreResult<()>;

    /// Batched delete, one logical request for the whole sequence.
    async fn delete_multi(&self, keys: &[EntityKey]) -> StoreResult<Vec<StoreResult<()>>>;
}

/// The volatile cache service.
///
/// Entries are opaque bytes under string keys. The only guarantee the
/// coordinator relies on is "last write wins, entries may silently
/// disappear"; expiry and eviction are entirely the backend's business.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up one entry. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Batched lookup. Absent keys are simply missing from the result
    /// map, not errors.
    async fn get_multi(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>>;

    /// Store one entry, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Store several entries in one request.
    async fn set_multi(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> CacheResult<()>;

    /// Drop one entry. Dropping an absent entry is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Drop several entries in one request.
    async fn delete_multi(&self, keys: &[String]) -> CacheResult<()>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in the cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
