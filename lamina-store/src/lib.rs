//! LAMINA Store - write-through entity caching
//!
//! Coordinates a persistent entity store (the source of truth) with a
//! volatile byte cache (the fast path). Reads prefer the cache and
//! fall back to the store transparently, repopulating the cache on the
//! way out; writes and deletes hit the store first and only touch the
//! cache once the store confirms, so the cache can never run ahead of
//! truth. Batched operations issue single batched requests to each
//! collaborator and aggregate per-position outcomes.
//!
//! Cache failures are never operation failures: the cache is strictly
//! an optimization, and every best-effort cache call is discarded at
//! one explicit, logged point in [`cached`].

pub mod cached;
pub mod codec;
pub mod fingerprint;
pub mod mock;
pub mod traits;

pub use cached::{CacheConfig, CachedStore};
pub use fingerprint::fingerprint;
pub use mock::{MemoryCache, MemoryStore};
pub use traits::{CacheBackend, CacheStats, Entity, EntityStore};

// Re-export the shared data model for downstream convenience.
pub use lamina_core::{
    classify, validate_all, BatchShape, CacheError, CacheResult, ElementBinding, EntityKey,
    LoadSave, MultiError, Property, PropertyError, PropertyList, PropertyValue, StoreError,
    StoreResult,
};
