//! Record codec for cache storage.
//!
//! Records cross into the cache as JSON bytes. Anything serde can
//! round-trip qualifies, which covers every record type the store
//! itself can persist. Codec failures are cache-side failures and are
//! discarded at the coordinator's discard point like any other cache
//! error.

use lamina_core::{CacheError, CacheResult};
use serde::{de::DeserializeOwned, Serialize};

/// Encode a record for cache storage.
pub fn encode<T: Serialize>(record: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|err| CacheError::Codec {
        reason: err.to_string(),
    })
}

/// Decode a cached entry back into a record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(bytes).map_err(|err| CacheError::Codec {
        reason: err.to_string(),
    })
}
