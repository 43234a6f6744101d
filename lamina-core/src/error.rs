//! Error types for LAMINA operations

use std::fmt;
use thiserror::Error;

use crate::key::EntityKey;

/// Errors surfaced by store-backed operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The key, or one of its ancestors, failed validation.
    #[error("invalid entity key")]
    InvalidKey,

    /// The store holds no entity under this key.
    ///
    /// Only ever reported by the persistent store; a cache miss is not
    /// an error and never produces this variant.
    #[error("no such entity: {key}")]
    NotFound {
        /// The key that had no entity behind it.
        key: EntityKey,
    },

    /// Opaque failure reported by the persistent store.
    #[error("store backend failure: {reason}")]
    Backend { reason: String },

    /// A batch's element type is outside the supported shapes.
    #[error("unsupported batch element type: {type_name}")]
    UnsupportedShape { type_name: String },

    /// Parallel key/record sequences differ in length.
    #[error("length mismatch: {keys} keys against {records} records")]
    LengthMismatch { keys: usize, records: usize },

    /// Mixed per-position outcomes of a batch operation.
    #[error("{0}")]
    Partial(MultiError),
}

/// Result type alias for store-backed operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the volatile cache.
///
/// These never fail a store-backed operation: the coordinator logs and
/// discards them, falling back to the store for reads and doing nothing
/// for writes and deletes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Opaque failure reported by the cache service.
    #[error("cache backend failure: {reason}")]
    Backend { reason: String },

    /// A record could not be encoded, or a cached entry could not be
    /// decoded.
    #[error("cache codec failure: {reason}")]
    Codec { reason: String },
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Positional per-item outcomes of a batch operation.
///
/// Holds one slot per input position, in input order. `None` marks a
/// position that succeeded; `Some` carries that position's error. A
/// uniform whole-batch failure is reported as a plain [`StoreError`]
/// instead, so callers can tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiError {
    slots: Vec<Option<StoreError>>,
}

impl MultiError {
    /// Wrap positional slots in an aggregate.
    pub fn new(slots: Vec<Option<StoreError>>) -> Self {
        Self { slots }
    }

    /// Wrap slots in an aggregate, or `None` when every slot is clean.
    pub fn collect(slots: Vec<Option<StoreError>>) -> Option<Self> {
        if slots.iter().any(Option::is_some) {
            Some(Self { slots })
        } else {
            None
        }
    }

    /// Number of positions, equal to the batch input length.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the aggregate covers zero positions.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Error at `position`, or `None` when that position succeeded or
    /// is out of range.
    pub fn get(&self, position: usize) -> Option<&StoreError> {
        self.slots.get(position).and_then(Option::as_ref)
    }

    /// Number of positions that failed.
    pub fn error_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// All positional slots, in input order.
    pub fn slots(&self) -> &[Option<StoreError>] {
        &self.slots
    }

    /// Consume the aggregate and return its positional slots.
    pub fn into_slots(self) -> Vec<Option<StoreError>> {
        self.slots
    }

    /// Iterate over the per-position errors, successes included.
    pub fn iter(&self) -> impl Iterator<Item = Option<&StoreError>> {
        self.slots.iter().map(Option::as_ref)
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slots.iter().flatten().next() {
            Some(first) => {
                let rest = self.error_count() - 1;
                if rest > 0 {
                    write!(f, "{first} (and {rest} other errors)")
                } else {
                    write!(f, "{first}")
                }
            }
            None => write!(f, "0 errors"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_not_found() {
        let key = EntityKey::named("app", "item", "widget");
        let err = StoreError::NotFound { key };
        let msg = format!("{}", err);
        assert!(msg.contains("no such entity"));
        assert!(msg.contains("widget"));
    }

    #[test]
    fn test_store_error_display_length_mismatch() {
        let err = StoreError::LengthMismatch {
            keys: 3,
            records: 5,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("3 keys"));
        assert!(msg.contains("5 records"));
    }

    #[test]
    fn test_store_error_display_unsupported_shape() {
        let err = StoreError::UnsupportedShape {
            type_name: "PropertyList".to_string(),
        };
        assert!(format!("{}", err).contains("PropertyList"));
    }

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::Backend {
            reason: "connection refused".to_string(),
        };
        assert!(format!("{}", err).contains("connection refused"));

        let err = CacheError::Codec {
            reason: "trailing characters".to_string(),
        };
        assert!(format!("{}", err).contains("trailing characters"));
    }

    #[test]
    fn test_multi_error_collect_all_clean() {
        let slots: Vec<Option<StoreError>> = vec![None, None, None];
        assert!(MultiError::collect(slots).is_none());
    }

    #[test]
    fn test_multi_error_collect_preserves_positions() {
        let slots = vec![
            None,
            Some(StoreError::InvalidKey),
            None,
            Some(StoreError::Backend {
                reason: "timeout".to_string(),
            }),
        ];
        let err = MultiError::collect(slots).expect("two positions failed");

        assert_eq!(err.len(), 4);
        assert_eq!(err.error_count(), 2);
        assert!(err.get(0).is_none());
        assert_eq!(err.get(1), Some(&StoreError::InvalidKey));
        assert!(err.get(2).is_none());
        assert!(matches!(err.get(3), Some(StoreError::Backend { .. })));
        assert!(err.get(4).is_none());
    }

    #[test]
    fn test_multi_error_display_single_failure() {
        let err = MultiError::new(vec![None, Some(StoreError::InvalidKey)]);
        assert_eq!(format!("{}", err), "invalid entity key");
    }

    #[test]
    fn test_multi_error_display_counts_remaining_failures() {
        let err = MultiError::new(vec![
            Some(StoreError::InvalidKey),
            None,
            Some(StoreError::InvalidKey),
            Some(StoreError::InvalidKey),
        ]);
        let msg = format!("{}", err);
        assert!(msg.contains("invalid entity key"));
        assert!(msg.contains("and 2 other errors"));
    }

    #[test]
    fn test_partial_wraps_aggregate() {
        let aggregate = MultiError::new(vec![Some(StoreError::InvalidKey)]);
        let err = StoreError::Partial(aggregate.clone());
        assert_eq!(format!("{}", err), format!("{}", aggregate));
    }
}
