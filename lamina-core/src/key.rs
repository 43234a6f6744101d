//! Entity keys: hierarchical addresses of records in the persistent store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MultiError, StoreError};

/// Address of one record in the persistent store.
///
/// A key names a `kind` within a `scope` and designates one record by
/// either a string `name` or a numeric `id`. Keys form ancestor chains
/// through `parent`; for a chain to be usable, every ancestor must be
/// complete and share the child's scope.
///
/// A key with neither designator is *incomplete*: the store assigns an
/// id on insert and returns the completed key, which from then on is
/// the authoritative address used for caching. The caching layer never
/// mutates a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    kind: String,
    scope: String,
    name: Option<String>,
    id: Option<i64>,
    parent: Option<Box<EntityKey>>,
}

impl EntityKey {
    /// General constructor.
    ///
    /// Empty names and zero ids are normalized to "unset" so that
    /// incompleteness has exactly one representation. Nothing else is
    /// checked here: the result may be invalid (both designators set,
    /// scope mismatch with the parent, empty kind). Call
    /// [`EntityKey::is_valid`] before using the key against a store.
    pub fn new(
        scope: impl Into<String>,
        kind: impl Into<String>,
        name: Option<String>,
        id: Option<i64>,
        parent: Option<EntityKey>,
    ) -> Self {
        Self {
            kind: kind.into(),
            scope: scope.into(),
            name: name.filter(|name| !name.is_empty()),
            id: id.filter(|&id| id != 0),
            parent: parent.map(Box::new),
        }
    }

    /// Root key designated by a string name.
    pub fn named(
        scope: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(scope, kind, Some(name.into()), None, None)
    }

    /// Root key designated by a numeric id.
    pub fn numeric(scope: impl Into<String>, kind: impl Into<String>, id: i64) -> Self {
        Self::new(scope, kind, None, Some(id), None)
    }

    /// Root key with no designator, to be completed by the store on
    /// insert.
    pub fn incomplete(scope: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new(scope, kind, None, None, None)
    }

    /// Child of this key designated by a string name, inheriting the
    /// scope.
    pub fn child_named(&self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            self.scope.clone(),
            kind,
            Some(name.into()),
            None,
            Some(self.clone()),
        )
    }

    /// Child of this key designated by a numeric id, inheriting the
    /// scope.
    pub fn child_numeric(&self, kind: impl Into<String>, id: i64) -> Self {
        Self::new(self.scope.clone(), kind, None, Some(id), Some(self.clone()))
    }

    /// Incomplete child of this key, inheriting the scope.
    pub fn child_incomplete(&self, kind: impl Into<String>) -> Self {
        Self::new(self.scope.clone(), kind, None, None, Some(self.clone()))
    }

    /// Copy of this key completed with a numeric id.
    ///
    /// Used by stores when assigning an id to an incomplete key on
    /// insert.
    pub fn with_id(&self, id: i64) -> Self {
        let mut key = self.clone();
        key.name = None;
        key.id = Some(id).filter(|&id| id != 0);
        key
    }

    /// The entity kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The scope (application/namespace) the key belongs to.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The string name, when designated by one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The numeric id, when designated by one.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// The parent key, for keys inside an ancestor chain.
    pub fn parent(&self) -> Option<&EntityKey> {
        self.parent.as_deref()
    }

    /// Whether the key carries a definite designator.
    ///
    /// Incomplete keys are only meaningful as input to an insert; the
    /// store completes them and returns the definitive key.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() || self.id.is_some()
    }

    /// Whether this key and its entire ancestor chain are well formed.
    ///
    /// A key is valid when, for itself and every ancestor: the kind
    /// and scope are non-empty, at most one designator is set, any
    /// parent is complete, and any parent shares the same scope. A
    /// root key without a designator is still valid; incompleteness
    /// only invalidates a key used as someone's ancestor.
    pub fn is_valid(&self) -> bool {
        let mut current = self;
        loop {
            if current.kind.is_empty() || current.scope.is_empty() {
                return false;
            }
            if current.name.is_some() && current.id.is_some() {
                return false;
            }
            match current.parent.as_deref() {
                Some(parent) => {
                    if !parent.is_complete() {
                        return false;
                    }
                    if parent.scope != current.scope {
                        return false;
                    }
                    current = parent;
                }
                None => return true,
            }
        }
    }
}

impl fmt::Display for EntityKey {
    /// Renders the ancestor path, e.g. `/account,ada/item,42`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent}")?;
        }
        write!(f, "/{},", self.kind)?;
        match (&self.name, self.id) {
            (Some(name), _) => write!(f, "{name}"),
            (None, Some(id)) => write!(f, "{id}"),
            (None, None) => write!(f, "?"),
        }
    }
}

/// Validate a batch of keys.
///
/// Returns `Ok(())` when every key validates. Otherwise returns a
/// positional [`MultiError`] carrying [`StoreError::InvalidKey`] at
/// each failing position and nothing at the valid ones. The keys are
/// scanned twice so the aggregate is only allocated when something
/// actually failed.
pub fn validate_all(keys: &[EntityKey]) -> Result<(), MultiError> {
    if keys.iter().all(EntityKey::is_valid) {
        return Ok(());
    }
    Err(MultiError::new(
        keys.iter()
            .map(|key| {
                if key.is_valid() {
                    None
                } else {
                    Some(StoreError::InvalidKey)
                }
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_key_is_valid_and_complete() {
        let key = EntityKey::named("app", "item", "widget");
        assert!(key.is_valid());
        assert!(key.is_complete());
        assert_eq!(key.kind(), "item");
        assert_eq!(key.scope(), "app");
        assert_eq!(key.name(), Some("widget"));
        assert_eq!(key.id(), None);
    }

    #[test]
    fn test_numeric_key_is_valid_and_complete() {
        let key = EntityKey::numeric("app", "item", 42);
        assert!(key.is_valid());
        assert!(key.is_complete());
        assert_eq!(key.id(), Some(42));
        assert_eq!(key.name(), None);
    }

    #[test]
    fn test_incomplete_root_key_is_valid() {
        let key = EntityKey::incomplete("app", "item");
        assert!(key.is_valid());
        assert!(!key.is_complete());
    }

    #[test]
    fn test_empty_kind_is_invalid() {
        assert!(!EntityKey::named("app", "", "widget").is_valid());
    }

    #[test]
    fn test_empty_scope_is_invalid() {
        assert!(!EntityKey::named("", "item", "widget").is_valid());
    }

    #[test]
    fn test_both_designators_is_invalid() {
        let key = EntityKey::new("app", "item", Some("widget".to_string()), Some(42), None);
        assert!(key.is_complete());
        assert!(!key.is_valid());
    }

    #[test]
    fn test_designators_are_normalized() {
        let key = EntityKey::new("app", "item", Some(String::new()), Some(0), None);
        assert_eq!(key.name(), None);
        assert_eq!(key.id(), None);
        assert!(!key.is_complete());
    }

    #[test]
    fn test_child_chain_is_valid() {
        let parent = EntityKey::named("app", "account", "ada");
        let child = parent.child_numeric("item", 7);
        assert!(child.is_valid());
        assert_eq!(child.parent(), Some(&parent));
        assert_eq!(child.scope(), "app");
    }

    #[test]
    fn test_incomplete_parent_invalidates_child() {
        let parent = EntityKey::incomplete("app", "account");
        let child = parent.child_named("item", "widget");
        assert!(parent.is_valid());
        assert!(!child.is_valid());
    }

    #[test]
    fn test_parent_scope_mismatch_invalidates_child() {
        let parent = EntityKey::named("other", "account", "ada");
        let child = EntityKey::new(
            "app",
            "item",
            Some("widget".to_string()),
            None,
            Some(parent),
        );
        assert!(!child.is_valid());
    }

    #[test]
    fn test_invalid_grandparent_invalidates_whole_chain() {
        let grandparent = EntityKey::named("app", "", "root");
        let parent = grandparent.child_named("account", "ada");
        let child = parent.child_numeric("item", 7);
        assert!(!child.is_valid());
    }

    #[test]
    fn test_incomplete_child_of_complete_parent_is_valid() {
        let parent = EntityKey::named("app", "account", "ada");
        let child = parent.child_incomplete("item");
        assert!(child.is_valid());
        assert!(!child.is_complete());
    }

    #[test]
    fn test_with_id_completes_key() {
        let key = EntityKey::incomplete("app", "item");
        let completed = key.with_id(9);
        assert!(completed.is_complete());
        assert_eq!(completed.id(), Some(9));
        assert_eq!(completed.kind(), "item");
    }

    #[test]
    fn test_display_renders_ancestor_path() {
        let key = EntityKey::named("app", "account", "ada").child_numeric("item", 42);
        assert_eq!(format!("{}", key), "/account,ada/item,42");

        let incomplete = EntityKey::incomplete("app", "item");
        assert_eq!(format!("{}", incomplete), "/item,?");
    }

    #[test]
    fn test_validate_all_clean() {
        let keys = vec![
            EntityKey::named("app", "item", "a"),
            EntityKey::numeric("app", "item", 1),
            EntityKey::incomplete("app", "item"),
        ];
        assert!(validate_all(&keys).is_ok());
    }

    #[test]
    fn test_validate_all_empty_input() {
        assert!(validate_all(&[]).is_ok());
    }

    #[test]
    fn test_validate_all_marks_failing_positions() {
        let keys = vec![
            EntityKey::named("app", "item", "a"),
            EntityKey::named("app", "", "b"),
            EntityKey::named("app", "item", "c"),
            EntityKey::named("", "item", "d"),
        ];
        let err = validate_all(&keys).expect_err("two keys are invalid");
        assert_eq!(err.len(), 4);
        assert!(err.get(0).is_none());
        assert_eq!(err.get(1), Some(&StoreError::InvalidKey));
        assert!(err.get(2).is_none());
        assert_eq!(err.get(3), Some(&StoreError::InvalidKey));
    }
}
