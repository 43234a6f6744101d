//! Cache fingerprints: stable lookup strings derived from entity keys.
//!
//! # Format
//!
//! `scope '|' segment { '/' segment }` with segments ordered root to
//! leaf, each segment `kind ':' designator`. The designator is
//! `'#' id` for numeric ids, `'=' name` for string names, or `'~'`
//! when the key is incomplete. Occurrences of `\`, `/`, `:` and `|`
//! inside scope, kind, or name are escaped with a leading `\`, so the
//! encoding stays losslessly decodable, and therefore injective, for
//! any field contents.

use lamina_core::EntityKey;

const ESCAPE: char = '\\';
const SCOPE_SEP: char = '|';
const SEGMENT_SEP: char = '/';
const KIND_SEP: char = ':';

/// Derive the cache lookup key for `key`.
///
/// Pure and deterministic: equal keys always produce equal strings,
/// and distinct valid keys never collide because every field of the
/// full ancestor chain survives the encoding losslessly.
///
/// Callers are expected to validate first; the fingerprint of an
/// incomplete key is deterministic but never corresponds to a stored
/// cache entry.
pub fn fingerprint(key: &EntityKey) -> String {
    let mut out = String::new();
    escape_into(key.scope(), &mut out);
    out.push(SCOPE_SEP);
    encode_chain(key, &mut out);
    out
}

fn encode_chain(key: &EntityKey, out: &mut String) {
    if let Some(parent) = key.parent() {
        encode_chain(parent, out);
        out.push(SEGMENT_SEP);
    }
    escape_into(key.kind(), out);
    out.push(KIND_SEP);
    match (key.name(), key.id()) {
        (Some(name), _) => {
            out.push('=');
            escape_into(name, out);
        }
        (None, Some(id)) => {
            out.push('#');
            out.push_str(&id.to_string());
        }
        (None, None) => out.push('~'),
    }
}

fn escape_into(field: &str, out: &mut String) {
    for ch in field.chars() {
        if matches!(ch, ESCAPE | SCOPE_SEP | SEGMENT_SEP | KIND_SEP) {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let key = EntityKey::named("app", "account", "ada").child_numeric("item", 42);
        assert_eq!(fingerprint(&key), fingerprint(&key.clone()));
    }

    #[test]
    fn test_fingerprint_format() {
        let key = EntityKey::named("app", "account", "ada").child_numeric("item", 42);
        assert_eq!(fingerprint(&key), "app|account:=ada/item:#42");

        let incomplete = EntityKey::incomplete("app", "item");
        assert_eq!(fingerprint(&incomplete), "app|item:~");
    }

    #[test]
    fn test_name_and_id_designators_never_collide() {
        let named = EntityKey::named("app", "item", "7");
        let numeric = EntityKey::numeric("app", "item", 7);
        assert_ne!(fingerprint(&named), fingerprint(&numeric));
    }

    #[test]
    fn test_chain_does_not_collide_with_flat_key() {
        let chained = EntityKey::named("app", "account", "a").child_named("item", "b");
        let flat = EntityKey::named("app", "account", "a/item:=b");
        assert_ne!(fingerprint(&chained), fingerprint(&flat));
    }

    #[test]
    fn test_scope_separator_is_escaped() {
        let sneaky = EntityKey::named("ap|p", "item", "x");
        let plain = EntityKey::named("ap", "p", "item:=x");
        assert_ne!(fingerprint(&sneaky), fingerprint(&plain));
        assert!(fingerprint(&sneaky).starts_with("ap\\|p|"));
    }

    #[test]
    fn test_different_scopes_differ() {
        let a = EntityKey::numeric("app-a", "item", 1);
        let b = EntityKey::numeric("app-b", "item", 1);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// Field contents deliberately include every delimiter and escape
    /// character so the escaping is what injectivity rests on.
    fn field_strategy() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-z0-9/:|\\\\=#~]{1,8}").expect("valid regex")
    }

    fn designator_strategy() -> impl Strategy<Value = (Option<String>, Option<i64>)> {
        prop_oneof![
            field_strategy().prop_map(|name| (Some(name), None)),
            (1i64..1_000_000).prop_map(|id| (None, Some(id))),
        ]
    }

    /// Complete, single-scope key chains up to three levels deep; these
    /// are exactly the keys that are valid to cache.
    fn key_strategy() -> impl Strategy<Value = EntityKey> {
        let root = (field_strategy(), field_strategy(), designator_strategy()).prop_map(
            |(scope, kind, (name, id))| EntityKey::new(scope, kind, name, id, None),
        );
        root.prop_recursive(3, 6, 1, |parent| {
            (parent, field_strategy(), designator_strategy()).prop_map(
                |(parent, kind, (name, id))| {
                    EntityKey::new(parent.scope().to_string(), kind, name, id, Some(parent))
                },
            )
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Equal keys always fingerprint identically.
        #[test]
        fn prop_fingerprint_deterministic(key in key_strategy()) {
            prop_assert_eq!(fingerprint(&key), fingerprint(&key.clone()));
        }

        /// Distinct keys never share a fingerprint.
        #[test]
        fn prop_fingerprint_injective(a in key_strategy(), b in key_strategy()) {
            if a == b {
                prop_assert_eq!(fingerprint(&a), fingerprint(&b));
            } else {
                prop_assert_ne!(
                    fingerprint(&a),
                    fingerprint(&b),
                    "different keys must have different fingerprints"
                );
            }
        }

        /// The scope always survives as the fingerprint prefix.
        #[test]
        fn prop_scope_is_prefix(key in key_strategy()) {
            let mut prefix = String::new();
            for ch in key.scope().chars() {
                if matches!(ch, '\\' | '|' | '/' | ':') {
                    prefix.push('\\');
                }
                prefix.push(ch);
            }
            prefix.push('|');
            prop_assert!(fingerprint(&key).starts_with(&prefix));
        }
    }
}
