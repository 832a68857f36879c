//! Content digests over entity snapshots.
//!
//! The cache key of a materialization is `(signature, digest)`, where the
//! digest covers the semantic snapshot of every entity in the invocation's
//! dependency closure. Two properties matter:
//!
//! - **Key-order insensitive**: snapshots are canonicalised (mapping keys
//!   sorted at every depth, no whitespace) before hashing, so the same content
//!   always produces the same digest no matter how the manifest wrote it.
//! - **Field sensitive**: any changed field of any snapshot changes the
//!   digest.
//!
//! Callers pass snapshots already sorted by entity id; this module does not
//! reorder the sequence.
//!
//! Digests use the same `sha256:<hex>` format as file checksums elsewhere in
//! the crate.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Separator written between canonical snapshots.
const SNAPSHOT_SEPARATOR: &[u8] = b"\n";

/// Render `value` in canonical JSON form.
///
/// Object keys are sorted lexicographically at every depth, there is no
/// insignificant whitespace, numbers use `serde_json`'s shortest round-trip
/// formatting and non-ASCII text is kept as UTF-8 rather than escaped.
///
/// Key order comes from `serde_json::Map` being a `BTreeMap`; the crate must
/// not enable serde_json's `preserve_order` feature.
///
/// ```rust
/// use metricmat::hashing::canonical_json;
/// use serde_json::json;
///
/// let value = json!({"b": [1, {"z": 1, "a": "é"}], "a": null});
/// assert_eq!(canonical_json(&value), r#"{"a":null,"b":[1,{"a":"é","z":1}]}"#);
/// ```
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Digest an ordered sequence of snapshots.
///
/// Returns `sha256:<64 lowercase hex digits>`.
///
/// ```rust
/// use metricmat::hashing::state_digest;
/// use serde_json::json;
///
/// let a = json!({"name": "revenue", "type": "simple"});
/// let b = json!({"type": "simple", "name": "revenue"});
/// assert_eq!(state_digest([&a]), state_digest([&b]));
/// ```
#[must_use]
pub fn state_digest<'a, I>(snapshots: I) -> String
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut hasher = Sha256::new();
    for (i, snapshot) in snapshots.into_iter().enumerate() {
        if i > 0 {
            hasher.update(SNAPSHOT_SEPARATOR);
        }
        hasher.update(canonical_json(snapshot).as_bytes());
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_form_sorts_nested_keys() {
        let a = json!({"name": "orders", "measures": [{"agg": "sum", "name": "amount"}], "config": {"z": 1, "a": 2}});
        let b = json!({"config": {"a": 2, "z": 1}, "measures": [{"name": "amount", "agg": "sum"}], "name": "orders"});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(
            canonical_json(&a),
            r#"{"config":{"a":2,"z":1},"measures":[{"agg":"sum","name":"amount"}],"name":"orders"}"#
        );
    }

    #[test]
    fn test_canonical_form_keeps_non_ascii_and_escapes_quotes() {
        let value = json!({"label": "Umsatz €", "desc": "say \"hi\"\n"});
        assert_eq!(canonical_json(&value), r#"{"desc":"say \"hi\"\n","label":"Umsatz €"}"#);
    }

    #[test]
    fn test_canonical_form_of_parsed_document() {
        let parsed: Value = serde_json::from_str("{ \"z\": [ 1, 2 ],\n  \"a\": { \"y\": true, \"b\": null } }").unwrap();
        assert_eq!(canonical_json(&parsed), r#"{"a":{"b":null,"y":true},"z":[1,2]}"#);
    }

    #[test]
    fn test_canonical_numbers() {
        let value = json!([1, -2, 1.5, 0.1]);
        assert_eq!(canonical_json(&value), "[1,-2,1.5,0.1]");
    }

    #[test]
    fn test_digest_is_stable_across_key_order() {
        let first = [json!({"unique_id": "metric.p.revenue", "filter": null, "label": "Revenue"})];
        let second = [json!({"label": "Revenue", "filter": null, "unique_id": "metric.p.revenue"})];
        assert_eq!(state_digest(&first), state_digest(&second));
    }

    #[test]
    fn test_digest_changes_with_single_field() {
        let before = [json!({"id": "a", "expr": "amount"}), json!({"id": "b", "agg": "sum"})];
        let after = [json!({"id": "a", "expr": "amount"}), json!({"id": "b", "agg": "max"})];
        assert_ne!(state_digest(&before), state_digest(&after));
    }

    #[test]
    fn test_digest_depends_on_sequence_boundaries() {
        let joined = [json!("ab")];
        let split = [json!("a"), json!("b")];
        assert_ne!(state_digest(&joined), state_digest(&split));
    }

    #[test]
    fn test_digest_format() {
        let digest = state_digest(std::iter::empty());
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), 71);
        assert!(digest[7..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
