//! C1 — Canonicalizer.
//!
//! Produces an RFC-8785-equivalent canonical serialization of a JSON
//! value: object keys sorted by code-point order, arrays left in place,
//! numbers in shortest round-trip form, deterministic across calls.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalizeError {
    #[error("value contains a leaf that cannot be canonicalized: {0}")]
    Unsupported(String),
}

/// Canonicalize a JSON value to its RFC 8785 (JCS) byte representation.
///
/// Two values that are structurally equal produce byte-identical output;
/// this is the property exercised in `prop_canonicalize_deterministic`
/// below and relied on by `elephant-content::cid::cid_of`.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonicalizeError> {
    serde_json_canonicalizer::to_vec(value)
        .map_err(|e| CanonicalizeError::Unsupported(e.to_string()))
}

/// Parse then canonicalize in one step, for the common case of a file's
/// raw bytes.
pub fn canonicalize_bytes(raw: &[u8]) -> Result<Vec<u8>, CanonicalizeError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| CanonicalizeError::Unsupported(format!("invalid JSON: {e}")))?;
    canonicalize(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v = json!([3, 1, 2]);
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "[3,1,2]");
    }

    #[test]
    fn nested_objects_sorted_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":1,"z":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn round_trip_is_idempotent() {
        let v = json!({"a": [1, 2, {"c": true, "b": null}]});
        let first = canonicalize(&v).unwrap();
        let reparsed: Value = serde_json::from_slice(&first).unwrap();
        let second = canonicalize(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_canonicalize_deterministic(a in 0i64..1000, b in "[a-z]{1,8}") {
            let v1 = json!({"a": a, "b": b.clone()});
            let v2 = json!({"b": b, "a": a});
            let c1 = canonicalize(&v1).unwrap();
            let c2 = canonicalize(&v2).unwrap();
            prop_assert_eq!(c1, c2);
        }
    }
}
