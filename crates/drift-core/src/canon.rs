//! Canonical JSON for fingerprint payloads.
//!
//! Two payloads that differ only in object key order must hash the same, so
//! keys are ordered recursively before serializing. Array order is data and
//! is kept.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Compact JSON with every object's keys in byte order.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    // A Value always serializes
    serde_json::to_vec(&canonicalize(value)).unwrap_or_default()
}

/// A copy of `value` whose objects iterate in key order at every depth.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<&str, Value> = map
                .iter()
                .map(|(key, nested)| (key.as_str(), canonicalize(nested)))
                .collect();
            let mut out = Map::with_capacity(ordered.len());
            for (key, nested) in ordered {
                out.insert(key.to_string(), nested);
            }
            Value::Object(out)
        }
        Value::Array(items) => items.iter().map(canonicalize).collect(),
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(value: &Value) -> String {
        String::from_utf8(canonical_json_bytes(value)).unwrap()
    }

    #[test]
    fn glob_payload_is_ordered() {
        let data = json!({"matches": [{"size": 0, "path": "ivy.xml"}], "glob": "ivy.xml"});
        assert_eq!(canonical(&data), r#"{"glob":"ivy.xml","matches":[{"path":"ivy.xml","size":0}]}"#);
    }

    #[test]
    fn tag_order_is_significant() {
        assert_ne!(
            canonical(&json!({"tags": ["ivy", "maven"]})),
            canonical(&json!({"tags": ["maven", "ivy"]}))
        );
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(canonical(&json!("3.4.5")), r#""3.4.5""#);
        assert_eq!(canonical(&Value::Null), "null");
    }
}
