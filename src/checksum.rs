//! Canonical JSON rendering and SHA256 digests
//!
//! Exact-duplicate detection keys schemas by the digest of their canonical
//! form: object keys sorted recursively, no insignificant whitespace. Two
//! schemas whose keys were declared in a different order share a digest.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of canonical JSON content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a JSON value (canonicalized, key order ignored)
    pub fn from_json(value: &Value) -> Self {
        Self::from_bytes(canonical_json(value).as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a JSON value matches this checksum
    pub fn verify_json(&self, value: &Value) -> bool {
        Self::from_json(value) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render a JSON value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"d": [1, {"z": true, "y": null}], "c": "x"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"x","d":[1,{"y":null,"z":true}]},"b":1}"#
        );
    }

    #[test]
    fn test_checksum_ignores_key_order() {
        let first = json!({"type": "object", "properties": {"id": {"type": "string"}}});
        let second = json!({"properties": {"id": {"type": "string"}}, "type": "object"});
        assert_eq!(Checksum::from_json(&first), Checksum::from_json(&second));
        assert!(Checksum::from_json(&first).verify_json(&second));
    }

    #[test]
    fn test_checksum_different_content() {
        let first = json!({"type": "string"});
        let second = json!({"type": "integer"});
        assert_ne!(Checksum::from_json(&first), Checksum::from_json(&second));
        assert_eq!(Checksum::from_json(&first).as_str().len(), 64);
    }
}
