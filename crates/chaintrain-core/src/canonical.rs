//! # Canonical Serialization
//!
//! [`CanonicalBytes`] is the construction path for every JSON payload that is
//! hashed or signed: training request payloads, signed intent messages, proof
//! circuit statements, and ledger entries.
//!
//! ## Rules
//!
//! 1. Reject floats: weights travel as integer basis points.
//! 2. Sort object keys lexicographically.
//! 3. Compact separators (no whitespace).

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by canonical JSON serialization.
///
/// The inner `Vec<u8>` is private, so downstream code cannot construct
/// `CanonicalBytes` except through [`CanonicalBytes::new()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Canonicalize an already-built JSON value.
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        let sorted = sort_and_check(value)?;
        Ok(Self(serde_json::to_vec(&sorted)?))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn sort_and_check(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Number(n) => {
            if n.is_f64() {
                return Err(CanonicalizationError::FloatRejected(
                    n.as_f64().unwrap_or(f64::NAN),
                ));
            }
            Ok(Value::Number(n))
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_and_check(v)?);
            }
            Ok(Value::Object(sorted))
        }
        Value::Array(arr) => arr
            .into_iter()
            .map(sort_and_check)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_compact() {
        let c = CanonicalBytes::new(&json!({"b": 1, "a": {"z": true, "y": null}})).unwrap();
        assert_eq!(
            std::str::from_utf8(c.as_bytes()).unwrap(),
            r#"{"a":{"y":null,"z":true},"b":1}"#
        );
    }

    #[test]
    fn floats_are_rejected() {
        let err = CanonicalBytes::new(&json!({"w": 0.5})).unwrap_err();
        assert!(matches!(err, CanonicalizationError::FloatRejected(_)));
    }

    #[test]
    fn nested_floats_in_arrays_are_rejected() {
        assert!(CanonicalBytes::new(&json!({"w": [1, 2, 3.25]})).is_err());
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = CanonicalBytes::new(&json!({"x": 1, "y": 2})).unwrap();
        let b = CanonicalBytes::new(&json!({"y": 2, "x": 1})).unwrap();
        assert_eq!(a, b);
    }
}
