//! Canonical JSON encoding used for persisted files and stable hashing.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use ::serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ErrorInfo, SceError};

fn serde_error(code: &str, err: impl ToString) -> SceError {
    SceError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut ordered = BTreeMap::new();
            for (key, val) in map {
                ordered.insert(key, canonicalize(val));
            }
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => {
            let canonical_values = values.into_iter().map(canonicalize).collect();
            Value::Array(canonical_values)
        }
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic ordering.
///
/// `serde_json` emits the shortest decimal representation that round-trips
/// each `f64` exactly, so encodings of trajectories are lossless.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, SceError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-encode", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical).map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}

/// Restores a value from canonical JSON bytes.
pub fn from_json_slice<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, SceError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json-read", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_sorted_recursively() {
        let value = serde_json::json!({"b": 1, "a": {"z": [2, {"y": 3, "x": 4}], "w": 5}});
        let bytes = to_canonical_json_bytes(&value).expect("encode");
        assert_eq!(
            String::from_utf8(bytes).expect("utf8"),
            r#"{"a":{"w":5,"z":[2,{"x":4,"y":3}]},"b":1}"#
        );
    }

    #[test]
    fn floats_round_trip_exactly() {
        let value = vec![0.1, 1.0e-300, f64::MAX];
        let bytes = to_canonical_json_bytes(&value).expect("encode");
        let decoded: Vec<f64> = from_json_slice(&bytes).expect("decode");
        assert_eq!(value, decoded);
    }
}
