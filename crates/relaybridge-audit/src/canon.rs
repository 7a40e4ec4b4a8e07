//! Canonical JSON: sorted object keys, no whitespace, UTF-8 — the exact
//! byte sequence that gets hashed into the audit chain. A struct's derived
//! `Serialize` impl fixes field order but says nothing about nested maps, so
//! this walks the `Value` tree and rebuilds every object with a `BTreeMap`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

pub fn canonical_bytes<T: Serialize>(value: &T) -> crate::error::Result<Vec<u8>> {
    let raw = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&sort_keys(raw))?)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted_regardless_of_input_order() {
        let a = canonical_bytes(&json!({"b": 1, "a": 2})).unwrap();
        let b = canonical_bytes(&json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let value = json!({"outer": {"z": 1, "y": {"b": 1, "a": 2}}});
        let bytes = canonical_bytes(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
        assert!(text.find("\"y\"").unwrap() < text.find("\"z\"").unwrap());
    }
}
