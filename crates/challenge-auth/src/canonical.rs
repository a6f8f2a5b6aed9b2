//! Challenge payload canonicalisation: JSON object with keys in Unicode
//! code-point order, no whitespace. `serde_json::Map` happens to be
//! `BTreeMap`-backed by default, but that default is a crate-wide
//! feature choice (`preserve_order`) that any dependency in the build
//! can flip — relying on it implicitly would make canonicalisation
//! fragile to unrelated `Cargo.lock` changes. This walks the `Value`
//! tree and rebuilds every object explicitly sorted instead.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    let sorted = sort_value(raw);
    serde_json::to_vec(&sorted)
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted_by_code_point() {
        let value = json!({"z": 1, "a": 2, "m": {"y": 1, "b": 2}});
        let bytes = canonicalize(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"a":2,"m":{"b":2,"y":1},"z":1}"#);
    }

    #[test]
    fn output_has_no_whitespace() {
        let value = json!({"a": [1, 2, 3]});
        let bytes = canonicalize(&value).unwrap();
        assert!(!bytes.contains(&b' '));
        assert!(!bytes.contains(&b'\n'));
    }
}
