//! Polymorphic argument values
//!
//! Argument values are heterogeneous trees of strings, numbers, booleans,
//! maps, and lists, modelled as `serde_json::Value`. This module provides the
//! path walking and canonicalisation helpers the renderer builds on.

use serde_json::Value as JsonValue;

use crate::error::Result;

/// Parse an argument value tree from YAML
pub fn from_yaml(yaml: &str) -> Result<JsonValue> {
    let value: JsonValue = serde_yaml::from_str(yaml)?;
    Ok(value)
}

/// Walk a value tree along path components
///
/// Maps are traversed by key, lists by decimal index. Returns `None` as soon
/// as a component does not resolve.
pub fn walk<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for part in path {
        current = match current {
            JsonValue::Object(map) => map.get(*part)?,
            JsonValue::Array(list) => {
                let index: usize = part.parse().ok()?;
                list.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Render a value in a canonical textual form
///
/// Map keys are emitted in sorted order so two structurally equal values
/// always produce the same string. Used for the stable module-hook ordering.
pub fn canonical_string(value: &JsonValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Number(n) => out.push_str(&n.to_string()),
        JsonValue::String(s) => {
            out.push_str(&serde_json::to_string(s).unwrap_or_default());
        }
        JsonValue::Array(list) => {
            out.push('[');
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_walk_maps_and_lists() {
        let value = json!({
            "hello": {
                "world": {
                    "abc": ["def", "ghi"]
                }
            }
        });

        assert_eq!(
            walk(&value, &["hello", "world", "abc", "1"]),
            Some(&json!("ghi"))
        );
        assert_eq!(walk(&value, &["hello", "world"]), Some(&json!({"abc": ["def", "ghi"]})));
        assert_eq!(walk(&value, &["hello", "missing"]), None);
        assert_eq!(walk(&value, &["hello", "world", "abc", "9"]), None);
        assert_eq!(walk(&value, &["hello", "world", "abc", "x"]), None);
    }

    #[test]
    fn test_walk_scalar_dead_end() {
        let value = json!({"a": 1});
        assert_eq!(walk(&value, &["a", "b"]), None);
    }

    #[test]
    fn test_canonical_string_sorts_keys() {
        let a = from_yaml("b: 1\na: 2\n").unwrap();
        let b = from_yaml("a: 2\nb: 1\n").unwrap();

        assert_eq!(canonical_string(&a), canonical_string(&b));
        assert_eq!(canonical_string(&a), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_canonical_string_nested() {
        let value = json!({"list": [1, {"z": true, "a": null}], "s": "x\"y"});
        assert_eq!(
            canonical_string(&value),
            r#"{"list":[1,{"a":null,"z":true}],"s":"x\"y"}"#
        );
    }
}
