//! Argument schema validation
//!
//! Each argument declared by a template repository may carry a JSON-Schema
//! fragment. Values coming from the service manifest are validated against
//! that fragment before templates can observe them. Validation failures are
//! reported with a dotted path derived from the schema's absolute keyword
//! location, which keeps error messages in terms of the manifest the user
//! actually wrote.

use serde_json::{json, Value as JsonValue};

use crate::error::{CoreError, Result};

/// Return the type-appropriate zero value for a schema
///
/// Used when the service manifest supplies no value for a declared argument:
/// templates observe `""`, `0`, `false`, `{}`, `[]`, or null rather than a
/// missing-key error.
pub fn zero_value(schema: &JsonValue) -> JsonValue {
    match schema.get("type").and_then(|t| t.as_str()) {
        Some("string") => json!(""),
        Some("number") | Some("integer") => json!(0),
        Some("boolean") => json!(false),
        Some("object") => json!({}),
        Some("array") => json!([]),
        _ => JsonValue::Null,
    }
}

/// Validate an argument value against its declared schema
///
/// `module_uri` is the source URI of the module whose manifest declared the
/// schema; it seeds the absolute keyword location used for error paths.
pub fn validate_argument(
    module_uri: &str,
    name: &str,
    schema: &JsonValue,
    value: &JsonValue,
) -> Result<()> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| CoreError::InvalidSchema {
            name: name.to_string(),
            message: e.to_string(),
        })?;

    let Some(error) = validator.iter_errors(value).next() else {
        return Ok(());
    };

    let location = format!(
        "{}/manifest.yaml/arguments/{}#{}",
        module_uri, name, error.schema_path
    );
    let path = build_error_path(&location)?;

    Err(CoreError::SchemaValidation {
        path,
        message: error.to_string(),
    })
}

/// Derive a human-readable dotted path from an absolute keyword location
///
/// The location has the shape
/// `<uri>/manifest.yaml/arguments/<name>#/<schema pointer>`. Everything up to
/// and including `manifest.yaml` is stripped, the trailing keyword component
/// of the anchor is dropped, and the remaining components are joined with
/// dots. A location without `manifest.yaml` is rejected.
pub fn build_error_path(absolute_keyword_location: &str) -> Result<String> {
    const MANIFEST: &str = "manifest.yaml";

    let index = absolute_keyword_location.find(MANIFEST).ok_or_else(|| {
        CoreError::MissingManifestPrefix {
            location: absolute_keyword_location.to_string(),
        }
    })?;

    let rest = &absolute_keyword_location[index + MANIFEST.len()..];
    let rest = rest.trim_start_matches('/');

    let (path_part, anchor) = match rest.split_once('#') {
        Some((p, a)) => (p, a),
        None => (rest, ""),
    };

    let mut parts: Vec<&str> = path_part.split('/').filter(|s| !s.is_empty()).collect();

    let anchor_parts: Vec<&str> = anchor.split('/').filter(|s| !s.is_empty()).collect();
    if !anchor_parts.is_empty() {
        // the final component is the failing keyword (`type`, `pattern`, ...)
        parts.extend(&anchor_parts[..anchor_parts.len() - 1]);
    }

    Ok(parts.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert_eq!(zero_value(&json!({"type": "string"})), json!(""));
        assert_eq!(zero_value(&json!({"type": "number"})), json!(0));
        assert_eq!(zero_value(&json!({"type": "integer"})), json!(0));
        assert_eq!(zero_value(&json!({"type": "boolean"})), json!(false));
        assert_eq!(zero_value(&json!({"type": "object"})), json!({}));
        assert_eq!(zero_value(&json!({"type": "array"})), json!([]));
        assert_eq!(zero_value(&json!({})), JsonValue::Null);
    }

    #[test]
    fn test_validate_ok() {
        validate_argument(
            "vfs://test",
            "hello",
            &json!({"type": "string"}),
            &json!("world"),
        )
        .unwrap();
    }

    #[test]
    fn test_validate_nested_ok() {
        let schema = json!({
            "type": "object",
            "properties": {
                "world": {
                    "type": "object",
                    "properties": {
                        "abc": {"type": "array"}
                    }
                }
            }
        });
        let value = json!({"world": {"abc": ["def"]}});

        validate_argument("vfs://test", "hello", &schema, &value).unwrap();
    }

    #[test]
    fn test_validate_type_mismatch() {
        let err = validate_argument(
            "vfs://test",
            "hello",
            &json!({"type": "string"}),
            &json!(1),
        )
        .unwrap_err();

        match err {
            CoreError::SchemaValidation { path, .. } => {
                assert_eq!(path, "arguments.hello");
            }
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn test_build_error_path_simple() {
        let path = build_error_path(
            "file:///home/test/acme/stencil/manifest.yaml/arguments/releaseOptions.allowMajorVersions#/type",
        )
        .unwrap();
        assert_eq!(path, "arguments.releaseOptions.allowMajorVersions");
    }

    #[test]
    fn test_build_error_path_complex() {
        let path = build_error_path(
            "file:///Users/test/acme/testapps/orgschemagrpc/manifest.yaml/arguments/postgreSQL#/items/properties/name/pattern",
        )
        .unwrap();
        assert_eq!(path, "arguments.postgreSQL.items.properties.name");
    }

    #[test]
    fn test_build_error_path_missing_manifest() {
        let err = build_error_path(
            "file:///Users/test/acme/testapps/orgschemagrpc/arguments/postgreSQL#/items/properties/name/pattern",
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::MissingManifestPrefix { .. }));
    }
}
