//! Argument validation against a tool's declared JSON schema.
//!
//! Covers the subset of JSON Schema that tool declarations use in practice:
//! `type` (including integer vs number), `required`, `properties`, nested
//! objects, `items` for arrays, `enum`, and `additionalProperties: false`.
//! Anything else in the schema is ignored.

use serde_json::{Map, Value};

/// Check `args` against `schema`, returning a human-readable reason on mismatch.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    validate_value(schema, args, "arguments")
}

fn validate_value(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !matches_type(expected, value) {
            return Err(format!(
                "{} must be {} {}, got {}",
                path,
                article(expected),
                expected,
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("{} must be one of {}", path, Value::Array(allowed.clone())));
        }
    }

    match value {
        Value::Object(obj) => validate_object(schema, obj, path),
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_value(item_schema, item, &format!("{}[{}]", path, i))?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_object(schema: &Value, obj: &Map<String, Value>, path: &str) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(key) {
                return Err(format!("missing required field: {}", join(path, key)));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in obj {
        match properties.and_then(|p| p.get(key)) {
            Some(prop_schema) => validate_value(prop_schema, value, &join(path, key))?,
            None if closed => return Err(format!("unexpected field: {}", join(path, key))),
            None => {}
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn article(type_name: &str) -> &'static str {
    match type_name {
        "object" | "array" | "integer" => "an",
        _ => "a",
    }
}

fn join(path: &str, key: &str) -> String {
    if path == "arguments" {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sum_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            },
            "required": ["a", "b"],
            "additionalProperties": false
        })
    }

    #[test]
    fn test_accepts_well_typed_arguments() {
        assert!(validate_arguments(&sum_schema(), &json!({"a": 2, "b": 3})).is_ok());
        assert!(validate_arguments(&sum_schema(), &json!({"a": -2, "b": 0})).is_ok());
    }

    #[test]
    fn test_rejects_non_object() {
        let err = validate_arguments(&sum_schema(), &json!("2 y 3")).unwrap_err();
        assert_eq!(err, "arguments must be an object, got string");
    }

    #[test]
    fn test_rejects_missing_required_field() {
        let err = validate_arguments(&sum_schema(), &json!({"a": 2})).unwrap_err();
        assert_eq!(err, "missing required field: b");
    }

    #[test]
    fn test_integer_rejects_floats_and_strings() {
        let err = validate_arguments(&sum_schema(), &json!({"a": 2.5, "b": 3})).unwrap_err();
        assert_eq!(err, "a must be an integer, got number");

        let err = validate_arguments(&sum_schema(), &json!({"a": "2", "b": 3})).unwrap_err();
        assert_eq!(err, "a must be an integer, got string");
    }

    #[test]
    fn test_closed_object_rejects_extra_fields() {
        let err = validate_arguments(&sum_schema(), &json!({"a": 1, "b": 2, "c": 3})).unwrap_err();
        assert_eq!(err, "unexpected field: c");

        let open = json!({"type": "object", "properties": {"a": {"type": "integer"}}});
        assert!(validate_arguments(&open, &json!({"a": 1, "extra": true})).is_ok());
    }

    #[test]
    fn test_nested_arrays_and_enums() {
        let schema = json!({
            "type": "object",
            "properties": {
                "values": {"type": "array", "items": {"type": "number"}},
                "mode": {"type": "string", "enum": ["fast", "exact"]}
            }
        });
        assert!(validate_arguments(&schema, &json!({"values": [1, 2.5], "mode": "fast"})).is_ok());

        let err = validate_arguments(&schema, &json!({"values": [1, "x"]})).unwrap_err();
        assert_eq!(err, "values[1] must be a number, got string");

        let err = validate_arguments(&schema, &json!({"mode": "slow"})).unwrap_err();
        assert!(err.starts_with("mode must be one of"));
    }
}
