//! Argument validation against a tool's JSON Schema (minimal subset).
//!
//! Supports what tool schemas here actually use: `type: object`,
//! `required`, per-property `type` (string, integer, number, boolean,
//! array, object), `enum`, array `items.type`, and
//! `additionalProperties: false`. A `null` value for an optional property
//! is treated as absent.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SchemaError(pub String);

/// Check `args` against `schema`.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), SchemaError> {
    let Some(obj) = args.as_object() else {
        return Err(SchemaError("arguments must be a JSON object".into()));
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for key in &required {
        match obj.get(*key) {
            None | Some(Value::Null) => {
                return Err(SchemaError(format!("missing required field: {key}")));
            }
            Some(_) => {}
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in obj {
        let Some(prop) = properties.and_then(|p| p.get(key)) else {
            if closed {
                return Err(SchemaError(format!("unexpected field: {key}")));
            }
            continue;
        };
        if value.is_null() && !required.contains(&key.as_str()) {
            continue;
        }
        check_value(key, prop, value)?;
    }

    Ok(())
}

fn check_value(key: &str, prop: &Value, value: &Value) -> Result<(), SchemaError> {
    if let Some(ty) = prop.get("type").and_then(Value::as_str) {
        if !type_matches(ty, value) {
            return Err(SchemaError(format!(
                "field '{key}' must be of type {ty}, got {}",
                type_name(value)
            )));
        }
    }

    if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(SchemaError(format!(
                "field '{key}' must be one of {}",
                Value::Array(allowed.clone())
            )));
        }
    }

    if let (Some(items), Some(arr)) = (prop.get("items"), value.as_array()) {
        for (i, item) in arr.iter().enumerate() {
            check_value(&format!("{key}[{i}]"), items, item)?;
        }
    }

    Ok(())
}

fn type_matches(ty: &str, value: &Value) -> bool {
    match ty {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
