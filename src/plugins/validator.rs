//! Argument validation against the JSON-Schema subset used by tool
//! descriptors.
//!
//! The subset covers `type`, `properties` (with `type`, `enum`, `pattern`,
//! `minimum`, `maximum`), and `required`. Validation is pure: it never
//! touches the registry or any handler, and a failure means the handler is
//! not invoked at all. Failures surface to the protocol layer as
//! `-32602 Invalid params`.

use regex::Regex;
use serde_json::Value;

use crate::errors::StewardError;

/// Validates `args` against a tool descriptor's `input_schema`.
///
/// Unknown argument names are accepted (the schema subset has no
/// `additionalProperties` keyword); only declared properties are checked.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), StewardError> {
    let args_obj = match args {
        Value::Object(map) => map,
        Value::Null => {
            // No arguments supplied; only an empty `required` list passes.
            return check_required(schema, &serde_json::Map::new());
        }
        _ => {
            return Err(StewardError::InvalidParams(
                "Tool arguments must be an object".to_string(),
            ));
        }
    };

    check_required(schema, args_obj)?;

    let properties = match schema.get("properties").and_then(Value::as_object) {
        Some(p) => p,
        None => return Ok(()),
    };

    for (name, value) in args_obj {
        let Some(prop) = properties.get(name) else {
            continue;
        };
        check_type(name, prop, value)?;
        check_enum(name, prop, value)?;
        check_pattern(name, prop, value)?;
        check_range(name, prop, value)?;
    }

    Ok(())
}

/// Every name in `required` must appear in the arguments.
fn check_required(
    schema: &Value,
    args: &serde_json::Map<String, Value>,
) -> Result<(), StewardError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(name) {
                return Err(StewardError::InvalidParams(format!(
                    "Missing required parameter: {name}"
                )));
            }
        }
    }
    Ok(())
}

/// Dynamic type must match the declared primitive.
fn check_type(name: &str, prop: &Value, value: &Value) -> Result<(), StewardError> {
    let Some(declared) = prop.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    let matches = match declared {
        "string" => value.is_string(),
        // A whole number; fractional values are rejected even when the
        // JSON representation is a float.
        "integer" => {
            value.as_i64().is_some()
                || value.as_u64().is_some()
                || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    };

    if matches {
        Ok(())
    } else {
        Err(StewardError::InvalidParams(format!(
            "Parameter '{name}' must be of type {declared}"
        )))
    }
}

/// Declared enums restrict the value to membership.
fn check_enum(name: &str, prop: &Value, value: &Value) -> Result<(), StewardError> {
    if let Some(allowed) = prop.get("enum").and_then(Value::as_array)
        && !allowed.contains(value)
    {
        return Err(StewardError::InvalidParams(format!(
            "Parameter '{name}' must be one of {}",
            serde_json::to_string(allowed).unwrap_or_default()
        )));
    }
    Ok(())
}

/// String values must match a declared `pattern` regex.
fn check_pattern(name: &str, prop: &Value, value: &Value) -> Result<(), StewardError> {
    let (Some(pattern), Some(s)) = (prop.get("pattern").and_then(Value::as_str), value.as_str())
    else {
        return Ok(());
    };

    let re = Regex::new(pattern).map_err(|e| {
        StewardError::internal(format!("Invalid pattern in tool schema for '{name}': {e}"))
    })?;

    if re.is_match(s) {
        Ok(())
    } else {
        Err(StewardError::InvalidParams(format!(
            "Parameter '{name}' does not match pattern '{pattern}'"
        )))
    }
}

/// Numeric values must lie within the inclusive `minimum`/`maximum` range.
fn check_range(name: &str, prop: &Value, value: &Value) -> Result<(), StewardError> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };

    if let Some(min) = prop.get("minimum").and_then(Value::as_f64)
        && n < min
    {
        return Err(StewardError::InvalidParams(format!(
            "Parameter '{name}' must be >= {min}"
        )));
    }

    if let Some(max) = prop.get("maximum").and_then(Value::as_f64)
        && n > max
    {
        return Err(StewardError::InvalidParams(format!(
            "Parameter '{name}' must be <= {max}"
        )));
    }

    Ok(())
}
