//! Argument validation against a tool's JSON schema.
//!
//! Supports the subset tool definitions use: a top-level object with
//! `properties`, `required`, per-property `type` and `default`. Numeric and
//! boolean strings are coerced to their declared type, so `{"max_results": "3"}`
//! is accepted for an `integer` property. The reverse holds for `string`
//! properties: `{"expression": 7}` arrives as `"7"`.

use serde_json::{Map, Number, Value};

/// Check `args` against `schema`, returning the coerced argument object.
pub fn validate(schema: &Value, args: Value) -> Result<Value, String> {
    let mut args = match args {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => return Err(format!("arguments must be a JSON object, got {other}")),
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return match required.iter().find(|name| !args.contains_key(**name)) {
            Some(name) => Err(format!("missing required argument `{name}`")),
            None => Ok(Value::Object(args)),
        };
    };

    for (name, property) in properties {
        let supplied = args.remove(name).filter(|v| !v.is_null());
        let value = match (supplied, property.get("default")) {
            (Some(value), _) => coerce(name, property, value)?,
            (None, Some(default)) => default.clone(),
            (None, None) if required.contains(&name.as_str()) => {
                return Err(format!("missing required argument `{name}`"));
            }
            (None, None) => continue,
        };
        args.insert(name.clone(), value);
    }

    for name in &required {
        if !args.contains_key(*name) {
            return Err(format!("missing required argument `{name}`"));
        }
    }

    Ok(Value::Object(args))
}

fn coerce(name: &str, property: &Value, value: Value) -> Result<Value, String> {
    let Some(expected) = property.get("type").and_then(Value::as_str) else {
        return Ok(value);
    };

    let coerced = match (expected, value) {
        ("string", v @ Value::String(_)) => Some(v),
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("integer", Value::Number(n)) => as_integer(&n),
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        ("number", v @ Value::Number(_)) => Some(v),
        ("number", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        ("boolean", v @ Value::Bool(_)) => Some(v),
        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("array", v @ Value::Array(_)) => Some(v),
        ("object", v @ Value::Object(_)) => Some(v),
        ("string" | "integer" | "number" | "boolean" | "array" | "object", _) => None,
        (_, v) => Some(v),
    };

    coerced.ok_or_else(|| format!("argument `{name}` must be of type {expected}"))
}

fn as_integer(n: &Number) -> Option<Value> {
    if n.is_i64() || n.is_u64() {
        return Some(Value::Number(n.clone()));
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        .then(|| Value::from(f as i64))
}
