//! Turning command-line `key=value` pairs into a tool's argument object.

use anyhow::{Result, bail};
use serde_json::{Map, Value};
use toolpipe_mcp::decode_if_json;

/// Build the argument object from an optional `--args` JSON object and
/// `key=value` pairs. Pairs win over keys from `--args`.
///
/// Values are decoded the same way tool results are: `max_results=3` sends a
/// number, `query=rust` sends a string.
pub fn build_arguments(json: Option<&str>, pairs: &[String]) -> Result<Value> {
    let mut arguments = match json {
        Some(raw) => match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => map,
            Ok(other) => bail!("--args must be a JSON object, got {other}"),
            Err(e) => bail!("--args is not valid JSON: {e}"),
        },
        None => Map::new(),
    };

    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Expected key=value, got {pair:?}");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Missing argument name in {pair:?}");
        }
        arguments.insert(key.to_string(), decode_if_json(value));
    }

    Ok(Value::Object(arguments))
}
