//! Result normalization: content blocks back into plain values.
//!
//! # Singleton unwrap
//!
//! [`normalize`] returns the decoded value itself when a result holds exactly
//! one block, and an array otherwise. The *shape* of the return value therefore
//! depends on how many blocks the tool produced at runtime: a search tool that
//! finds one hit yields an object, two hits yield an array of objects, zero
//! hits yield an empty array. Callers that need a uniform shape should use
//! [`decode_blocks`] instead.

use crate::error::McpError;
use serde_json::Value;
use toolpipe_types::{ContentBlock, ToolOutput};

/// Decode `text` as JSON, falling back to the (trimmed) text itself.
///
/// Never fails. Note that a plain-text result that happens to be valid JSON
/// (`"42"`, `"true"`, `"null"`) comes back as the JSON value, not a string.
pub fn decode_if_json(text: &str) -> Value {
    let trimmed = text.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Decode each block: text through [`decode_if_json`], other kinds as their
/// raw JSON object.
pub fn decode_blocks(content: Vec<ContentBlock>) -> Vec<Value> {
    content
        .into_iter()
        .map(|block| match block {
            ContentBlock::Text { text } => decode_if_json(&text),
            ContentBlock::Opaque(value) => value,
        })
        .collect()
}

/// Decode a content sequence, unwrapping a single block.
pub fn normalize(content: Vec<ContentBlock>) -> Value {
    let mut decoded = decode_blocks(content);
    if decoded.len() == 1 {
        decoded.remove(0)
    } else {
        Value::Array(decoded)
    }
}

/// Turn a tool result into the caller-facing value.
///
/// Results flagged `isError` become [`McpError::HandlerFailure`] carrying the
/// joined text of the blocks.
pub fn into_result(tool: &str, output: ToolOutput) -> Result<Value, McpError> {
    if output.is_error {
        let message = output
            .content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n");
        return Err(McpError::HandlerFailure {
            tool: tool.to_string(),
            message,
        });
    }
    Ok(normalize(output.content))
}
