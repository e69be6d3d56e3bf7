//! Tool trait and related types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

use crate::ContentBlock;

/// A tool's public description: name, human text, and argument schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Result of executing a tool, as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The output content blocks.
    pub content: Vec<ContentBlock>,
    /// Whether the tool execution resulted in an error.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolOutput {
    /// Create a successful text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// Create an error text output.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// Convert a handler's return value into content blocks.
    ///
    /// Arrays fan out into one block per element and `null` yields no blocks.
    /// Strings pass through as plain text; anything else is encoded as JSON
    /// text.
    pub fn from_value(value: Value) -> Self {
        let content = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items.into_iter().map(value_to_block).collect(),
            other => vec![value_to_block(other)],
        };
        Self {
            content,
            is_error: false,
        }
    }
}

fn value_to_block(value: Value) -> ContentBlock {
    match value {
        Value::String(text) => ContentBlock::text(text),
        other => ContentBlock::text(other.to_string()),
    }
}

/// Trait that all hosted tools implement.
///
/// A tool receives its arguments as a JSON object that has already been
/// checked against [`Tool::definition`]'s schema, and returns a plain JSON
/// value. Failures returned as `Err` are reported to the caller as error
/// content, never as a protocol failure.
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// The definition advertised through `tools/list`.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with validated JSON arguments.
    fn execute(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, crate::error::ToolError>> + Send + '_>>;
}
