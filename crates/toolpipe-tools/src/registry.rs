//! Tool registry for name-based dispatch.

use crate::schema;
use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use toolpipe_types::{Tool, ToolDefinition, ToolError, ToolOutput};

/// Registry of available tools, supporting name-based dispatch.
///
/// Built once at startup and read-only afterwards, so it can be shared across
/// concurrent dispatches behind an `Arc` without locking.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with all built-in tools.
    pub fn with_builtins() -> Result<Self, ToolError> {
        let mut registry = Self::new();
        registry.register(Arc::new(super::WebSearchTool::new()?))?;
        registry.register(Arc::new(super::FetchUrlTool::new()?))?;
        registry.register(Arc::new(super::CalcTool))?;
        Ok(registry)
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate `input`, run the named tool, and encode its result.
    ///
    /// Unknown names and schema mismatches are returned as `Err`. Anything
    /// that goes wrong inside the handler, panics included, is reported as
    /// error content instead.
    pub async fn dispatch(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;

        let definition = tool.definition();
        let input = schema::validate(&definition.input_schema, input).map_err(|message| {
            ToolError::InvalidInput {
                tool: name.to_string(),
                message,
            }
        })?;

        match AssertUnwindSafe(tool.execute(input)).catch_unwind().await {
            Ok(Ok(value)) => Ok(ToolOutput::from_value(value)),
            Ok(Err(e @ ToolError::InvalidInput { .. })) => Err(e),
            Ok(Err(e)) => {
                tracing::warn!("Tool '{name}' failed: {e}");
                Ok(ToolOutput::error(format!("Error executing tool {name}: {e}")))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!("Tool '{name}' panicked: {message}");
                Ok(ToolOutput::error(format!(
                    "Error executing tool {name}: {message}"
                )))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;

    /// Returns its `value` argument unchanged, or misbehaves on request.
    struct EchoTool {
        name: &'static str,
    }

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: "Echo the value back".to_string(),
                input_schema: json!({
                    "type": "object",
                    "required": ["value"],
                    "properties": {
                        "value": {},
                        "mode": {"type": "string", "default": "ok"}
                    }
                }),
            }
        }

        fn execute(
            &self,
            input: Value,
        ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
            Box::pin(async move {
                match input["mode"].as_str() {
                    Some("fail") => Err(ToolError::ExecutionFailed("asked to fail".into())),
                    Some("panic") => panic!("asked to panic"),
                    _ => Ok(input["value"].clone()),
                }
            })
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "echo" })).unwrap();
        registry
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = registry();
        let err = registry
            .register(Arc::new(EchoTool { name: "echo" }))
            .unwrap_err();
        assert!(matches!(err, ToolError::DuplicateTool { name } if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn has_tool_matches_exact_names() {
        let registry = registry();
        assert!(registry.has_tool("echo"));
        assert!(!registry.has_tool("Echo"));
        assert!(!registry.has_tool("calc"));
    }

    #[test]
    fn builtins_are_sorted_by_name() {
        let registry = ToolRegistry::with_builtins().unwrap();
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["calc", "fetch_url", "web_search"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let err = registry().dispatch("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { name } if name == "nope"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid_input() {
        let err = registry().dispatch("echo", json!({})).await.unwrap_err();
        match err {
            ToolError::InvalidInput { tool, message } => {
                assert_eq!(tool, "echo");
                assert!(message.contains("value"));
            }
            other => panic!("Expected InvalidInput, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn numeric_expression_reaches_calc_as_text() {
        let registry = ToolRegistry::with_builtins().unwrap();
        let output = registry
            .dispatch("calc", json!({"expression": 7}))
            .await
            .unwrap();
        assert!(!output.is_error);
        let decoded: Value = serde_json::from_str(output.content[0].as_text().unwrap()).unwrap();
        assert_eq!(decoded, json!({"expression": "7", "result": 7}));
    }

    #[tokio::test]
    async fn structured_return_is_one_json_block() {
        let output = registry()
            .dispatch("echo", json!({"value": {"a": 1, "b": [2, 3]}}))
            .await
            .unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content.len(), 1);
        let decoded: Value = serde_json::from_str(output.content[0].as_text().unwrap()).unwrap();
        assert_eq!(decoded, json!({"a": 1, "b": [2, 3]}));
    }

    #[tokio::test]
    async fn list_return_is_one_block_per_item() {
        let output = registry()
            .dispatch("echo", json!({"value": ["x", "y"]}))
            .await
            .unwrap();
        let texts: Vec<&str> = output.content.iter().filter_map(|c| c.as_text()).collect();
        assert_eq!(texts, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn handler_error_becomes_error_content() {
        let output = registry()
            .dispatch("echo", json!({"value": 1, "mode": "fail"}))
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.content[0].as_text().unwrap().contains("asked to fail"));
    }

    #[tokio::test]
    async fn handler_panic_becomes_error_content() {
        let registry = registry();
        let output = registry
            .dispatch("echo", json!({"value": 1, "mode": "panic"}))
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.content[0].as_text().unwrap().contains("asked to panic"));

        // Registry still serves calls afterwards
        let output = registry.dispatch("echo", json!({"value": "ok"})).await.unwrap();
        assert_eq!(output.content[0].as_text(), Some("ok"));
    }
}
