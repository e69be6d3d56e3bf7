//! Error hierarchy shared by the tool host and its callers.

use thiserror::Error;

/// Errors from tool registration and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidInput { tool: String, message: String },

    #[error("Tool '{name}' is already registered")]
    DuplicateTool { name: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display() {
        let err = ToolError::InvalidInput {
            tool: "calc".into(),
            message: "missing field `expression`".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for tool 'calc': missing field `expression`"
        );

        let err = ToolError::DuplicateTool {
            name: "calc".into(),
        };
        assert!(err.to_string().contains("already registered"));
    }
}
