//! Error types for the tool bridge.

use thiserror::Error;

use crate::session::SessionState;

/// Errors from talking to a tool-host process.
///
/// Variants fall into two tiers. Protocol failures ([`McpError::is_session_fatal`])
/// end the session they occurred on. Tool failures are contained to one call and
/// leave the session usable.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn tool host '{name}': {source}")]
    SpawnFailed {
        name: String,
        source: std::io::Error,
    },

    #[error("Channel to tool host closed")]
    ChannelClosed,

    #[error("Handshake with tool host failed: {0}")]
    HandshakeFailed(String),

    #[error("Malformed frame from tool host: {0}")]
    Decode(String),

    #[error("Session is not ready (state: {state:?})")]
    NotReady { state: SessionState },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool '{tool}' failed: {message}")]
    HandlerFailure { tool: String, message: String },

    #[error("JSON-RPC error (code {code}): {message}")]
    JsonRpc { code: i64, message: String },

    #[error("Tool host call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Whether this error ends the session it was raised on.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ToolNotFound { .. }
                | Self::InvalidArguments { .. }
                | Self::HandlerFailure { .. }
                | Self::JsonRpc { .. }
                | Self::NotReady { .. }
        )
    }
}
