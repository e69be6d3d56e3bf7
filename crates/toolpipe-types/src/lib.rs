//! Shared content, tool, and error types for toolpipe.

pub mod content;
pub mod error;
pub mod tool;

pub use content::ContentBlock;
pub use error::{ConfigError, ToolError};
pub use tool::*;
