//! Stdio JSON-RPC bridge between a caller and a tool-host process.
//!
//! ```text
//! ToolClient (blocking) ─▶ ProcessSupervisor ─▶ Session ─▶ FrameWriter ─▶ host stdin
//!                                                  ▲
//!                  normalize ◀── pending[id] ◀── FrameReader ◀── host stdout
//! ```
//!
//! The host is spawned as a child process, its stderr diverted to a log file.
//! Messages are newline-delimited JSON-RPC 2.0 following the MCP method names
//! (`initialize`, `tools/list`, `tools/call`).

pub mod config;
pub mod error;
pub mod facade;
pub mod jsonrpc;
pub mod normalize;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use config::ServerEndpoint;
pub use error::McpError;
pub use facade::ToolClient;
pub use normalize::{decode_if_json, normalize};
pub use session::{Session, SessionState};
pub use supervisor::{ProcessSupervisor, ToolHost};
