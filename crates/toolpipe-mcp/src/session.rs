//! Session: one handshake-established channel to a tool host.
//!
//! A session owns a background reader task that routes every response frame to
//! the caller waiting on its id, and a writer task that serializes outbound
//! frames in submission order. Any number of calls may be outstanding at once.
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initializing ──ack──▶ Ready ──close/EOF──▶ Closed
//! ```
//!
//! When the session closes, every outstanding call resolves with
//! [`McpError::ChannelClosed`], or with [`McpError::Decode`] if the host sent
//! a frame that could not be parsed.

use crate::error::McpError;
use crate::jsonrpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, codes};
use crate::normalize;
use crate::transport::{FrameReader, FrameWriter};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use toolpipe_types::{ToolDefinition, ToolOutput};

/// Protocol version we speak.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Identity reported by the tool host during the handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// The host's answer to `initialize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub server_info: ServerInfo,
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ToolDefinition>,
}

type PendingMap = HashMap<u64, oneshot::Sender<JsonRpcResponse>>;

struct Shared {
    state: SessionState,
    pending: PendingMap,
    /// Set when the inbound stream was closed on an unparseable frame.
    decode_failure: Option<String>,
}

impl Shared {
    /// The error a call sees once the session is closed.
    fn closed_error(&self) -> McpError {
        match &self.decode_failure {
            Some(message) => McpError::Decode(message.clone()),
            None => McpError::ChannelClosed,
        }
    }
}

/// Holds a call's slot in the pending map; dropping it frees the slot.
///
/// A caller that gives up (timeout, cancellation) drops the request future,
/// so the entry cannot outlive it.
struct PendingSlot<'a> {
    shared: &'a Mutex<Shared>,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        lock(self.shared).pending.remove(&self.id);
    }
}

struct Inner {
    label: String,
    next_id: AtomicU64,
    shared: Arc<Mutex<Shared>>,
    write_tx: Mutex<Option<mpsc::Sender<String>>>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

/// A cheaply cloneable handle to one live session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Move the session to `Closed` and fail every outstanding call.
///
/// Dropping the pending senders wakes each waiter with a receive error. Only
/// the first reason counts; a decode failure is kept so waiters can report it.
fn close_shared(shared: &Mutex<Shared>, label: &str, reason: &McpError) {
    let mut shared = lock(shared);
    if shared.state == SessionState::Closed {
        return;
    }
    let stranded = shared.pending.len();
    shared.state = SessionState::Closed;
    if let McpError::Decode(message) = reason {
        shared.decode_failure = Some(message.clone());
    }
    shared.pending.clear();
    drop(shared);

    match reason {
        McpError::ChannelClosed => {
            tracing::debug!("Session '{label}' closed ({stranded} pending calls failed)")
        }
        other => tracing::error!(
            "Session '{label}' closed on {other} ({stranded} pending calls failed)"
        ),
    }
}

impl Session {
    /// Start a session over an arbitrary byte stream pair.
    ///
    /// Must be called from within a tokio runtime. The session starts in
    /// [`SessionState::Uninitialized`]; call [`Session::initialize`] before
    /// issuing tool calls.
    pub fn start<R, W>(label: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let label = label.into();
        let shared = Arc::new(Mutex::new(Shared {
            state: SessionState::Uninitialized,
            pending: HashMap::new(),
            decode_failure: None,
        }));

        // Writer task: drains the queue so frames leave in submission order
        let (write_tx, mut write_rx) = mpsc::channel::<String>(64);
        let shared_for_writer = Arc::clone(&shared);
        let label_for_writer = label.clone();
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(writer);
            while let Some(frame) = write_rx.recv().await {
                if let Err(e) = writer.write_frame(&frame).await {
                    close_shared(&shared_for_writer, &label_for_writer, &e);
                    return;
                }
            }
            let _ = writer.shutdown().await;
        });

        // Reader task: routes responses to their waiting callers by id
        let shared_for_reader = Arc::clone(&shared);
        let label_for_reader = label.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(reader);
            let reason = loop {
                match reader.receive_message::<JsonRpcResponse>().await {
                    Ok(message) => route(&shared_for_reader, &label_for_reader, message),
                    Err(e) => break e,
                }
            };
            close_shared(&shared_for_reader, &label_for_reader, &reason);
        });

        Self {
            inner: Arc::new(Inner {
                label,
                next_id: AtomicU64::new(1),
                shared,
                write_tx: Mutex::new(Some(write_tx)),
                reader_handle,
                writer_handle,
            }),
        }
    }

    /// Name used in log lines.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.shared).state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Number of calls awaiting a response.
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.shared).pending.len()
    }

    /// Perform the handshake: `initialize`, then `notifications/initialized`.
    ///
    /// Only valid from [`SessionState::Uninitialized`]. Any failure closes the
    /// session and is reported as [`McpError::HandshakeFailed`].
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        {
            let mut shared = lock(&self.inner.shared);
            match shared.state {
                SessionState::Uninitialized => shared.state = SessionState::Initializing,
                SessionState::Closed => {
                    return Err(McpError::HandshakeFailed(
                        "channel closed before handshake".to_string(),
                    ));
                }
                state => return Err(McpError::NotReady { state }),
            }
        }

        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "toolpipe",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let handshake = async {
            let result = self.request("initialize", Some(params)).await?;
            let info: InitializeResult = serde_json::from_value(result)
                .map_err(|e| McpError::Decode(format!("initialize result: {e}")))?;
            self.notify("notifications/initialized", None).await?;
            Ok::<_, McpError>(info)
        };

        let info = match handshake.await {
            Ok(info) => info,
            Err(e) => {
                let failure = McpError::HandshakeFailed(e.to_string());
                close_shared(&self.inner.shared, &self.inner.label, &failure);
                return Err(failure);
            }
        };

        {
            let mut shared = lock(&self.inner.shared);
            if shared.state != SessionState::Initializing {
                return Err(McpError::HandshakeFailed(
                    "channel closed during handshake".to_string(),
                ));
            }
            shared.state = SessionState::Ready;
        }

        tracing::info!(
            "Session '{}' ready (host: {} {}, protocol {})",
            self.inner.label,
            info.server_info.name,
            info.server_info.version,
            info.protocol_version
        );
        Ok(info)
    }

    /// Discover the host's tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        self.ensure_ready()?;
        let result = self.request("tools/list", None).await?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Decode(format!("tools/list result: {e}")))?;
        Ok(list.tools)
    }

    /// Invoke a tool and return its raw content blocks.
    ///
    /// A result flagged `isError` is returned as-is; see [`Session::call`] for
    /// the normalized form.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, McpError> {
        self.ensure_ready()?;
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let result = self
            .request("tools/call", Some(params))
            .await
            .map_err(|e| match e {
                McpError::JsonRpc { code, message } => tool_error(name, code, message),
                other => other,
            })?;

        serde_json::from_value(result)
            .map_err(|e| McpError::Decode(format!("tools/call result: {e}")))
    }

    /// Invoke a tool and normalize its content into a plain value.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let output = self.call_tool(name, arguments).await?;
        normalize::into_result(name, output)
    }

    /// Check the host is alive.
    pub async fn ping(&self) -> Result<(), McpError> {
        self.ensure_ready()?;
        self.request("ping", None).await.map(|_| ())
    }

    /// Shut the session down from the caller's side.
    ///
    /// Outstanding calls fail with [`McpError::ChannelClosed`]. Frames already
    /// queued are still flushed before the outbound stream is closed.
    pub async fn close(&self) {
        close_shared(&self.inner.shared, &self.inner.label, &McpError::ChannelClosed);
        let sender = self
            .inner
            .write_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
        self.inner.reader_handle.abort();
    }

    fn ensure_ready(&self) -> Result<(), McpError> {
        let shared = lock(&self.inner.shared);
        match shared.state {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(shared.closed_error()),
            state => Err(McpError::NotReady { state }),
        }
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        let _slot = {
            let mut shared = lock(&self.inner.shared);
            if shared.state == SessionState::Closed {
                return Err(shared.closed_error());
            }
            shared.pending.insert(id, tx);
            PendingSlot {
                shared: &self.inner.shared,
                id,
            }
        };

        self.enqueue(frame).await?;
        tracing::debug!("Session '{}' sent {method} (id {id})", self.inner.label);

        let response = rx
            .await
            .map_err(|_| lock(&self.inner.shared).closed_error())?;
        match response.error {
            Some(JsonRpcError { code, message, .. }) => Err(McpError::JsonRpc { code, message }),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let frame = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.enqueue(frame).await
    }

    async fn enqueue(&self, frame: String) -> Result<(), McpError> {
        let sender = self
            .inner
            .write_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(McpError::ChannelClosed)?;
        sender
            .send(frame)
            .await
            .map_err(|_| McpError::ChannelClosed)
    }
}

/// Deliver one inbound message to the call waiting on its id.
fn route(shared: &Mutex<Shared>, label: &str, message: JsonRpcResponse) {
    if let Some(method) = &message.method {
        tracing::debug!("Session '{label}' ignoring host-initiated '{method}'");
        return;
    }
    let Some(id) = message.id else {
        match &message.error {
            Some(err) => tracing::warn!(
                "Session '{label}' got an error without id (code {}): {}",
                err.code,
                err.message
            ),
            None => tracing::warn!("Session '{label}' got a response without id"),
        }
        return;
    };

    let waiter = lock(shared).pending.remove(&id);
    match waiter {
        Some(tx) => {
            // The caller may have given up (timeout, drop); nothing to do then
            let _ = tx.send(message);
        }
        None => tracing::warn!("Session '{label}' got a response for unknown id {id}"),
    }
}

/// Map a JSON-RPC error on `tools/call` to its per-call error kind.
fn tool_error(tool: &str, code: i64, message: String) -> McpError {
    match code {
        codes::TOOL_NOT_FOUND => McpError::ToolNotFound {
            name: tool.to_string(),
        },
        codes::INVALID_PARAMS => McpError::InvalidArguments {
            tool: tool.to_string(),
            message,
        },
        _ => McpError::JsonRpc { code, message },
    }
}
