//! Tool-host side of the stdio bridge.
//!
//! [`serve`] reads JSON-RPC frames from `reader`, dispatches `tools/call`
//! requests to a [`ToolRegistry`], and writes responses to `writer`. Each call
//! runs on its own task; a single writer task owns the output stream, so
//! responses leave whole but in completion order.

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use toolpipe_mcp::McpError;
use toolpipe_mcp::jsonrpc::{IncomingMessage, JsonRpcError, OutgoingResponse, codes};
use toolpipe_mcp::session::PROTOCOL_VERSION;
use toolpipe_mcp::transport::{FrameReader, FrameWriter};
use toolpipe_tools::ToolRegistry;
use toolpipe_types::ToolError;

pub const SERVER_NAME: &str = "toolpipe-server";

/// Responses buffered between call tasks and the writer.
const OUTBOX_CAPACITY: usize = 64;

#[derive(Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Serve the registry over a framed stream until `reader` reaches EOF.
///
/// Calls still running at EOF are allowed to finish and their responses are
/// written before this returns.
pub async fn serve<R, W>(registry: Arc<ToolRegistry>, reader: R, writer: W) -> Result<(), McpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<OutgoingResponse>(OUTBOX_CAPACITY);
    let writer_task = tokio::spawn(write_loop(FrameWriter::new(writer), rx));

    let mut reader = FrameReader::new(reader);
    let mut calls = JoinSet::new();
    let mut initialized = false;

    loop {
        let frame = match reader.receive().await {
            Ok(frame) => frame,
            Err(McpError::ChannelClosed) => break,
            Err(e) => {
                tracing::warn!("Unreadable frame: {e}");
                let _ = tx.send(parse_error(e.to_string())).await;
                continue;
            }
        };

        // Reap finished calls so the set does not grow without bound
        while calls.try_join_next().is_some() {}

        let message = match classify(&frame) {
            Ok(message) => message,
            Err(response) => {
                let _ = tx.send(response).await;
                continue;
            }
        };

        tracing::debug!("<- {} (id {:?})", message.method, message.id);
        let Some(id) = message.id.clone() else {
            handle_notification(&message);
            continue;
        };

        let response = match message.method.as_str() {
            "initialize" => {
                initialized = true;
                OutgoingResponse::success(id, initialize_result())
            }
            "ping" => OutgoingResponse::success(id, json!({})),
            "tools/list" | "tools/call" if !initialized => OutgoingResponse::failure(
                id,
                JsonRpcError::new(codes::NOT_INITIALIZED, "Server not initialized"),
            ),
            "tools/list" => {
                OutgoingResponse::success(id, json!({"tools": registry.definitions()}))
            }
            "tools/call" => match call_params(message.params) {
                Ok(params) => {
                    let registry = Arc::clone(&registry);
                    let tx = tx.clone();
                    calls.spawn(async move {
                        let response = call_tool(&registry, id, params).await;
                        let _ = tx.send(response).await;
                    });
                    continue;
                }
                Err(error) => OutgoingResponse::failure(id, error),
            },
            other => OutgoingResponse::failure(
                id,
                JsonRpcError::new(codes::METHOD_NOT_FOUND, format!("Method not found: {other}")),
            ),
        };

        if tx.send(response).await.is_err() {
            tracing::warn!("Output closed, stopping");
            break;
        }
    }

    tracing::debug!("Input closed, waiting for {} in-flight calls", calls.len());
    while let Some(joined) = calls.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Call task failed: {e}");
        }
    }

    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Writer task failed: {e}");
            Ok(())
        }
    }
}

async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::Receiver<OutgoingResponse>,
) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        writer.send(&response).await?;
    }
    let _ = writer.shutdown().await;
    Ok(())
}

/// Decode a frame into a request or notification, or the error response to
/// send in its place.
fn classify(frame: &str) -> Result<IncomingMessage, OutgoingResponse> {
    let value: Value = serde_json::from_str(frame).map_err(|e| parse_error(e.to_string()))?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let invalid = |message: &str| {
        OutgoingResponse::failure(
            id.clone(),
            JsonRpcError::new(codes::INVALID_REQUEST, message),
        )
    };

    if !value.is_object() {
        return Err(invalid("Request must be a JSON object"));
    }
    if !value.get("method").is_some_and(Value::is_string) {
        return Err(invalid("Request is missing a string `method`"));
    }

    serde_json::from_value(value).map_err(|e| invalid(&e.to_string()))
}

fn parse_error(detail: String) -> OutgoingResponse {
    OutgoingResponse::failure(
        Value::Null,
        JsonRpcError::new(codes::PARSE_ERROR, "Parse error").with_data(json!(detail)),
    )
}

fn handle_notification(message: &IncomingMessage) {
    match message.method.as_str() {
        "notifications/initialized" => tracing::info!("Client completed handshake"),
        other => tracing::debug!("Ignoring notification {other}"),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
    })
}

fn call_params(params: Option<Value>) -> Result<CallParams, JsonRpcError> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(codes::INVALID_PARAMS, format!("Invalid tools/call params: {e}")))
}

async fn call_tool(registry: &ToolRegistry, id: Value, params: CallParams) -> OutgoingResponse {
    let name = params.name;
    match registry.dispatch(&name, params.arguments).await {
        Ok(output) => match serde_json::to_value(&output) {
            Ok(result) => OutgoingResponse::success(id, result),
            Err(e) => OutgoingResponse::failure(
                id,
                JsonRpcError::new(codes::INTERNAL_ERROR, format!("Failed to encode result: {e}")),
            ),
        },
        Err(e) => {
            tracing::debug!("Call to '{name}' rejected: {e}");
            let code = match &e {
                ToolError::UnknownTool { .. } => codes::TOOL_NOT_FOUND,
                ToolError::InvalidInput { .. } => codes::INVALID_PARAMS,
                _ => codes::INTERNAL_ERROR,
            };
            OutgoingResponse::failure(id, JsonRpcError::new(code, e.to_string()))
        }
    }
}
