//! Blocking facade for callers outside of async code.
//!
//! Each call spawns a fresh tool host, performs the handshake, runs one
//! request, and tears the host down before returning. Nothing is shared between
//! calls.

use crate::config::ServerEndpoint;
use crate::error::McpError;
use crate::supervisor::ProcessSupervisor;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use toolpipe_types::ToolDefinition;

/// Synchronous client for a tool host.
pub struct ToolClient {
    supervisor: ProcessSupervisor,
}

impl ToolClient {
    pub fn new(endpoint: ServerEndpoint) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(endpoint),
        }
    }

    /// Bound the handshake and request of each call by `timeout`. Spawning
    /// the host is not counted.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Self::new(self.supervisor.endpoint().clone().with_timeout_ms(millis))
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        self.supervisor.endpoint()
    }

    /// Number of tool-host processes currently alive. Zero between calls.
    pub fn live_processes(&self) -> usize {
        self.supervisor.live_processes()
    }

    /// Call `name` with `arguments` and return the normalized result.
    ///
    /// A result made of exactly one content block comes back as that block's
    /// decoded value; any other count comes back as an array. See
    /// [`crate::normalize`].
    pub fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        tracing::debug!("Calling tool '{name}'");
        self.block_on(
            self.supervisor
                .run(|session| async move { session.call(name, arguments).await }),
        )
    }

    /// List the tools the host exposes.
    pub fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        self.block_on(
            self.supervisor
                .run(|session| async move { session.list_tools().await }),
        )
    }

    /// Drive `fut` to completion on a private current-thread runtime.
    ///
    /// From inside an existing runtime, blocking its worker would stall the
    /// tasks sharing it, and nesting `block_on` panics, so the cycle runs on a
    /// scoped helper thread instead.
    fn block_on<F, T>(&self, fut: F) -> Result<T, McpError>
    where
        F: Future<Output = Result<T, McpError>> + Send,
        T: Send,
    {
        let drive = move || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(McpError::from)?
                .block_on(fut)
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return drive();
        }

        std::thread::scope(|scope| match scope.spawn(drive).join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    /// Answers the handshake, then answers every call with two text blocks.
    const TWO_BLOCK_HOST: &str = r#"
read line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"sh","version":"0"}}}'
read line
read line
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"x"},{"type":"text","text":"y"}],"isError":false}}'
while read line; do :; done
"#;

    fn sh(script: &str) -> ServerEndpoint {
        ServerEndpoint::new("sh").with_arg("-c").with_arg(script)
    }

    #[test]
    fn call_tool_blocks_until_host_is_gone() {
        let client = ToolClient::new(sh(TWO_BLOCK_HOST));
        let value = client.call_tool("pair", json!({})).unwrap();
        assert_eq!(value, json!(["x", "y"]));
        assert_eq!(client.live_processes(), 0);
    }

    #[test]
    fn repeated_calls_spawn_fresh_hosts() {
        let client = ToolClient::new(sh(TWO_BLOCK_HOST));
        for _ in 0..3 {
            assert_eq!(client.call_tool("pair", json!({})).unwrap(), json!(["x", "y"]));
        }
        assert_eq!(client.live_processes(), 0);
    }

    #[tokio::test]
    async fn usable_from_inside_a_runtime() {
        let client = ToolClient::new(sh(TWO_BLOCK_HOST));
        let background = tokio::spawn(async { 7 });
        let value = client.call_tool("pair", json!({})).unwrap();
        assert_eq!(value, json!(["x", "y"]));
        assert_eq!(background.await.unwrap(), 7);
    }

    #[test]
    fn timeout_reclaims_host() {
        let client = ToolClient::new(sh("cat > /dev/null")).with_timeout(Duration::from_millis(150));
        let err = client.call_tool("anything", json!({})).unwrap_err();
        assert!(matches!(err, McpError::Timeout { timeout_ms: 150 }));
        assert_eq!(client.live_processes(), 0);
    }

    #[test]
    fn missing_host_is_a_spawn_failure() {
        let client = ToolClient::new(ServerEndpoint::new("this_command_does_not_exist_xyz123"));
        assert!(matches!(
            client.list_tools(),
            Err(McpError::SpawnFailed { .. })
        ));
    }
}
