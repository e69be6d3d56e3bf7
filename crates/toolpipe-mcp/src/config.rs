//! How to start the tool-host process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default tool-host executable.
pub const DEFAULT_SERVER_COMMAND: &str = "toolpipe-server";

fn default_timeout() -> u64 {
    30000
}

/// Identifies the tool-host executable and how to launch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Command to run (e.g., "toolpipe-server", "python").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the host process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// File receiving the host's stderr. Discarded when unset.
    #[serde(default)]
    pub stderr_log: Option<PathBuf>,
    /// Maximum time for one full call cycle in milliseconds (default: 30000).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for ServerEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_COMMAND)
    }
}

impl ServerEndpoint {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            stderr_log: None,
            timeout_ms: default_timeout(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_stderr_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_log = Some(path.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_endpoint() {
        let endpoint: ServerEndpoint = toml::from_str(r#"command = "python""#).unwrap();
        assert_eq!(endpoint.command, "python");
        assert!(endpoint.args.is_empty());
        assert!(endpoint.stderr_log.is_none());
        assert_eq!(endpoint.timeout_ms, 30000); // default
    }

    #[test]
    fn parse_full_endpoint() {
        let toml_str = r#"
command = "python"
args = ["tool_host.py"]
env = { PYTHONUNBUFFERED = "1" }
stderr_log = "/tmp/tool-host.log"
timeout_ms = 5000
"#;
        let endpoint: ServerEndpoint = toml::from_str(toml_str).unwrap();
        assert_eq!(endpoint.args, vec!["tool_host.py"]);
        assert_eq!(endpoint.env["PYTHONUNBUFFERED"], "1");
        assert_eq!(
            endpoint.stderr_log.as_deref(),
            Some(std::path::Path::new("/tmp/tool-host.log"))
        );
        assert_eq!(endpoint.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn builder_sets_fields() {
        let endpoint = ServerEndpoint::new("sh")
            .with_arg("-c")
            .with_arg("cat")
            .with_env("LANG", "C")
            .with_timeout_ms(100);
        assert_eq!(endpoint.args, vec!["-c", "cat"]);
        assert_eq!(endpoint.env["LANG"], "C");
        assert_eq!(endpoint.timeout_ms, 100);
    }

    #[test]
    fn default_endpoint_runs_bundled_host() {
        assert_eq!(ServerEndpoint::default().command, DEFAULT_SERVER_COMMAND);
    }
}
