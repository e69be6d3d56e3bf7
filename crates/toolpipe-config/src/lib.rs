//! Multi-tier TOML configuration for toolpipe.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toolpipe_mcp::ServerEndpoint;
use toolpipe_mcp::config::DEFAULT_SERVER_COMMAND;
use toolpipe_types::ConfigError;

/// Environment variable naming the tool-host executable.
pub const ENV_SERVER_COMMAND: &str = "TOOLPIPE_SERVER_COMMAND";
/// Environment variable bounding each call, in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "TOOLPIPE_TIMEOUT_MS";
/// Environment variable overriding the config directory.
pub const ENV_CONFIG_DIR: &str = "TOOLPIPE_CONFIG_DIR";

/// File in the config directory that receives tool-host stderr.
pub const HOST_LOG_FILE: &str = "tool-host.log";

/// Resolved configuration for a toolpipe client.
#[derive(Debug, Clone)]
pub struct ToolpipeConfig {
    pub endpoint: ServerEndpoint,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerSettings,
}

/// `[server]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub stderr_log: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub server_command: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl ToolpipeConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`TOOLPIPE_SERVER_COMMAND`, `TOOLPIPE_TIMEOUT_MS`)
    /// 3. Config file (`<config_dir>/config.toml`, `[server]` section)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml")).unwrap_or_else(|e| {
            tracing::warn!("{e}");
            SettingsFile::default()
        });

        let mut config =
            Self::resolve(overrides, |key| std::env::var(key).ok(), settings, config_dir)?;

        // The default log lives in the config dir, which may not exist yet
        if let Some(log) = &config.endpoint.stderr_log {
            if let Some(parent) = log.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(
                        "Cannot create {} ({e}), discarding tool-host stderr",
                        parent.display()
                    );
                    config.endpoint.stderr_log = None;
                }
            }
        }

        Ok(config)
    }

    /// Apply precedence rules to already-gathered sources.
    pub fn resolve(
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
        settings: SettingsFile,
        config_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        let server = settings.server;

        // Resolve command: CLI > env > config file > default
        let command = overrides
            .server_command
            .or_else(|| env(ENV_SERVER_COMMAND))
            .or(server.command)
            .unwrap_or_else(|| DEFAULT_SERVER_COMMAND.to_string());
        if command.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                key: format!("server.command (set {ENV_SERVER_COMMAND} or --server)"),
            });
        }

        // Resolve timeout: CLI > env > config file > default
        let env_timeout = match env(ENV_TIMEOUT_MS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: ENV_TIMEOUT_MS.into(),
                    message: format!("{raw:?}: {e}"),
                }
            })?),
            None => None,
        };
        let mut endpoint = ServerEndpoint::new(command);
        let timeout_ms = overrides
            .timeout_ms
            .or(env_timeout)
            .or(server.timeout_ms)
            .unwrap_or(endpoint.timeout_ms);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        endpoint.args = server.args;
        endpoint.env = server.env;
        endpoint.timeout_ms = timeout_ms;
        endpoint.stderr_log = Some(
            server
                .stderr_log
                .unwrap_or_else(|| config_dir.join(HOST_LOG_FILE)),
        );

        Ok(ToolpipeConfig {
            endpoint,
            config_dir,
        })
    }
}

/// Get the toolpipe config directory path (~/.toolpipe/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolpipe")
}

/// Load and parse a TOML settings file. A missing file yields defaults.
pub fn load_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(SettingsFile::default()),
    }
}
