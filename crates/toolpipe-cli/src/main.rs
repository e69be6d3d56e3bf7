//! toolpipe CLI: call tools on a stdio tool host from the terminal.

mod args;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use toolpipe_config::{CliOverrides, ToolpipeConfig};
use toolpipe_mcp::ToolClient;

#[derive(Parser)]
#[command(name = "toolpipe", version, about = "Call tools on a stdio tool host")]
struct Cli {
    /// Tool-host executable (overrides TOOLPIPE_SERVER_COMMAND)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Maximum time for the handshake and tool call, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tools the host exposes
    Tools,

    /// Call a tool and print its result as JSON
    Call {
        /// Tool name
        tool: String,

        /// Arguments as key=value pairs; values are parsed as JSON when possible
        #[arg(value_name = "KEY=VALUE")]
        pairs: Vec<String>,

        /// Arguments as a JSON object
        #[arg(long = "args", value_name = "JSON")]
        json: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ToolpipeConfig::load(CliOverrides {
        server_command: cli.server,
        timeout_ms: cli.timeout_ms,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing::debug!(
        "Using tool host {:?} (config dir {})",
        config.endpoint.command,
        config.config_dir.display()
    );
    let client = ToolClient::new(config.endpoint);

    match cli.command {
        Command::Tools => {
            let tools = client.list_tools().context("Failed to list tools")?;
            for tool in tools {
                let summary = tool.description.lines().next().unwrap_or_default();
                println!("{}: {summary}", tool.name);
            }
        }
        Command::Call { tool, pairs, json } => {
            let arguments = args::build_arguments(json.as_deref(), &pairs)?;
            let value = client
                .call_tool(&tool, arguments)
                .with_context(|| format!("Call to '{tool}' failed"))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
