//! toolpipe-server: hosts the built-in tools over stdin/stdout.
//!
//! stdout carries protocol frames only. Diagnostics go to stderr, which the
//! client side redirects to a log file.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::sync::Arc;
use toolpipe_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "toolpipe-server", version, about = "Serve toolpipe's built-in tools over stdio")]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let registry = ToolRegistry::with_builtins().context("Failed to register built-in tools")?;
    tracing::info!(
        "{} v{} serving {} tools on stdio",
        toolpipe_server::SERVER_NAME,
        env!("CARGO_PKG_VERSION"),
        registry.len()
    );

    toolpipe_server::serve(Arc::new(registry), tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("Tool host stopped with an error")?;

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
