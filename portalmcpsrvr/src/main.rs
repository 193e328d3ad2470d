//! # portalmcpsrvr - Operations MCP Server
//!
//! A small MCP server exposing a fixed set of operational capabilities for a
//! single deployed portal application: pm2 status/restart/logs, nginx status,
//! project script execution, and file listing/reading. Requests arrive as
//! newline-delimited JSON-RPC 2.0 on stdin; responses leave on stdout, one
//! per line.
//!
//! ## Architecture
//!
//! - JSON-RPC 2.0 transport over stdio, strictly one request at a time
//! - Path containment enforced on every filesystem access
//! - External process invocations bounded by per-tool timeouts
//! - JSONL audit logging of every handled request

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod audit;
mod catalog;
mod config;
mod fs_safety;
mod rpc;
mod sandbox;
mod server;
mod tools;

#[derive(Parser)]
#[command(name = "portalmcpsrvr")]
#[command(about = "Operations MCP server for a deployed portal application")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Project root directory all file access is contained to
    #[arg(long, value_name = "DIR", default_value = "/var/www/portal")]
    root: PathBuf,

    /// Application name for the process manager
    #[arg(long, value_name = "NAME", default_value = "portal")]
    app: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Audit log file (JSONL); auditing is disabled when omitted
    #[arg(long, value_name = "FILE")]
    audit_log: Option<PathBuf>,

    /// Process-manager binary
    #[arg(long, value_name = "BIN", default_value = "pm2")]
    pm2_bin: String,

    /// Service-manager binary
    #[arg(long, value_name = "BIN", default_value = "systemctl")]
    systemctl_bin: String,

    /// Script runtime binary
    #[arg(long, value_name = "BIN", default_value = "node")]
    node_bin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;
    info!("Starting portalmcpsrvr v{}", env!("CARGO_PKG_VERSION"));

    let config = config::ServerConfig::new(
        &cli.root,
        cli.app,
        cli.pm2_bin,
        cli.systemctl_bin,
        cli.node_bin,
    )
    .context("Invalid server configuration")?;

    let server = server::Server::new(Arc::new(config), cli.audit_log)?;

    run_stdio_server(server).await
}

/// The transport loop: read one line, route it, write one response line.
/// Per-request failures never terminate the loop; only end-of-stream (clean
/// shutdown) or a broken stdio pipe do.
async fn run_stdio_server(server: server::Server) -> Result<()> {
    info!("Starting stdio transport");

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("EOF on stdin, shutting down");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(response) = server.handle_line(line).await {
                    rpc::send_response(&response)
                        .await
                        .context("Failed to write response")?;
                }
            }
            Err(e) => {
                error!("Error reading from stdin: {}", e);
                break;
            }
        }
    }

    info!("Server main loop ended");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("portalmcpsrvr={}", level)));

    tracing_subscriber::fmt()
        .with_target(false)
        .without_time() // stdio mode doesn't need timestamps
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    Ok(())
}
