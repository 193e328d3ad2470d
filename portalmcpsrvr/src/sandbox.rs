//! # External Process Execution
//!
//! Synchronous-with-timeout subprocess invocation for the tool handlers.
//! Every invocation captures stdout and stderr, runs in its own process group
//! (unix), and is killed when its deadline elapses. Failures are typed so the
//! handler layer can map each variant into the uniform tool envelope.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for one external process invocation.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout_ms: u64,
}

/// Outcome of a completed invocation. The exit code is reported, never
/// interpreted here.
#[derive(Debug)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run one command to completion or timeout, capturing all output.
pub async fn execute(config: ExecutionConfig) -> Result<ExecutionResult, SandboxError> {
    debug!(
        "executing {} with args {:?}",
        config.program, config.args
    );

    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| SandboxError::Spawn {
        program: config.program.clone(),
        source: e,
    })?;

    match timeout(
        Duration::from_millis(config.timeout_ms),
        child.wait_with_output(),
    )
    .await
    {
        Ok(output) => {
            let output = output?;
            let exit_code = output.status.code().unwrap_or(-1);
            debug!("{} exited with code {}", config.program, exit_code);
            Ok(ExecutionResult {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
        Err(_) => {
            // The child is dropped with the elapsed future; kill_on_drop reaps it.
            warn!(
                "{} timed out after {}ms, killing",
                config.program, config.timeout_ms
            );
            Err(SandboxError::Timeout {
                timeout_ms: config.timeout_ms,
            })
        }
    }
}
