//! # Tool Registry & Dispatcher
//!
//! The fixed set of seven operational tools: process-manager status/restart/
//! logs, web-server status, project script execution, and file listing/
//! reading. Each handler performs exactly one external-process call or
//! filesystem operation and normalizes the outcome into the uniform
//! `ToolResult` envelope; no failure ever propagates out of the dispatcher.

use crate::config::ServerConfig;
use crate::fs_safety::{self, FsError};
use crate::sandbox::{self, ExecutionConfig};
use portalmcp_common::{
    ListFilesArgs, Pm2LogsArgs, ReadFileArgs, RunScriptArgs, ToolInfo, ToolResult,
};
use serde_json::{json, Value};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

const PM2_STATUS_TIMEOUT_MS: u64 = 10_000;
const PM2_RESTART_TIMEOUT_MS: u64 = 30_000;
const PM2_LOGS_TIMEOUT_MS: u64 = 10_000;
const NGINX_STATUS_TIMEOUT_MS: u64 = 10_000;
const RUN_SCRIPT_TIMEOUT_MS: u64 = 60_000;

const EMPTY_DIRECTORY_PLACEHOLDER: &str = "(empty directory)";

/// Closed enumeration of the tool names accepted by tools/call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    Pm2Status,
    Pm2Restart,
    Pm2Logs,
    NginxStatus,
    RunScript,
    ListFiles,
    ReadFile,
}

impl FromStr for ToolName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pm2_status" => Ok(ToolName::Pm2Status),
            "pm2_restart" => Ok(ToolName::Pm2Restart),
            "pm2_logs" => Ok(ToolName::Pm2Logs),
            "nginx_status" => Ok(ToolName::NginxStatus),
            "run_script" => Ok(ToolName::RunScript),
            "list_files" => Ok(ToolName::ListFiles),
            "read_file" => Ok(ToolName::ReadFile),
            _ => Err(()),
        }
    }
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::Pm2Status => "pm2_status",
            ToolName::Pm2Restart => "pm2_restart",
            ToolName::Pm2Logs => "pm2_logs",
            ToolName::NginxStatus => "nginx_status",
            ToolName::RunScript => "run_script",
            ToolName::ListFiles => "list_files",
            ToolName::ReadFile => "read_file",
        }
    }
}

pub struct ToolRegistry {
    config: Arc<ServerConfig>,
}

impl ToolRegistry {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// The static descriptor set: seven entries, identical for the process
    /// lifetime regardless of filesystem state.
    pub fn descriptors() -> Vec<ToolInfo> {
        vec![
            ToolInfo {
                name: "pm2_status".to_string(),
                description: "Get the pm2 process status of the managed application".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
            ToolInfo {
                name: "pm2_restart".to_string(),
                description: "Restart the managed application via pm2".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
            ToolInfo {
                name: "pm2_logs".to_string(),
                description: "Fetch the most recent pm2 logs of the managed application"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lines": {
                            "type": "number",
                            "description": "Number of log lines to fetch",
                            "default": 50
                        }
                    }
                }),
            },
            ToolInfo {
                name: "nginx_status".to_string(),
                description: "Check the status of the nginx service".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
            ToolInfo {
                name: "run_script".to_string(),
                description: "Run a project script from the scripts directory".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "script": {
                            "type": "string",
                            "description": "Script name without the .js extension"
                        }
                    },
                    "required": ["script"]
                }),
            },
            ToolInfo {
                name: "list_files".to_string(),
                description: "List files in a directory of the project".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "directory": {
                            "type": "string",
                            "description": "Directory relative to the project root (e.g. 'src', 'scripts')",
                            "default": "."
                        }
                    }
                }),
            },
            ToolInfo {
                name: "read_file".to_string(),
                description: "Read the contents of a project file".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path relative to the project root (e.g. 'server.js', 'src/router.js')"
                        }
                    },
                    "required": ["path"]
                }),
            },
        ]
    }

    /// Dispatch one tool invocation. Every failure, including argument
    /// deserialization, is converted into an error envelope here.
    pub async fn dispatch(&self, name: ToolName, arguments: Value) -> ToolResult {
        debug!("tools/call: tool={}", name.as_str());
        match name {
            ToolName::Pm2Status => {
                self.process_tool(
                    &self.config.pm2_bin,
                    vec!["status".to_string(), self.config.app_name.clone()],
                    PM2_STATUS_TIMEOUT_MS,
                )
                .await
            }
            ToolName::Pm2Restart => {
                self.process_tool(
                    &self.config.pm2_bin,
                    vec!["restart".to_string(), self.config.app_name.clone()],
                    PM2_RESTART_TIMEOUT_MS,
                )
                .await
            }
            ToolName::Pm2Logs => {
                let args: Pm2LogsArgs = match serde_json::from_value(arguments) {
                    Ok(a) => a,
                    Err(e) => return ToolResult::error(format!("Error: {}", e)),
                };
                self.process_tool(
                    &self.config.pm2_bin,
                    vec![
                        "logs".to_string(),
                        self.config.app_name.clone(),
                        "--lines".to_string(),
                        args.lines.to_string(),
                        "--nostream".to_string(),
                    ],
                    PM2_LOGS_TIMEOUT_MS,
                )
                .await
            }
            ToolName::NginxStatus => {
                self.process_tool(
                    &self.config.systemctl_bin,
                    vec![
                        "status".to_string(),
                        "nginx".to_string(),
                        "--no-pager".to_string(),
                    ],
                    NGINX_STATUS_TIMEOUT_MS,
                )
                .await
            }
            ToolName::RunScript => {
                let args: RunScriptArgs = match serde_json::from_value(arguments) {
                    Ok(a) => a,
                    Err(e) => return ToolResult::error(format!("Error: {}", e)),
                };
                self.run_script(&args.script).await
            }
            ToolName::ListFiles => {
                let args: ListFilesArgs = match serde_json::from_value(arguments) {
                    Ok(a) => a,
                    Err(e) => return ToolResult::error(format!("Error: {}", e)),
                };
                self.list_files(&args.directory)
            }
            ToolName::ReadFile => {
                let args: ReadFileArgs = match serde_json::from_value(arguments) {
                    Ok(a) => a,
                    Err(e) => return ToolResult::error(format!("Error: {}", e)),
                };
                self.read_file(&args.path)
            }
        }
    }

    /// Shared shape of the four process tools: run the command, return the
    /// combined output verbatim in a success envelope. The command's own exit
    /// status is not interpreted; only a launch-level failure (spawn error,
    /// timeout) flips the envelope to an error.
    async fn process_tool(&self, program: &str, args: Vec<String>, timeout_ms: u64) -> ToolResult {
        let config = ExecutionConfig {
            program: program.to_string(),
            args,
            cwd: None,
            timeout_ms,
        };
        match sandbox::execute(config).await {
            Ok(output) => ToolResult::text(format!("{}{}", output.stdout, output.stderr)),
            Err(e) => ToolResult::error(format!("Error: {}", e)),
        }
    }

    async fn run_script(&self, script: &str) -> ToolResult {
        let relative = format!("scripts/{}.js", script);
        let script_path = match fs_safety::resolve_within_root(
            &self.config.project_root,
            Path::new(&relative),
        ) {
            Ok(path) => path,
            Err(FsError::NotFound { .. }) => {
                return ToolResult::error(format!("Script not found: {}.js", script));
            }
            Err(e) => return ToolResult::error(format!("Error: {}", e)),
        };

        let config = ExecutionConfig {
            program: self.config.node_bin.clone(),
            args: vec![script_path.display().to_string()],
            cwd: Some(self.config.project_root.clone()),
            timeout_ms: RUN_SCRIPT_TIMEOUT_MS,
        };
        match sandbox::execute(config).await {
            Ok(output) => ToolResult::text(format!(
                "Exit code: {}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
                output.exit_code, output.stdout, output.stderr
            )),
            Err(e) => ToolResult::error(format!("Error: {}", e)),
        }
    }

    fn list_files(&self, directory: &str) -> ToolResult {
        let dir_path = match fs_safety::resolve_within_root(
            &self.config.project_root,
            Path::new(directory),
        ) {
            Ok(path) => path,
            Err(FsError::NotFound { .. }) => {
                return ToolResult::error(format!("Directory not found: {}", directory));
            }
            Err(e) => return ToolResult::error(format!("Error: {}", e)),
        };

        let entries = match std::fs::read_dir(&dir_path) {
            Ok(entries) => entries,
            Err(e) => return ToolResult::error(format!("Error: {}", e)),
        };

        let mut names: Vec<String> = Vec::new();
        let mut paths: Vec<_> = entries.flatten().map(|entry| entry.path()).collect();
        paths.sort();
        for path in paths {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if path.is_file() {
                names.push(format!("📄 {}", file_name));
            } else if path.is_dir() {
                names.push(format!("📁 {}/", file_name));
            }
        }

        if names.is_empty() {
            ToolResult::text(EMPTY_DIRECTORY_PLACEHOLDER)
        } else {
            ToolResult::text(names.join("\n"))
        }
    }

    fn read_file(&self, path: &str) -> ToolResult {
        let file_path =
            match fs_safety::resolve_within_root(&self.config.project_root, Path::new(path)) {
                Ok(resolved) => resolved,
                Err(FsError::NotFound { .. }) => {
                    return ToolResult::error(format!("File not found: {}", path));
                }
                Err(e) => return ToolResult::error(format!("Error: {}", e)),
            };

        match fs_safety::read_text(&file_path) {
            Ok(text) => ToolResult::text(text),
            Err(e) => ToolResult::error(format!("Error: {}", e)),
        }
    }
}
