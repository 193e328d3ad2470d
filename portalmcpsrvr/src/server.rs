//! # Request Router
//!
//! Maps incoming method names onto the resource catalog and the tool
//! dispatcher and wraps every outcome into a protocol envelope. Two error
//! channels are kept strictly apart: tool handler failures stay inside the
//! `result` as an `isError` envelope, while protocol and resource failures
//! become JSON-RPC `error` objects with the request id echoed.

use anyhow::{Context, Result};
use portalmcp_common::{
    InitializeResult, McpErrorCode, ResourcesReadParams, ResourcesListResult, RpcRequest,
    RpcResponse, ServerCapabilities, ServerInfo, ToolCallParams, ToolsListResult,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audit::{AuditContext, AuditDetails, Auditor};
use crate::catalog::{CatalogError, ResourceCatalog};
use crate::config::ServerConfig;
use crate::fs_safety::FsError;
use crate::rpc::{self, create_error_response, create_success_response};
use crate::tools::{ToolName, ToolRegistry};

/// MCP protocol version answered to initialize.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Error, Debug)]
enum ServerError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    fn code(&self) -> McpErrorCode {
        match self {
            ServerError::MethodNotFound(_) => McpErrorCode::MethodNotFound,
            ServerError::Internal(_) => McpErrorCode::Internal,
        }
    }
}

/// Closed enumeration of the protocol methods served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Initialize,
    ResourcesList,
    ResourcesRead,
    ToolsList,
    ToolsCall,
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialize" => Ok(Method::Initialize),
            "resources/list" => Ok(Method::ResourcesList),
            "resources/read" => Ok(Method::ResourcesRead),
            "tools/list" => Ok(Method::ToolsList),
            "tools/call" => Ok(Method::ToolsCall),
            _ => Err(()),
        }
    }
}

/// Main server instance.
pub struct Server {
    catalog: ResourceCatalog,
    tools: ToolRegistry,
    auditor: Auditor,
}

impl Server {
    pub fn new(config: Arc<ServerConfig>, audit_log: Option<PathBuf>) -> Result<Self> {
        info!(
            "Initializing server for project root {} (app: {})",
            config.project_root.display(),
            config.app_name
        );

        let auditor = Auditor::new(audit_log).context("Failed to initialize audit logger")?;

        Ok(Server {
            catalog: ResourceCatalog::new(Arc::clone(&config)),
            tools: ToolRegistry::new(config),
            auditor,
        })
    }

    /// Handle one input line. Returns `None` when the line is not parseable
    /// as a protocol message; such lines are dropped without a response.
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        match rpc::parse_request(line) {
            Ok(request) => Some(self.handle_request(request).await),
            Err(e) => {
                debug!("ignoring non-protocol input: {:#}", e);
                None
            }
        }
    }

    async fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        let ctx = AuditContext::new(request_id_label(&request.id), request.method.clone());

        let result = match Method::from_str(&request.method) {
            Ok(Method::Initialize) => self.handle_initialize(&ctx),
            Ok(Method::ResourcesList) => self.handle_resources_list(&ctx),
            Ok(Method::ResourcesRead) => self.handle_resources_read(&ctx, request.params),
            Ok(Method::ToolsList) => self.handle_tools_list(&ctx),
            Ok(Method::ToolsCall) => self.handle_tools_call(&ctx, request.params).await,
            Err(()) => {
                warn!("unsupported method: {}", request.method);
                self.auditor
                    .log_error(&ctx, "method not found", AuditDetails::default());
                Err(ServerError::MethodNotFound(request.method.clone()))
            }
        };

        match result {
            Ok(value) => create_success_response(request.id, value),
            Err(e) => {
                info!("'{}' -> {}", request.method, e);
                create_error_response(request.id, e.code(), e.to_string())
            }
        }
    }

    /// Fixed server metadata; no side effects, request params are ignored.
    fn handle_initialize(&self, ctx: &AuditContext) -> Result<Value, ServerError> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                resources: HashMap::new(),
                tools: HashMap::new(),
            },
            server_info: ServerInfo {
                name: "portalmcpsrvr".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        self.auditor.log_allow(ctx, AuditDetails::default());
        Ok(serde_json::to_value(result).unwrap())
    }

    fn handle_resources_list(&self, ctx: &AuditContext) -> Result<Value, ServerError> {
        let result = ResourcesListResult {
            resources: self.catalog.list(),
        };

        self.auditor.log_allow(ctx, AuditDetails::default());
        Ok(serde_json::to_value(result).unwrap())
    }

    fn handle_resources_read(
        &self,
        ctx: &AuditContext,
        params: Value,
    ) -> Result<Value, ServerError> {
        let read_params: ResourcesReadParams = serde_json::from_value(params).map_err(|e| {
            let message = format!("Invalid resources/read parameters: {}", e);
            self.auditor.log_error(ctx, &message, AuditDetails::default());
            ServerError::Internal(message)
        })?;

        debug!("resources/read: uri={}", read_params.uri);

        let details = AuditDetails {
            path: Some(read_params.uri.clone()),
            ..Default::default()
        };
        match self.catalog.read(&read_params.uri) {
            Ok(result) => {
                self.auditor.log_allow(ctx, details);
                Ok(serde_json::to_value(result).unwrap())
            }
            Err(e) => {
                match &e {
                    CatalogError::Fs(FsError::AccessDenied { .. }) => {
                        self.auditor.log_deny(ctx, &e.to_string(), details)
                    }
                    _ => self.auditor.log_error(ctx, &e.to_string(), details),
                }
                Err(ServerError::Internal(e.to_string()))
            }
        }
    }

    fn handle_tools_list(&self, ctx: &AuditContext) -> Result<Value, ServerError> {
        let result = ToolsListResult {
            tools: ToolRegistry::descriptors(),
        };

        self.auditor.log_allow(ctx, AuditDetails::default());
        Ok(serde_json::to_value(result).unwrap())
    }

    async fn handle_tools_call(
        &self,
        ctx: &AuditContext,
        params: Value,
    ) -> Result<Value, ServerError> {
        let call: ToolCallParams = serde_json::from_value(params).map_err(|e| {
            let message = format!("Invalid tools/call parameters: {}", e);
            self.auditor.log_error(ctx, &message, AuditDetails::default());
            ServerError::Internal(message)
        })?;

        let name = call.name.ok_or_else(|| {
            let message = "Missing tool name".to_string();
            self.auditor.log_error(ctx, &message, AuditDetails::default());
            ServerError::Internal(message)
        })?;

        let tool = ToolName::from_str(&name).map_err(|()| {
            let message = format!("Unknown tool: {}", name);
            self.auditor.log_error(ctx, &message, AuditDetails::default());
            ServerError::Internal(message)
        })?;

        let arguments = if call.arguments.is_null() {
            Value::Object(Default::default())
        } else {
            call.arguments
        };

        let result = self.tools.dispatch(tool, arguments).await;

        let details = AuditDetails {
            tool: Some(name),
            ..Default::default()
        };
        if result.is_error == Some(true) {
            let text = result
                .content
                .first()
                .map(|c| c.text.clone())
                .unwrap_or_default();
            self.auditor.log_error(ctx, &text, details);
        } else {
            self.auditor.log_allow(ctx, details);
        }

        Ok(serde_json::to_value(result).unwrap())
    }
}

/// Compact label for audit entries, derived from the opaque request id.
fn request_id_label(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
