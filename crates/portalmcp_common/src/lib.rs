//! # portalmcp_common
//!
//! Common types for the portalmcp project: JSON-RPC 2.0 message types and the
//! MCP protocol structures exchanged between the server and its clients. This
//! crate holds the foundational data structures shared by the server binary
//! and its integration tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// JSON-RPC 2.0 request message.
///
/// The `id` is opaque JSON and is echoed verbatim in the response; an absent
/// `id` deserializes to `null` and is echoed as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC 2.0 response message. Exactly one of `result`/`error` is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// Protocol error codes used by the server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum McpErrorCode {
    MethodNotFound = -32601,
    Internal = -32603,
}

impl McpErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            McpErrorCode::MethodNotFound => "Method not found",
            McpErrorCode::Internal => "Internal server error",
        }
    }
}

impl From<McpErrorCode> for i32 {
    fn from(code: McpErrorCode) -> Self {
        code as i32
    }
}

/// Result of the initialize method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Capabilities declared in the initialize response. Both sets are declared
/// as empty objects per the protocol handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub resources: HashMap<String, Value>,
    pub tools: HashMap<String, Value>,
}

/// Server identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// One entry of the resources/list result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Result of resources/list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesListResult {
    pub resources: Vec<ResourceInfo>,
}

/// Parameters for resources/read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadParams {
    pub uri: String,
}

/// Full decoded text of one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

/// Result of resources/read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadResult {
    pub contents: Vec<ResourceContent>,
}

/// One entry of the tools/list result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Result of tools/list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolInfo>,
}

/// Parameters for tools/call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

/// One content block of a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Uniform envelope returned by every tool handler. `is_error` is serialized
/// only when set; `Some(true)` iff the underlying operation failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Success envelope wrapping one text block.
    pub fn text(text: impl Into<String>) -> Self {
        ToolResult {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: text.into(),
            }],
            is_error: None,
        }
    }

    /// Error envelope wrapping one text block.
    pub fn error(text: impl Into<String>) -> Self {
        ToolResult {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: text.into(),
            }],
            is_error: Some(true),
        }
    }
}

/// Arguments for the pm2_logs tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pm2LogsArgs {
    #[serde(default = "default_log_lines")]
    pub lines: u64,
}

/// Arguments for the run_script tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunScriptArgs {
    pub script: String,
}

/// Arguments for the list_files tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesArgs {
    #[serde(default = "default_directory")]
    pub directory: String,
}

/// Arguments for the read_file tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFileArgs {
    pub path: String,
}

fn default_log_lines() -> u64 {
    50
}

fn default_directory() -> String {
    ".".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_echoed_verbatim() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"id":"abc-1","method":"tools/list"}"#).unwrap();
        assert_eq!(req.id, json!("abc-1"));

        let req: RpcRequest = serde_json::from_str(r#"{"id":42,"method":"tools/list"}"#).unwrap();
        assert_eq!(req.id, json!(42));
    }

    #[test]
    fn test_request_missing_id_defaults_to_null() {
        let req: RpcRequest = serde_json::from_str(r#"{"method":"initialize"}"#).unwrap();
        assert_eq!(req.id, Value::Null);
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_request_missing_method_is_rejected() {
        assert!(serde_json::from_str::<RpcRequest>(r#"{"id":1}"#).is_err());
    }

    #[test]
    fn test_success_response_omits_error_field() {
        let response = RpcResponse {
            jsonrpc: "2.0".to_string(),
            id: json!(7),
            result: Some(json!({"ok": true})),
            error: None,
        };
        let serialized = serde_json::to_string(&response).unwrap();
        assert!(!serialized.contains("error"));
        assert!(serialized.contains(r#""id":7"#));
    }

    #[test]
    fn test_error_response_omits_result_field() {
        let response = RpcResponse {
            jsonrpc: "2.0".to_string(),
            id: Value::Null,
            result: None,
            error: Some(RpcError {
                code: McpErrorCode::MethodNotFound.into(),
                message: "Method not found: foo/bar".to_string(),
            }),
        };
        let serialized = serde_json::to_string(&response).unwrap();
        assert!(!serialized.contains("result"));
        assert!(serialized.contains("-32601"));
    }

    #[test]
    fn test_mcp_error_codes() {
        assert_eq!(McpErrorCode::MethodNotFound as i32, -32601);
        assert_eq!(McpErrorCode::Internal as i32, -32603);
    }

    #[test]
    fn test_tool_result_success_has_no_is_error() {
        let result = ToolResult::text("hello");
        let serialized = serde_json::to_string(&result).unwrap();
        assert!(!serialized.contains("isError"));
        assert!(serialized.contains(r#""type":"text""#));
    }

    #[test]
    fn test_tool_result_error_sets_is_error() {
        let result = ToolResult::error("Error: boom");
        let serialized = serde_json::to_string(&result).unwrap();
        assert!(serialized.contains(r#""isError":true"#));
    }

    #[test]
    fn test_pm2_logs_args_default_lines() {
        let args: Pm2LogsArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(args.lines, 50);

        let args: Pm2LogsArgs = serde_json::from_value(json!({"lines": 200})).unwrap();
        assert_eq!(args.lines, 200);
    }

    #[test]
    fn test_list_files_args_default_directory() {
        let args: ListFilesArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(args.directory, ".");
    }

    #[test]
    fn test_tool_call_params_default_arguments() {
        let params: ToolCallParams =
            serde_json::from_value(json!({"name": "pm2_status"})).unwrap();
        assert_eq!(params.name.as_deref(), Some("pm2_status"));
        assert_eq!(params.arguments, Value::Null);
    }
}
