//! # JSON-RPC 2.0 Transport Helpers
//!
//! Parsing of newline-delimited JSON-RPC requests and serialization of
//! responses over stdio. One request per input line, one response per output
//! line, flushed immediately.

use anyhow::{Context, Result};
use portalmcp_common::{McpErrorCode, RpcError, RpcRequest, RpcResponse};
use serde_json::Value;
use tokio::io::{self, AsyncWriteExt};
use tracing::debug;

/// Parse a JSON-RPC request from one line of input.
pub fn parse_request(line: &str) -> Result<RpcRequest> {
    let request: RpcRequest =
        serde_json::from_str(line).context("invalid JSON-RPC request")?;
    debug!("parsed request: method={}, id={}", request.method, request.id);
    Ok(request)
}

/// Serialize a response to one line on stdout and flush.
pub async fn send_response(response: &RpcResponse) -> Result<()> {
    let json = serde_json::to_string(response).context("Failed to serialize response")?;

    let mut stdout = io::stdout();
    stdout
        .write_all(json.as_bytes())
        .await
        .context("Failed to write to stdout")?;
    stdout
        .write_all(b"\n")
        .await
        .context("Failed to write newline to stdout")?;
    stdout.flush().await.context("Failed to flush stdout")?;

    Ok(())
}

/// Create a success response echoing the request id.
pub fn create_success_response(id: Value, result: Value) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: Some(result),
        error: None,
    }
}

/// Create an error response echoing the request id.
pub fn create_error_response(id: Value, code: McpErrorCode, message: String) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(RpcError {
            code: code.into(),
            message,
        }),
    }
}
