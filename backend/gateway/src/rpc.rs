//! JSON-RPC 2.0 dispatch shared by the pipe and HTTP bindings.
//!
//! The method surface mirrors the original tool server: `initialize`,
//! `notifications/initialized`, `tools/list`, `tools/call`, `ping`. Tool
//! results are wrapped in the uniform success/error envelope and carried as
//! text content; schema violations are rejected before dispatch as
//! invalid-params errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use vigil_core::metrics::OperationKind;
use vigil_core::{envelope, VigilError};

use crate::GatewayState;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "vigil";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RpcErrorBody {
    pub code: i32,
    pub message: String,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// Parse one request. On failure the ready-to-send error response comes
/// back instead.
pub fn parse_request(raw: &str) -> Result<RpcRequest, Box<RpcResponse>> {
    let request: RpcRequest = serde_json::from_str(raw)
        .map_err(|e| Box::new(RpcResponse::error(None, PARSE_ERROR, format!("Parse error: {e}"))))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(Box::new(RpcResponse::error(
            request.id,
            INVALID_REQUEST,
            format!("expected jsonrpc \"{JSONRPC_VERSION}\""),
        )));
    }
    Ok(request)
}

/// Handle one parsed request against the tool registry.
pub async fn dispatch(state: &GatewayState, request: RpcRequest) -> RpcResponse {
    state.metrics.record_request();
    let id = request.id;
    let params = request.params.unwrap_or(Value::Null);
    debug!(method = %request.method, "rpc dispatch");

    match request.method.as_str() {
        "initialize" => RpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "notifications/initialized" | "ping" => RpcResponse::success(id, json!({})),
        "tools/list" => RpcResponse::success(
            id,
            json!({ "tools": state.tools.definitions() }),
        ),
        "tools/call" => handle_tool_call(state, id, params).await,
        other => {
            warn!(method = %other, "unknown rpc method");
            state.metrics.record_error();
            RpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
        }
    }
}

async fn handle_tool_call(state: &GatewayState, id: Option<Value>, params: Value) -> RpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        state.metrics.record_error();
        return RpcResponse::error(id, INVALID_PARAMS, "missing 'name' field");
    };
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    let Some(tool) = state.tools.get(name) else {
        state.metrics.record_error();
        return RpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {name}"));
    };

    match name {
        "screen_capture" => state.metrics.record_operation(OperationKind::Capture),
        "extract_text" => state.metrics.record_operation(OperationKind::Ocr),
        "log_activity" => state.metrics.record_operation(OperationKind::ActivityLog),
        _ => {}
    }

    let budget = Duration::from_millis(state.config.request_timeout_ms);
    // A handler that overruns the budget is dropped here; the caller gets an
    // explicit timeout envelope and any late work is discarded.
    match tokio::time::timeout(budget, tool.call(arguments)).await {
        Ok(Ok(payload)) => RpcResponse::success(id, tool_content(envelope::ok(payload), false)),
        Ok(Err(e)) if e.is_schema_violation() => {
            state.metrics.record_error();
            RpcResponse::error(id, INVALID_PARAMS, e.to_string())
        }
        Ok(Err(VigilError::Other(e))) => {
            state.metrics.record_error();
            warn!(tool = %name, error = %e, "unexpected tool failure");
            RpcResponse::error(id, INTERNAL_ERROR, "internal error")
        }
        Ok(Err(e)) => {
            state.metrics.record_error();
            RpcResponse::success(id, tool_content(envelope::err(e.to_string()), true))
        }
        Err(_elapsed) => {
            state.metrics.record_error();
            warn!(tool = %name, "tool call exceeded request timeout");
            RpcResponse::success(
                id,
                tool_content(envelope::err(VigilError::RequestTimeout.to_string()), true),
            )
        }
    }
}

/// Wrap an envelope as MCP-style text content.
fn tool_content(envelope: Value, is_error: bool) -> Value {
    let mut result = json!({
        "content": [{ "type": "text", "text": envelope.to_string() }],
    });
    if is_error {
        result["isError"] = Value::Bool(true);
    }
    result
}
