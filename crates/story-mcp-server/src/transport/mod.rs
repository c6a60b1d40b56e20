//! Protocol transports
//!
//! Method routing is shared; the HTTP binding decides whether a response is
//! returned synchronously or pushed onto an event stream.

pub mod http;

use serde_json::Value;
use story_mcp_core::error_codes;
use tracing::debug;

use crate::StoryServer;
use crate::mcp::{
    InitializeResult, Request, Response, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::tools::handle_tool_call;

/// MCP protocol version implemented by this server
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Route one JSON-RPC request to its method handler.
///
/// Returns `None` for notifications, which receive no response.
pub async fn handle_request(server: &StoryServer, request: &Request) -> Option<Response> {
    debug!(method = %request.method, "Handling request");

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(request, server),
        "notifications/initialized" | "initialized" => {
            Response::success(request.id.clone(), serde_json::json!({}))
        }
        "tools/list" => handle_tools_list(request, server),
        "tools/call" => handle_tools_call(request, server).await,
        "ping" => Response::success(request.id.clone(), serde_json::json!({})),
        other => Response::error(
            request.id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    };

    if request.is_notification() {
        None
    } else {
        Some(response)
    }
}

fn handle_initialize(request: &Request, server: &StoryServer) -> Response {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: ServerInfo {
            name: server.name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    match serde_json::to_value(result) {
        Ok(value) => Response::success(request.id.clone(), value),
        Err(e) => Response::error(
            request.id.clone(),
            error_codes::INTERNAL_ERROR,
            e.to_string(),
        ),
    }
}

fn handle_tools_list(request: &Request, server: &StoryServer) -> Response {
    Response::success(
        request.id.clone(),
        serde_json::json!({ "tools": server.catalog() }),
    )
}

async fn handle_tools_call(request: &Request, server: &StoryServer) -> Response {
    let name = match request.params.get("name").and_then(Value::as_str) {
        Some(name) => name,
        None => {
            return Response::error(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                "Missing tool name in params",
            );
        }
    };
    let arguments = request
        .params
        .get("arguments")
        .cloned()
        .unwrap_or(Value::Object(serde_json::Map::new()));

    let result = handle_tool_call(server, name, arguments).await;
    match serde_json::to_value(&result) {
        Ok(value) => Response::success(request.id.clone(), value),
        Err(e) => Response::error(
            request.id.clone(),
            error_codes::INTERNAL_ERROR,
            e.to_string(),
        ),
    }
}
