//! MCP server handler over the tool registry.

use rmcp::model::{
    CallToolRequestParams, CallToolResult, ErrorData as McpError, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::Value;
use specbridge_openapi_tools::error::BridgeError;
use specbridge_openapi_tools::registry::ToolRegistry;
use std::sync::Arc;

/// Bridges MCP `tools/list` and `tools/call` onto the registry.
///
/// Cloning is cheap; each session gets its own handle onto the shared,
/// read-only registry.
#[derive(Clone)]
pub struct BridgeService {
    registry: Arc<ToolRegistry>,
}

impl BridgeService {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

/// Per-invocation errors become protocol errors carrying the message text
/// only; nothing upstream-specific leaks through raw.
fn to_protocol_error(err: BridgeError) -> McpError {
    match err {
        BridgeError::MissingParameter(_) | BridgeError::InvalidParameter(_) => {
            McpError::invalid_params(err.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

impl ServerHandler for BridgeService {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.registry.list_tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = request
            .arguments
            .map_or(Value::Object(serde_json::Map::new()), Value::Object);
        self.registry
            .call_tool(&request.name, arguments)
            .await
            .map_err(to_protocol_error)
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "specbridge".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("OpenAPI tool bridge".to_string()),
                ..Default::default()
            },
            instructions: Some(
                "Tools on this server are generated from an OpenAPI document. \
                 Call tools/list to discover them; each call performs one HTTP \
                 request against the upstream API."
                    .to_string(),
            ),
        }
    }
}
