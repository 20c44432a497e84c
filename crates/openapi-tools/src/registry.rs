//! Tool registry.
//!
//! Owns the immutable tool table built at startup and bridges invocations to
//! the [`RequestExecutor`]. Safe for unsynchronized concurrent reads; nothing
//! here mutates after construction.

use crate::adapter::ToolDefinition;
use crate::error::{BridgeError, Result};
use crate::executor::{ExecutionResult, RequestExecutor};
use reqwest::Method;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
    base_url: Option<String>,
    executor: RequestExecutor,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(tools: Vec<ToolDefinition>, base_url: Option<String>) -> Self {
        let index = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self {
            tools,
            index,
            base_url,
            executor: RequestExecutor::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the tool table in the MCP model shape.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|def| {
                let mut tool = Tool::new(
                    def.name.clone(),
                    def.description.clone().unwrap_or_default(),
                    Arc::new(input_schema(def)),
                );
                tool.annotations = Some(annotations_for_method(&def.operation.method));
                tool
            })
            .collect()
    }

    /// Validate arguments against the tool's parameter shape, execute the
    /// upstream call, and render the outcome as tool-result text.
    ///
    /// # Errors
    ///
    /// Fails with [`BridgeError::Runtime`] for an unknown tool name,
    /// [`BridgeError::InvalidParameter`] when a supplied argument does not
    /// match its declared type, and propagates executor errors otherwise.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let def = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| BridgeError::Runtime(format!("Unknown tool: {name}")))?;

        let empty = serde_json::Map::new();
        let args = arguments.as_object().unwrap_or(&empty);

        for parameter in &def.operation.parameters {
            if let Some(value) = args.get(&parameter.name) {
                parameter.descriptor.validate(value).map_err(|e| {
                    BridgeError::InvalidParameter(format!("{}: {e}", parameter.name))
                })?;
            }
        }

        let result = self
            .executor
            .execute(self.base_url.as_deref(), &def.operation, args)
            .await?;
        Ok(CallToolResult::success(vec![Content::text(
            render_result(&result)?,
        )]))
    }
}

/// Build the published JSON-Schema input shape for one tool.
fn input_schema(def: &ToolDefinition) -> JsonObject {
    let mut properties = serde_json::Map::new();
    let mut required: Vec<String> = Vec::new();

    for parameter in &def.operation.parameters {
        let mut schema = parameter.descriptor.json_schema();
        if let Some(description) = &parameter.description {
            schema["description"] = json!(description);
        }
        properties.insert(parameter.name.clone(), schema);
        if parameter.required {
            required.push(parameter.name.clone());
        }
    }

    let mut schema = serde_json::Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    schema
}

/// Textual rendering of an execution result: plain strings unwrapped, other
/// JSON pretty-printed, binary summarized in one line.
fn render_result(result: &ExecutionResult) -> Result<String> {
    match result {
        ExecutionResult::Json(Value::String(s)) => Ok(s.clone()),
        ExecutionResult::Json(value) => Ok(serde_json::to_string_pretty(value)?),
        ExecutionResult::Binary(payload) => Ok(format!(
            "Binary response ({}), {} base64 characters",
            payload.content_type,
            payload.data.len()
        )),
    }
}

/// MCP tool annotations from RFC 9110 method semantics.
///
/// `openWorldHint` is always `true`: these tools talk to an external system.
/// For methods without well-known semantics only the open-world hint is set.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = if method == Method::GET
        || method == Method::HEAD
        || method == Method::OPTIONS
        || method == Method::TRACE
    {
        (Some(true), Some(false), Some(true))
    } else if method == Method::POST {
        (Some(false), Some(false), Some(false))
    } else if method == Method::PUT || method == Method::DELETE {
        (Some(false), Some(true), Some(true))
    } else if method == Method::PATCH {
        // PATCH may or may not be idempotent; do not guess.
        (Some(false), Some(true), None)
    } else {
        (None, None, None)
    };
    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::adapt;
    use serde_json::json;

    fn pet_registry(base_url: Option<String>) -> ToolRegistry {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets/{petId}": {
                    "get": {
                        "operationId": "getPet",
                        "summary": "Fetch one pet",
                        "parameters": [
                            {"name": "petId", "in": "path", "required": true,
                             "schema": {"type": "integer"}},
                            {"name": "verbose", "in": "query",
                             "schema": {"type": "boolean"}, "description": "include details"}
                        ],
                        "responses": {"200": {"content": {"application/json": {}}}}
                    }
                }
            }
        });
        ToolRegistry::new(adapt(&document), base_url)
    }

    #[test]
    fn list_tools_publishes_schema_and_annotations() {
        let registry = pet_registry(None);
        let tools = registry.list_tools();
        assert_eq!(tools.len(), 1);

        let tool = &tools[0];
        assert_eq!(tool.name.as_ref(), "getPet");
        assert_eq!(tool.description.as_deref(), Some("Fetch one pet"));

        let schema = tool.input_schema.as_ref();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"]["petId"]["type"], json!("integer"));
        assert_eq!(
            schema["properties"]["verbose"]["description"],
            json!("include details")
        );
        assert_eq!(schema["required"], json!(["petId"]));

        let annotations = tool.annotations.as_ref().unwrap();
        assert_eq!(annotations.read_only_hint, Some(true));
        assert_eq!(annotations.open_world_hint, Some(true));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_runtime_error() {
        let registry = pet_registry(None);
        let err = registry.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, BridgeError::Runtime(_)));
    }

    #[tokio::test]
    async fn mistyped_argument_is_rejected_before_execution() {
        // No base URL: if validation did not run first this would surface as
        // a configuration error instead.
        let registry = pet_registry(None);
        let err = registry
            .call_tool("getPet", json!({"petId": "42"}))
            .await
            .unwrap_err();
        match err {
            BridgeError::InvalidParameter(msg) => assert!(msg.contains("petId")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_base_url_is_a_configuration_error() {
        let registry = pet_registry(None);
        let err = registry
            .call_tool("getPet", json!({"petId": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn render_unwraps_strings_and_summarizes_binary() {
        let text = render_result(&ExecutionResult::Json(json!("hello"))).unwrap();
        assert_eq!(text, "hello");

        let pretty = render_result(&ExecutionResult::Json(json!({"a": 1}))).unwrap();
        assert!(pretty.contains("\"a\": 1"));

        let scalar = render_result(&ExecutionResult::Json(json!(42))).unwrap();
        assert_eq!(scalar, "42");

        let binary = render_result(&ExecutionResult::Binary(crate::executor::BinaryPayload {
            is_binary: true,
            content_type: "image/png".to_string(),
            data: "QUJD".to_string(),
        }))
        .unwrap();
        assert_eq!(binary, "Binary response (image/png), 4 base64 characters");
    }

    #[test]
    fn annotations_patch_leaves_idempotence_unknown() {
        let a = annotations_for_method(&Method::PATCH);
        assert_eq!(a.read_only_hint, Some(false));
        assert_eq!(a.destructive_hint, Some(true));
        assert_eq!(a.idempotent_hint, None);
        assert_eq!(a.open_world_hint, Some(true));
    }
}
