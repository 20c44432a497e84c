//! Operation-to-tool adaptation.
//!
//! [`adapt`] walks the document's path/method matrix and produces one
//! [`ToolDefinition`] per operation. Adaptation never fails on a malformed
//! individual operation: unusable parameters and bodies are skipped with a
//! warning and the tool simply carries fewer parameters.

use crate::schema::{TypeDescriptor, map_schema};
use regex::Regex;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::warn;

static SANITIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Where a parameter is placed in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

/// One named, typed, located input to an operation.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub description: Option<String>,
    pub descriptor: TypeDescriptor,
    pub required: bool,
    /// The raw schema node, kept for execution-time decisions (binary body
    /// detection) that the descriptor alone cannot express.
    pub schema: Value,
    pub location: ParamLocation,
}

/// The method/path/parameter facts retained verbatim for execution time.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub method: Method,
    pub path: String,
    pub parameters: Vec<ParameterSpec>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
}

/// The adapter's output unit: one invocable tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub operation: OperationSpec,
}

/// Adapt a dereferenced document into tool definitions.
///
/// A document without a `paths` container yields an empty list, not an error.
/// Tool names are unique: when two operations sanitize to the same name, the
/// first keeps it and later ones get `_1`, `_2`, ... suffixes in document
/// order.
#[must_use]
pub fn adapt(document: &Value) -> Vec<ToolDefinition> {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        warn!("document has no 'paths' container, no tools generated");
        return Vec::new();
    };

    let mut tools = Vec::new();
    let mut names: HashSet<String> = HashSet::new();

    for (path, item) in paths {
        let Some(item_obj) = item.as_object() else {
            warn!(path = %path, "skipping non-object path item");
            continue;
        };
        let shared_params = item_obj
            .get("parameters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for (key, node) in item_obj {
            let Some(method) = recognize_method(key) else {
                continue;
            };
            let Some(op) = node.as_object() else {
                warn!(path = %path, method = %key, "skipping non-object operation");
                continue;
            };

            let base = tool_base_name(op, &method, path);
            let name = reserve_unique_tool_name(&mut names, &base);
            if name != base {
                warn!(
                    path = %path,
                    method = %method,
                    base = %base,
                    resolved = %name,
                    "tool name collision, disambiguated with numeric suffix"
                );
            }

            let description = op
                .get("summary")
                .or_else(|| op.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut parameters = Vec::new();
            for raw in shared_params {
                if let Some(p) = parse_parameter(raw, path, &method) {
                    merge_by_name(&mut parameters, p);
                }
            }
            if let Some(op_params) = op.get("parameters").and_then(Value::as_array) {
                for raw in op_params {
                    if let Some(p) = parse_parameter(raw, path, &method) {
                        merge_by_name(&mut parameters, p);
                    }
                }
            }

            let mut consumes = Vec::new();
            if let Some(body) = op.get("requestBody") {
                consumes = content_keys(body.get("content"));
                if let Some(p) = synthesize_body_parameter(body, path, &method) {
                    merge_by_name(&mut parameters, p);
                }
            }

            // Swagger 2.0 operation-level arrays win over derivation.
            if let Some(declared) = string_array(op.get("consumes")) {
                consumes = declared;
            }
            let produces = match string_array(op.get("produces")) {
                Some(declared) => declared,
                None => derive_produces(op.get("responses")),
            };

            tools.push(ToolDefinition {
                name,
                description,
                operation: OperationSpec {
                    method: method.clone(),
                    path: path.clone(),
                    parameters,
                    consumes,
                    produces,
                },
            });
        }
    }

    tools
}

fn recognize_method(key: &str) -> Option<Method> {
    match key {
        "get" => Some(Method::GET),
        "put" => Some(Method::PUT),
        "post" => Some(Method::POST),
        "delete" => Some(Method::DELETE),
        "options" => Some(Method::OPTIONS),
        "head" => Some(Method::HEAD),
        "patch" => Some(Method::PATCH),
        "trace" => Some(Method::TRACE),
        _ => None,
    }
}

/// Compute the pre-disambiguation tool name for one operation.
fn tool_base_name(op: &serde_json::Map<String, Value>, method: &Method, path: &str) -> String {
    if let Some(id) = op.get("operationId").and_then(Value::as_str) {
        return sanitize(id);
    }
    synthesize_name(method, path)
}

fn sanitize(s: &str) -> String {
    SANITIZE_RE.replace_all(s, "_").to_string()
}

/// Synthesize `lower(method)_seg1_seg2...` from the path, e.g. `GET` on
/// `/Pets/{petId}` becomes `get_pets__petid_`.
fn synthesize_name(method: &Method, path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| sanitize(&s.to_lowercase()))
        .collect();
    format!(
        "{}_{}",
        method.as_str().to_lowercase(),
        segments.join("_")
    )
}

fn reserve_unique_tool_name(names: &mut HashSet<String>, base: &str) -> String {
    if names.insert(base.to_string()) {
        return base.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{base}_{counter}");
        if names.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn merge_by_name(parameters: &mut Vec<ParameterSpec>, parameter: ParameterSpec) {
    match parameters.iter_mut().find(|p| p.name == parameter.name) {
        Some(existing) => *existing = parameter,
        None => parameters.push(parameter),
    }
}

/// Parse one natural-list parameter entry. Reference-only or malformed
/// entries are skipped with a warning.
fn parse_parameter(raw: &Value, path: &str, method: &Method) -> Option<ParameterSpec> {
    let Some(obj) = raw.as_object() else {
        warn!(path = %path, method = %method, "skipping non-object parameter entry");
        return None;
    };
    if obj.contains_key("$ref") {
        warn!(path = %path, method = %method, "skipping unresolved parameter reference");
        return None;
    }
    let Some(name) = obj.get("name").and_then(Value::as_str) else {
        warn!(path = %path, method = %method, "skipping parameter without a name");
        return None;
    };
    let location = match obj.get("in").and_then(Value::as_str) {
        Some("query") => ParamLocation::Query,
        Some("path") => ParamLocation::Path,
        Some("header") => ParamLocation::Header,
        Some("cookie") => ParamLocation::Cookie,
        Some("body") => ParamLocation::Body,
        other => {
            warn!(
                path = %path,
                method = %method,
                parameter = %name,
                location = ?other,
                "skipping parameter with unsupported location"
            );
            return None;
        }
    };

    // OpenAPI 3 puts the schema under `schema`; Swagger 2.0 non-body
    // parameters carry type/format/enum inline on the parameter itself.
    let schema = obj.get("schema").cloned().unwrap_or_else(|| raw.clone());

    Some(ParameterSpec {
        name: name.to_string(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        descriptor: map_schema(&schema),
        required: obj.get("required").and_then(Value::as_bool).unwrap_or(false),
        schema,
        location,
    })
}

/// Synthesize the body parameter from an OpenAPI 3 `requestBody`.
///
/// Prefers the `application/json` content entry, else the first declared one.
/// The parameter name comes from the schema's `x-body-name` extension, else
/// `requestBody`.
fn synthesize_body_parameter(body: &Value, path: &str, method: &Method) -> Option<ParameterSpec> {
    let Some(obj) = body.as_object() else {
        warn!(path = %path, method = %method, "skipping non-object request body");
        return None;
    };
    if obj.contains_key("$ref") {
        warn!(path = %path, method = %method, "skipping unresolved request body reference");
        return None;
    }

    let content = obj.get("content").and_then(Value::as_object);
    let entry = content.and_then(|c| {
        c.get("application/json")
            .or_else(|| c.values().next())
    });
    let Some(schema) = entry.and_then(|e| e.get("schema")) else {
        warn!(path = %path, method = %method, "request body has no usable schema, skipping body parameter");
        return None;
    };

    let name = schema
        .get("x-body-name")
        .and_then(Value::as_str)
        .unwrap_or("requestBody");

    Some(ParameterSpec {
        name: name.to_string(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        descriptor: map_schema(schema),
        required: obj.get("required").and_then(Value::as_bool).unwrap_or(false),
        schema: schema.clone(),
        location: ParamLocation::Body,
    })
}

fn string_array(node: Option<&Value>) -> Option<Vec<String>> {
    node.and_then(Value::as_array).map(|a| {
        a.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn content_keys(content: Option<&Value>) -> Vec<String> {
    content
        .and_then(Value::as_object)
        .map(|c| c.keys().cloned().collect())
        .unwrap_or_default()
}

/// Union of content-type keys over 2xx responses, falling back to the
/// `default` response, deduplicated in first-appearance order.
fn derive_produces(responses: Option<&Value>) -> Vec<String> {
    let Some(responses) = responses.and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut produces: Vec<String> = Vec::new();
    let mut push_unique = |keys: Vec<String>, out: &mut Vec<String>| {
        for key in keys {
            if !out.contains(&key) {
                out.push(key);
            }
        }
    };

    for (status, response) in responses {
        if status.starts_with('2') {
            push_unique(content_keys(response.get("content")), &mut produces);
        }
    }
    if produces.is_empty() {
        if let Some(default) = responses.get("default") {
            push_unique(content_keys(default.get("content")), &mut produces);
        }
    }
    produces
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_tool(document: Value) -> ToolDefinition {
        let mut tools = adapt(&document);
        assert_eq!(tools.len(), 1);
        tools.remove(0)
    }

    #[test]
    fn operation_id_is_sanitized() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "find pets by-status",
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        assert_eq!(tool.name, "find_pets_by_status");
    }

    #[test]
    fn synthesized_name_is_pinned() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/Pets/{petId}": {
                    "get": {"responses": {"200": {"description": "ok"}}}
                }
            }
        }));
        assert_eq!(tool.name, "get_pets__petid_");
    }

    #[test]
    fn name_collisions_get_numeric_suffixes() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {
                "/a": {
                    "get": {"operationId": "do-it", "responses": {}},
                    "post": {"operationId": "do it", "responses": {}}
                },
                "/b": {
                    "get": {"operationId": "do.it", "responses": {}}
                }
            }
        });
        let names: Vec<String> = adapt(&document).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["do_it", "do_it_1", "do_it_2"]);
    }

    #[test]
    fn operation_level_parameter_overrides_path_level() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "parameters": [
                        {"name": "limit", "in": "query", "required": false,
                         "schema": {"type": "string"}, "description": "path-level"}
                    ],
                    "get": {
                        "operationId": "listPets",
                        "parameters": [
                            {"name": "limit", "in": "query", "required": true,
                             "schema": {"type": "integer"}, "description": "op-level"}
                        ],
                        "responses": {}
                    }
                }
            }
        }));
        let limit = &tool.operation.parameters[0];
        assert_eq!(limit.name, "limit");
        assert!(limit.required);
        assert_eq!(limit.descriptor, TypeDescriptor::Integer);
        assert_eq!(limit.description.as_deref(), Some("op-level"));
        assert_eq!(tool.operation.parameters.len(), 1);
    }

    #[test]
    fn body_parameter_prefers_json_content_and_extension_name() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/xml": {"schema": {"type": "string"}},
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "x-body-name": "pet",
                                        "properties": {"name": {"type": "string"}}
                                    }
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            }
        }));
        let body = tool
            .operation
            .parameters
            .iter()
            .find(|p| p.location == ParamLocation::Body)
            .unwrap();
        assert_eq!(body.name, "pet");
        assert!(body.required);
        assert!(matches!(body.descriptor, TypeDescriptor::Object { .. }));
        assert_eq!(
            tool.operation.consumes,
            vec!["application/xml", "application/json"]
        );
    }

    #[test]
    fn body_parameter_defaults_to_request_body_name() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/upload": {
                    "post": {
                        "operationId": "upload",
                        "requestBody": {
                            "content": {
                                "application/octet-stream": {
                                    "schema": {"type": "string", "format": "binary"}
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            }
        }));
        let body = &tool.operation.parameters[0];
        assert_eq!(body.name, "requestBody");
        assert!(!body.required);
        assert_eq!(tool.operation.consumes, vec!["application/octet-stream"]);
    }

    #[test]
    fn unusable_body_is_skipped_without_failing() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "requestBody": {"content": {}},
                        "responses": {}
                    }
                }
            }
        }));
        assert!(tool.operation.parameters.is_empty());
    }

    #[test]
    fn unresolved_parameter_reference_is_skipped() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "parameters": [
                            {"$ref": "#/components/parameters/Gone"},
                            {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                        ],
                        "responses": {}
                    }
                }
            }
        }));
        assert_eq!(tool.operation.parameters.len(), 1);
        assert_eq!(tool.operation.parameters[0].name, "limit");
    }

    #[test]
    fn produces_unions_2xx_and_falls_back_to_default() {
        let tool = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "responses": {
                            "200": {"content": {"application/json": {}, "text/csv": {}}},
                            "201": {"content": {"application/json": {}}},
                            "404": {"content": {"text/plain": {}}}
                        }
                    }
                }
            }
        }));
        assert_eq!(tool.operation.produces, vec!["application/json", "text/csv"]);

        let fallback = single_tool(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "responses": {
                            "default": {"content": {"application/xml": {}}}
                        }
                    }
                }
            }
        }));
        assert_eq!(fallback.operation.produces, vec!["application/xml"]);
    }

    #[test]
    fn swagger2_body_parameter_and_declared_arrays() {
        let tool = single_tool(json!({
            "swagger": "2.0",
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "consumes": ["application/json"],
                        "produces": ["application/json"],
                        "parameters": [
                            {"name": "body", "in": "body", "required": true,
                             "schema": {"type": "object", "properties": {"name": {"type": "string"}}}},
                            {"name": "verbose", "in": "query", "type": "boolean"}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        assert_eq!(tool.operation.consumes, vec!["application/json"]);
        assert_eq!(tool.operation.produces, vec!["application/json"]);

        let body = tool
            .operation
            .parameters
            .iter()
            .find(|p| p.location == ParamLocation::Body)
            .unwrap();
        assert_eq!(body.name, "body");
        // Swagger 2.0 inline parameter typing, no nested `schema` key.
        let verbose = tool
            .operation
            .parameters
            .iter()
            .find(|p| p.name == "verbose")
            .unwrap();
        assert_eq!(verbose.descriptor, TypeDescriptor::Boolean);
    }

    #[test]
    fn path_items_without_operations_yield_nothing() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "parameters": [
                        {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                    ]
                }
            }
        });
        assert!(adapt(&document).is_empty());
    }

    #[test]
    fn missing_paths_container_yields_empty_list() {
        assert!(adapt(&json!({"openapi": "3.0.0"})).is_empty());
    }

    #[test]
    fn all_verbs_are_recognized() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {
                "/x": {
                    "get": {"responses": {}}, "put": {"responses": {}},
                    "post": {"responses": {}}, "delete": {"responses": {}},
                    "options": {"responses": {}}, "head": {"responses": {}},
                    "patch": {"responses": {}}, "trace": {"responses": {}},
                    "summary": "not a verb"
                }
            }
        });
        assert_eq!(adapt(&document).len(), 8);
    }
}
