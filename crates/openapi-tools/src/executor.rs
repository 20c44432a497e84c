//! Outbound HTTP request execution.
//!
//! [`RequestExecutor`] turns one tool invocation into exactly one upstream
//! HTTP request. It holds no per-call state; concurrent invocations share the
//! same [`reqwest::Client`]. No retries, timeouts, or cancellation here: a
//! hung upstream blocks only the invocation that hit it.

use crate::adapter::{OperationSpec, ParamLocation};
use crate::error::{BridgeError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Tagged wrapper carrying non-JSON response bytes through the JSON-oriented
/// result channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryPayload {
    pub is_binary: bool,
    pub content_type: String,
    /// Base64 encoding of the exact response bytes.
    pub data: String,
}

/// Normalized outcome of one upstream call.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Json(Value),
    Binary(BinaryPayload),
}

enum RequestBody {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

pub struct RequestExecutor {
    client: reqwest::Client,
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Execute one operation against the upstream API.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Config`] when no base URL is available.
    /// - [`BridgeError::MissingParameter`] when a required argument is absent;
    ///   this aborts before any request is sent.
    /// - [`BridgeError::ApiCall`] for network failures and non-2xx statuses.
    pub async fn execute(
        &self,
        base_url: Option<&str>,
        operation: &OperationSpec,
        args: &serde_json::Map<String, Value>,
    ) -> Result<ExecutionResult> {
        let base_url = match base_url {
            Some(b) if !b.is_empty() => b,
            _ => {
                return Err(BridgeError::Config(
                    "no API base URL is configured".to_string(),
                ));
            }
        };

        let accept = operation
            .produces
            .first()
            .map_or("application/json", String::as_str)
            .to_string();
        let has_body_param = operation
            .parameters
            .iter()
            .any(|p| p.location == ParamLocation::Body);
        let mut content_type = has_body_param.then(|| {
            operation
                .consumes
                .first()
                .map_or("application/json", String::as_str)
                .to_string()
        });

        let mut path = operation.path.clone();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut cookies: Vec<String> = Vec::new();
        let mut body: Option<RequestBody> = None;

        for parameter in &operation.parameters {
            let Some(value) = args.get(&parameter.name) else {
                if parameter.required {
                    return Err(BridgeError::MissingParameter(parameter.name.clone()));
                }
                continue;
            };

            match parameter.location {
                ParamLocation::Path => {
                    let placeholder = format!("{{{}}}", parameter.name);
                    let encoded = encode_path_component(&value_to_string(value));
                    path = path.replace(&placeholder, &encoded);
                }
                ParamLocation::Query => {
                    query.push((parameter.name.clone(), value_to_string(value)));
                }
                ParamLocation::Header => {
                    headers.push((parameter.name.clone(), value_to_string(value)));
                }
                ParamLocation::Cookie => {
                    cookies.push(format!("{}={}", parameter.name, value_to_string(value)));
                }
                ParamLocation::Body => {
                    if is_binary_schema(&parameter.schema) {
                        content_type = Some("application/octet-stream".to_string());
                        body = Some(binary_body(&parameter.name, value));
                    } else {
                        body = Some(RequestBody::Json(value.clone()));
                    }
                }
            }
        }

        let url = join_url(base_url, &path);

        info!(method = %operation.method, url = %url, "dispatching upstream request");

        let mut request = self
            .client
            .request(operation.method.clone(), &url)
            .header(reqwest::header::ACCEPT, accept.as_str());
        if !query.is_empty() {
            request = request.query(&query);
        }
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !cookies.is_empty() {
            request = request.header(reqwest::header::COOKIE, cookies.join("; "));
        }
        if let Some(ct) = &content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct.as_str());
        }
        match body {
            Some(RequestBody::Json(v)) => {
                request = request.body(serde_json::to_vec(&v)?);
            }
            Some(RequestBody::Text(s)) => {
                request = request.body(s);
            }
            Some(RequestBody::Bytes(b)) => {
                request = request.body(b);
            }
            None => {}
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(method = %operation.method, url = %url, error = %e, "upstream request failed");
                return Err(BridgeError::ApiCall {
                    status: None,
                    detail: format!("Status: N/A. Error: {e}"),
                });
            }
        };

        let status = response.status();
        let response_content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if !status.is_success() {
            warn!(method = %operation.method, url = %url, status = status.as_u16(), "upstream returned an error status");
            let detail = if is_json_content_type(&response_content_type) {
                format!(
                    "Status: {}. Response body: {}",
                    status.as_u16(),
                    stringify_body(response).await
                )
            } else {
                format!(
                    "Status: {}. Content-Type: {response_content_type}",
                    status.as_u16()
                )
            };
            return Err(BridgeError::ApiCall {
                status: Some(status.as_u16()),
                detail,
            });
        }

        info!(method = %operation.method, url = %url, status = status.as_u16(), "upstream request succeeded");

        if json_response_mode(&accept) {
            let text = response.text().await.map_err(|e| BridgeError::ApiCall {
                status: Some(status.as_u16()),
                detail: format!("Status: {}. Error reading body: {e}", status.as_u16()),
            })?;
            if text.is_empty() {
                return Ok(ExecutionResult::Json(Value::Null));
            }
            // Upstreams occasionally mislabel plain-text bodies; pass them
            // through as a JSON string rather than failing the call.
            let parsed = serde_json::from_str(&text).unwrap_or(Value::String(text));
            Ok(ExecutionResult::Json(parsed))
        } else {
            let bytes = response.bytes().await.map_err(|e| BridgeError::ApiCall {
                status: Some(status.as_u16()),
                detail: format!("Status: {}. Error reading body: {e}", status.as_u16()),
            })?;
            Ok(ExecutionResult::Binary(BinaryPayload {
                is_binary: true,
                content_type: response_content_type,
                data: BASE64.encode(&bytes),
            }))
        }
    }
}

/// JSON mode when the effective Accept is json-ish or a wildcard; anything
/// else is treated as an opaque binary payload.
fn json_response_mode(accept: &str) -> bool {
    accept.is_empty() || accept.contains("json") || accept.contains("*/*")
}

/// Join base URL and operation path with exactly one `/`, trimming at most
/// one trailing slash from the base.
fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{base}/{path}")
}

/// True for `application/json` and any `+json` structured syntax.
fn is_json_content_type(content_type: &str) -> bool {
    content_type.parse::<mime::Mime>().is_ok_and(|m| {
        m.subtype() == mime::JSON || m.suffix().is_some_and(|s| s == mime::JSON)
    })
}

fn is_binary_schema(schema: &Value) -> bool {
    schema.get("format").and_then(Value::as_str) == Some("binary")
}

/// Prepare a binary body. Textual values are assumed to be base64; a value
/// that fails to decode is sent unchanged rather than failing the call.
fn binary_body(name: &str, value: &Value) -> RequestBody {
    match value.as_str() {
        Some(text) => match BASE64.decode(text) {
            Ok(bytes) => {
                debug!(parameter = %name, bytes = bytes.len(), "decoded base64 body parameter");
                RequestBody::Bytes(bytes)
            }
            Err(e) => {
                warn!(parameter = %name, error = %e, "body value is not valid base64, sending original text");
                RequestBody::Text(text.to_string())
            }
        },
        None => RequestBody::Json(value.clone()),
    }
}

async fn stringify_body(response: reqwest::Response) -> String {
    const MARKER: &str = "could not stringify response body";
    let Ok(text) = response.text().await else {
        return MARKER.to_string();
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(parsed) => serde_json::to_string(&parsed).unwrap_or_else(|_| MARKER.to_string()),
        Err(_) => MARKER.to_string(),
    }
}

/// Convert a JSON value to its string form for URL and header placement.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Percent-encode a path segment, keeping only RFC 3986 unreserved bytes.
fn encode_path_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_components_are_percent_encoded() {
        assert_eq!(encode_path_component("plain-id_1.2~x"), "plain-id_1.2~x");
        assert_eq!(encode_path_component("a/b c"), "a%2Fb%20c");
        assert_eq!(encode_path_component("100%"), "100%25");
    }

    #[test]
    fn value_to_string_covers_scalars_and_structures() {
        assert_eq!(value_to_string(&json!("x")), "x");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn json_mode_detection() {
        assert!(json_response_mode("application/json"));
        assert!(json_response_mode("application/problem+json"));
        assert!(json_response_mode("*/*"));
        assert!(json_response_mode(""));
        assert!(!json_response_mode("image/png"));
        assert!(!json_response_mode("text/csv"));
    }

    #[test]
    fn url_join_trims_at_most_one_slash() {
        assert_eq!(join_url("http://h/v1", "/pets"), "http://h/v1/pets");
        assert_eq!(join_url("http://h/v1/", "/pets"), "http://h/v1/pets");
        assert_eq!(join_url("http://h/v1", "pets"), "http://h/v1/pets");
        // Only one trailing slash comes off the base.
        assert_eq!(join_url("http://h/v1//", "/pets"), "http://h/v1//pets");
    }

    #[test]
    fn json_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/html"));
        assert!(!is_json_content_type("not a mime type"));
    }

    #[test]
    fn binary_schema_detection() {
        assert!(is_binary_schema(
            &json!({"type": "string", "format": "binary"})
        ));
        assert!(!is_binary_schema(
            &json!({"type": "string", "format": "byte"})
        ));
        assert!(!is_binary_schema(&json!({"type": "string"})));
    }
}
