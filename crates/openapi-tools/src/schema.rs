//! Schema-node to type-descriptor mapping.
//!
//! [`map_schema`] is pure and total: any shape it does not recognize degrades
//! to [`TypeDescriptor::Any`] instead of failing, so API evolution never
//! breaks tool generation. Call sites that care can still match on `Any`
//! explicitly.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})?$").unwrap()
});

/// Typing of keys an object accepts beyond its declared properties.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraProperties {
    /// Unknown keys are rejected.
    Closed,
    /// Unknown keys carry any value.
    Any,
    /// Unknown keys must match the given descriptor.
    Schema(Box<TypeDescriptor>),
}

/// A validating representation of one schema node.
///
/// Descriptors validate invocation arguments before execution and render the
/// JSON-Schema input shape published to MCP clients.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Closed set of string literals.
    Enum(Vec<String>),
    /// ISO-8601 date-time string.
    DateTime,
    /// ISO-8601 date string.
    Date,
    /// Base64-encoded string.
    Base64,
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<TypeDescriptor>),
    /// Record with named properties. `extra` governs undeclared keys.
    Object {
        properties: Vec<(String, TypeDescriptor)>,
        extra: ExtraProperties,
    },
    /// Open string-to-anything mapping.
    Map,
    /// Accepts any value. Produced for unsupported shapes, missing schemas,
    /// and `format: binary` strings (binary handling happens at execution
    /// time, not validation time).
    Any,
}

/// Map a schema node to its type descriptor.
///
/// The precedence order matters: `enum` wins over `format`, `format` over the
/// bare `type`, and object shapes are distinguished by the presence of
/// `properties` and `additionalProperties`.
#[must_use]
pub fn map_schema(schema: &Value) -> TypeDescriptor {
    let Some(map) = schema.as_object() else {
        return TypeDescriptor::Any;
    };

    if let Some(variants) = map.get("enum").and_then(Value::as_array) {
        let literals: Vec<String> = variants
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !literals.is_empty() {
            return TypeDescriptor::Enum(literals);
        }
    }

    let ty = map.get("type").and_then(Value::as_str);
    let format = map.get("format").and_then(Value::as_str);

    match ty {
        Some("string") => match format {
            Some("date-time") => TypeDescriptor::DateTime,
            Some("date") => TypeDescriptor::Date,
            Some("byte") => TypeDescriptor::Base64,
            Some("binary") => TypeDescriptor::Any,
            _ => TypeDescriptor::String,
        },
        Some("integer") => TypeDescriptor::Integer,
        Some("number") => TypeDescriptor::Number,
        Some("boolean") => TypeDescriptor::Boolean,
        Some("array") => match map.get("items") {
            Some(items) => TypeDescriptor::Array(Box::new(map_schema(items))),
            None => TypeDescriptor::Any,
        },
        Some("object") | None if map.contains_key("properties") => {
            let properties = map
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| {
                    props
                        .iter()
                        .map(|(name, node)| (name.clone(), map_schema(node)))
                        .collect()
                })
                .unwrap_or_default();
            TypeDescriptor::Object {
                properties,
                extra: extra_properties(map.get("additionalProperties")),
            }
        }
        Some("object") => match map.get("additionalProperties") {
            Some(_) => TypeDescriptor::Map,
            None => TypeDescriptor::Object {
                properties: Vec::new(),
                extra: ExtraProperties::Closed,
            },
        },
        _ => TypeDescriptor::Any,
    }
}

fn extra_properties(additional: Option<&Value>) -> ExtraProperties {
    match additional {
        Some(Value::Bool(true)) => ExtraProperties::Any,
        Some(node @ Value::Object(_)) => ExtraProperties::Schema(Box::new(map_schema(node))),
        _ => ExtraProperties::Closed,
    }
}

impl TypeDescriptor {
    /// Check a value against this descriptor.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first mismatch found.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            TypeDescriptor::Enum(literals) => match value.as_str() {
                Some(s) if literals.iter().any(|l| l == s) => Ok(()),
                Some(s) => Err(format!(
                    "'{s}' is not one of the allowed values [{}]",
                    literals.join(", ")
                )),
                None => Err(format!("expected one of [{}]", literals.join(", "))),
            },
            TypeDescriptor::DateTime => match value.as_str() {
                Some(s) if DATE_TIME_RE.is_match(s) => Ok(()),
                _ => Err("expected an ISO-8601 date-time string".to_string()),
            },
            TypeDescriptor::Date => match value.as_str() {
                Some(s) if DATE_RE.is_match(s) => Ok(()),
                _ => Err("expected an ISO-8601 date string (YYYY-MM-DD)".to_string()),
            },
            TypeDescriptor::Base64 => match value.as_str() {
                Some(s) if BASE64.decode(s).is_ok() => Ok(()),
                _ => Err("expected a base64-encoded string".to_string()),
            },
            TypeDescriptor::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err("expected a string".to_string())
                }
            }
            TypeDescriptor::Integer => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err("expected an integer".to_string())
                }
            }
            TypeDescriptor::Number => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err("expected a number".to_string())
                }
            }
            TypeDescriptor::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err("expected a boolean".to_string())
                }
            }
            TypeDescriptor::Array(element) => match value.as_array() {
                Some(items) => {
                    for (index, item) in items.iter().enumerate() {
                        element
                            .validate(item)
                            .map_err(|e| format!("element {index}: {e}"))?;
                    }
                    Ok(())
                }
                None => Err("expected an array".to_string()),
            },
            TypeDescriptor::Object { properties, extra } => match value.as_object() {
                Some(fields) => {
                    for (key, field) in fields {
                        match properties.iter().find(|(name, _)| name == key) {
                            Some((_, descriptor)) => descriptor
                                .validate(field)
                                .map_err(|e| format!("property '{key}': {e}"))?,
                            None => match extra {
                                ExtraProperties::Closed => {
                                    return Err(format!("unexpected property '{key}'"));
                                }
                                ExtraProperties::Any => {}
                                ExtraProperties::Schema(descriptor) => descriptor
                                    .validate(field)
                                    .map_err(|e| format!("property '{key}': {e}"))?,
                            },
                        }
                    }
                    Ok(())
                }
                None => Err("expected an object".to_string()),
            },
            TypeDescriptor::Map => {
                if value.is_object() {
                    Ok(())
                } else {
                    Err("expected an object".to_string())
                }
            }
            TypeDescriptor::Any => Ok(()),
        }
    }

    /// Render this descriptor as a JSON-Schema fragment.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        match self {
            TypeDescriptor::Enum(literals) => json!({"type": "string", "enum": literals}),
            TypeDescriptor::DateTime => json!({"type": "string", "format": "date-time"}),
            TypeDescriptor::Date => json!({"type": "string", "format": "date"}),
            TypeDescriptor::Base64 => json!({"type": "string", "format": "byte"}),
            TypeDescriptor::String => json!({"type": "string"}),
            TypeDescriptor::Integer => json!({"type": "integer"}),
            TypeDescriptor::Number => json!({"type": "number"}),
            TypeDescriptor::Boolean => json!({"type": "boolean"}),
            TypeDescriptor::Array(element) => {
                json!({"type": "array", "items": element.json_schema()})
            }
            TypeDescriptor::Object { properties, extra } => {
                let mut props = serde_json::Map::new();
                for (name, descriptor) in properties {
                    props.insert(name.clone(), descriptor.json_schema());
                }
                let additional = match extra {
                    ExtraProperties::Closed => json!(false),
                    ExtraProperties::Any => json!(true),
                    ExtraProperties::Schema(descriptor) => descriptor.json_schema(),
                };
                json!({"type": "object", "properties": props, "additionalProperties": additional})
            }
            TypeDescriptor::Map => json!({"type": "object", "additionalProperties": true}),
            TypeDescriptor::Any => json!({}),
        }
    }
}
