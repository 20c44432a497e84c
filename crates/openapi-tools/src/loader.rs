//! Specification loading and `$ref` dereferencing.
//!
//! The loader reads an OpenAPI 2.0 or 3.x document (JSON or YAML) from disk and
//! returns it fully dereferenced: every `$ref` is replaced by the value it
//! points at. Supported reference forms:
//!
//! - Local refs (`#/components/schemas/Pet`)
//! - Relative file refs (`./common.yaml#/components/parameters/QParam`)
//!
//! Key detail: `$ref` resolution is relative to the document that contains the
//! `$ref`, so nested references across files resolve correctly. Cyclic
//! references are a hard error since downstream adaptation assumes a finite
//! tree.

use crate::error::{BridgeError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read, parse, and fully dereference a spec file.
///
/// JSON is a valid subset of YAML, so a single YAML parse covers both formats.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, if a reference
/// cannot be resolved, or if the reference graph contains a cycle.
pub fn load_spec(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| BridgeError::SpecRead {
        path: path.display().to_string(),
        source: e,
    })?;
    let root: Value = serde_yaml::from_str(&content).map_err(|e| BridgeError::SpecParse {
        path: path.display().to_string(),
        source: e,
    })?;

    let root_path = canonicalize_best_effort(path.to_path_buf());
    let mut derefer = Dereferencer::default();
    derefer.docs.insert(root_path.clone(), root.clone());
    derefer.expand(&root, &root_path, &mut Vec::new())
}

/// Derive the upstream API base URL from a dereferenced document.
///
/// Swagger 2.0: `scheme://host/basePath`, preferring `https` when offered,
/// else the first declared scheme, else `http`. Without `host` there is no
/// base URL and calls will fail configuration validation.
///
/// OpenAPI 3.x: the first `servers` entry; additional servers are ignored.
#[must_use]
pub fn derive_base_url(spec: &Value) -> Option<String> {
    if spec.get("swagger").is_some() {
        let host = spec.get("host").and_then(Value::as_str)?;
        let schemes: Vec<&str> = spec
            .get("schemes")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let scheme = if schemes.contains(&"https") {
            "https"
        } else {
            schemes.first().copied().unwrap_or("http")
        };
        let base_path = spec.get("basePath").and_then(Value::as_str).unwrap_or("");
        return Some(format!("{scheme}://{host}{base_path}"));
    }

    spec.get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|s| s.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn canonicalize_best_effort(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

#[derive(Default)]
struct Dereferencer {
    docs: HashMap<PathBuf, Value>,
}

impl Dereferencer {
    /// Recursively inline every `$ref` reachable from `value`.
    ///
    /// `active` is the stack of reference keys currently being expanded; seeing
    /// the same key twice means the document is cyclic.
    fn expand(&mut self, value: &Value, doc: &Path, active: &mut Vec<String>) -> Result<Value> {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    let reference = reference.to_string();
                    return self.expand_ref(&reference, doc, active);
                }
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.expand(v, doc, active)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for v in items {
                    out.push(self.expand(v, doc, active)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn expand_ref(&mut self, reference: &str, doc: &Path, active: &mut Vec<String>) -> Result<Value> {
        let (target_doc, pointer) = parse_ref(reference, doc)?;
        let key = format!("{}#{}", target_doc.display(), pointer.as_deref().unwrap_or(""));

        if active.contains(&key) {
            return Err(BridgeError::SpecLoad(format!(
                "Cyclic $ref detected while resolving '{reference}'"
            )));
        }

        let doc_value = self.load_doc(&target_doc)?;
        let selected = match &pointer {
            Some(ptr) => doc_value.pointer(ptr).cloned().ok_or_else(|| {
                BridgeError::SpecLoad(format!(
                    "Unresolved $ref '{}' (missing pointer '{}' in {})",
                    reference,
                    ptr,
                    target_doc.display()
                ))
            })?,
            None => doc_value,
        };

        active.push(key);
        let expanded = self.expand(&selected, &target_doc, active);
        active.pop();
        expanded
    }

    fn load_doc(&mut self, path: &Path) -> Result<Value> {
        if let Some(v) = self.docs.get(path) {
            return Ok(v.clone());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::SpecLoad(format!(
                "Failed to read referenced file {}: {e}",
                path.display()
            ))
        })?;
        let parsed: Value = serde_yaml::from_str(&content).map_err(|e| {
            BridgeError::SpecLoad(format!(
                "Failed to parse referenced document {}: {e}",
                path.display()
            ))
        })?;
        self.docs.insert(path.to_path_buf(), parsed.clone());
        Ok(parsed)
    }
}

/// Split a `$ref` into the document it targets and an optional JSON pointer.
fn parse_ref(reference: &str, current_doc: &Path) -> Result<(PathBuf, Option<String>)> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Err(BridgeError::SpecLoad(format!(
            "URL $refs are not supported: {reference}"
        )));
    }

    if let Some(frag) = reference.strip_prefix('#') {
        let ptr = parse_fragment(frag, reference)?;
        return Ok((current_doc.to_path_buf(), ptr));
    }

    let (doc_part, frag_part) = match reference.split_once('#') {
        Some((d, f)) => (d, Some(f)),
        None => (reference, None),
    };

    let resolved = if Path::new(doc_part).is_absolute() {
        PathBuf::from(doc_part)
    } else {
        current_doc
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(doc_part)
    };
    let resolved = canonicalize_best_effort(resolved);

    let ptr = match frag_part {
        Some("") | None => None,
        Some(frag) => parse_fragment(frag, reference)?,
    };

    Ok((resolved, ptr))
}

fn parse_fragment(frag: &str, reference: &str) -> Result<Option<String>> {
    if frag.is_empty() {
        Ok(None)
    } else if frag.starts_with('/') {
        Ok(Some(frag.to_string()))
    } else {
        Err(BridgeError::SpecLoad(format!(
            "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}"
        )))
    }
}
