//! Error types for `specbridge-openapi-tools`.

use thiserror::Error;

/// Main error type for the OpenAPI bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Spec load errors (unreadable, invalid, or cyclic document). Fatal at startup.
    #[error("Spec load error: {0}")]
    SpecLoad(String),

    #[error("Spec load error: failed to read '{path}': {source}")]
    SpecRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Spec load error: failed to parse '{path}': {source}")]
    SpecParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Configuration errors (no resolvable base URL at call time).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required parameter was absent from the invocation arguments.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// An invocation argument failed type validation against the tool's parameter shape.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Upstream network failure or non-success status. `detail` always names the
    /// status (`Status: 404` / `Status: N/A`) plus a best-effort body rendering.
    #[error("API call failed. {detail}")]
    ApiCall {
        status: Option<u16>,
        detail: String,
    },

    /// Runtime errors (unknown tool, invalid URL).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
