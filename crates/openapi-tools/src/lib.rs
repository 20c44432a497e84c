//! OpenAPI -> MCP tooling.
//!
//! This crate turns a dereferenced OpenAPI (2.0 or 3.x) document into a set of
//! callable MCP tools and proxies tool invocations to the underlying HTTP API:
//!
//! - [`loader`] reads and fully dereferences a spec file and derives the API
//!   base URL.
//! - [`schema`] maps schema nodes to validating [`schema::TypeDescriptor`]s.
//! - [`adapter`] walks the path/method matrix and produces
//!   [`adapter::ToolDefinition`]s.
//! - [`executor`] builds and sends one outbound HTTP request per invocation.
//! - [`registry`] holds the immutable tool table and bridges invocations to
//!   the executor.
//!
//! It intentionally contains **no** transport or session logic; serving the
//! tools over MCP is the `specbridge-server` binary's job.

pub mod adapter;
pub mod error;
pub mod executor;
pub mod loader;
pub mod registry;
pub mod schema;
