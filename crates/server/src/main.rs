//! specbridge server binary.
//!
//! Loads an OpenAPI document, adapts its operations into MCP tools, and
//! serves them over streamable HTTP. Startup is a one-time blocking sequence;
//! no tool is invocable until loading and adaptation have fully completed.

mod service;

use anyhow::Context as _;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::json;
use service::BridgeService;
use specbridge_openapi_tools::registry::ToolRegistry;
use specbridge_openapi_tools::{adapter, loader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "specbridge-server", version, about = "Serve an OpenAPI document as MCP tools")]
struct Args {
    /// Path to the OpenAPI 2.0 or 3.x document (JSON or YAML).
    #[arg(long, env = "SPECBRIDGE_SPEC")]
    spec: PathBuf,

    /// Upstream API base URL; overrides the one derived from the document.
    #[arg(long, env = "SPECBRIDGE_BASE_URL")]
    base_url: Option<String>,

    /// Address to listen on.
    #[arg(long, env = "SPECBRIDGE_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Log filter in tracing `EnvFilter` syntax; `RUST_LOG` wins when set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let spec = loader::load_spec(&args.spec)
        .with_context(|| format!("failed to load spec from '{}'", args.spec.display()))?;
    info!(path = %args.spec.display(), "loaded and dereferenced spec");

    let base_url = args
        .base_url
        .clone()
        .or_else(|| loader::derive_base_url(&spec));
    match &base_url {
        Some(url) => info!(base_url = %url, "using upstream base URL"),
        None => warn!("no upstream base URL available, tool calls will fail until --base-url is set"),
    }

    let tools = adapter::adapt(&spec);
    info!(tools = tools.len(), "adapted operations into tools");
    let registry = Arc::new(ToolRegistry::new(tools, base_url));

    let mcp_service = StreamableHttpService::new(
        move || Ok(BridgeService::new(registry.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );

    let app = Router::new()
        .route("/health", get(health))
        .nest_service("/mcp", mcp_service);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %args.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
