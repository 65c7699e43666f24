//! Daemon entry point for the OHDSI WebAPI MCP server.
//!
//! Loads configuration from flags and the environment, then serves the MCP
//! tools (stdio and/or streamable HTTP) and the REST API until one exits.

mod client;
mod config;
mod logging;

use tokio::task::JoinSet;
use tracing::{info, warn};
use webapi_core::services::ENV_BASE_URL;
use webapi_http::{HttpServer, HttpServerConfig};
use webapi_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};

use crate::client::build_control_plane;
use crate::config::McpdConfig;
use crate::logging::init_tracing;

type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> ServeResult {
    let config = McpdConfig::from_args()?;
    init_tracing(&config.log_level, config.log_format);

    match config.webapi.base_url.as_deref() {
        Some(base_url) => info!(base_url, "using OHDSI WebAPI"),
        None => warn!("{ENV_BASE_URL} is not set; tools will fail until it is configured"),
    }
    let control = build_control_plane(config.webapi.clone())?;

    let mut servers: JoinSet<ServeResult> = JoinSet::new();
    if config.enable_stdio {
        servers.spawn(serve_stdio(control.clone()));
    }
    if config.mcp_serve {
        let mcp_config = McpHttpServerConfig::new(config.mcp_http_addr);
        servers.spawn(serve_streamable_http(control.clone(), mcp_config));
    }
    if config.http_serve {
        let server = HttpServer::new(control, HttpServerConfig::new(config.http_addr));
        servers.spawn(server.serve());
    }

    // The first surface to stop ends the process.
    if let Some(finished) = servers.join_next().await {
        finished??;
    }
    Ok(())
}
