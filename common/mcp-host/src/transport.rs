//! Serving an MCP server over stdio or streamable HTTP
//!
//! Both entry points run until the peer disconnects (stdio) or the process
//! receives Ctrl-C (HTTP).

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::{ServerHandler, ServiceExt};
use serde::{Deserialize, Serialize};

/// Path the streamable HTTP endpoint is mounted at
pub const MCP_PATH: &str = "/mcp";

/// Which transport a server speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// JSON-RPC over the process's stdin/stdout
    #[default]
    Stdio,
    /// MCP streamable HTTP
    Http,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Http => f.write_str("http"),
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(format!(
                "unknown transport '{}' (expected 'stdio' or 'http')",
                other
            )),
        }
    }
}

/// Serve `server` over stdio until the client disconnects
pub async fn serve_stdio<S>(server: S) -> anyhow::Result<()>
where
    S: ServerHandler,
{
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start stdio transport")?;

    tracing::info!("Server running on stdio, waiting for requests...");

    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}

/// Serve `server` over streamable HTTP at `bind` until Ctrl-C
///
/// Every MCP session gets its own clone of `server`.
pub async fn serve_http<S>(server: S, bind: SocketAddr) -> anyhow::Result<()>
where
    S: ServerHandler + Clone,
{
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let router = axum::Router::new().nest_service(MCP_PATH, service);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;

    tracing::info!("Server listening on http://{}{}", bind, MCP_PATH);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
