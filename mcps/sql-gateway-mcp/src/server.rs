//! MCP Server implementation for the SQL gateway
//!
//! Exposes the gateway's three operations as tools. Results are returned as
//! pretty-printed JSON text; gateway errors map onto MCP error codes through
//! `IntoMcpError`.

use mcp_host::{
    async_trait, json_success, CallToolResult, EmbeddableError, EmbeddableMcp, EmbeddableResult,
    McpError, ResultExt, Tool,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::gateway::{DataAccessGateway, DEFAULT_PREVIEW_ROWS};
use crate::guard::SqlGuardMode;
use crate::params::*;
use crate::types::GatewayError;

const SERVER_DESCRIPTION: &str = "SQL database gateway MCP server. \
    Use sql_list_tables to discover tables, sql_preview_table to sample rows \
    from one table, and sql_run_query to run a read-only SELECT query.";

/// The SQL Gateway MCP Server
#[derive(Clone)]
pub struct SqlGatewayMcpServer {
    gateway: DataAccessGateway,
    tool_router: ToolRouter<Self>,
}

impl SqlGatewayMcpServer {
    /// Wrap an already configured gateway
    pub fn new(gateway: DataAccessGateway) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    /// Configure the gateway from `config`; fails without a connection string
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(DataAccessGateway::from_config(config)?))
    }
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router]
impl SqlGatewayMcpServer {
    #[tool(description = "Lists user tables in the current database.")]
    async fn sql_list_tables(&self) -> Result<CallToolResult, McpError> {
        let tables = self.gateway.list_tables().await.to_mcp_err()?;
        json_success(&tables)
    }

    #[tool(description = "Returns up to `top` rows from the given table (schema-qualified).")]
    async fn sql_preview_table(
        &self,
        Parameters(params): Parameters<PreviewTableParams>,
    ) -> Result<CallToolResult, McpError> {
        let top = params.top.unwrap_or(DEFAULT_PREVIEW_ROWS);
        let result = self
            .gateway
            .preview_table(&params.table_name, top)
            .await
            .to_mcp_err()?;
        json_success(&result)
    }

    #[tool(description = "Executes a read-only SELECT query against the database and returns rows.")]
    async fn sql_run_query(
        &self,
        Parameters(params): Parameters<RunQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.gateway.run_query(&params.sql).await.to_mcp_err()?;
        json_success(&result)
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for SqlGatewayMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mode = match self.gateway.guard().sql_mode() {
            SqlGuardMode::Prefix => "prefix",
            SqlGuardMode::Strict => "strict",
        };
        ServerInfo {
            instructions: Some(format!(
                "{} Queries are checked with the {} read-only guard.",
                SERVER_DESCRIPTION, mode
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ============================================================================
// EmbeddableMcp Implementation
// ============================================================================

#[async_trait]
impl EmbeddableMcp for SqlGatewayMcpServer {
    fn server_name(&self) -> &str {
        "sql-gateway"
    }

    fn server_description(&self) -> Option<&str> {
        Some(SERVER_DESCRIPTION)
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            "sql_list_tables" => self.sql_list_tables().await.map_err(Into::into),

            "sql_preview_table" => {
                let params: PreviewTableParams = serde_json::from_value(params)?;
                self.sql_preview_table(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            "sql_run_query" => {
                let params: RunQueryParams = serde_json::from_value(params)?;
                self.sql_run_query(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
        }
    }
}
