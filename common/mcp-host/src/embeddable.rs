//! In-process execution of MCP servers
//!
//! An orchestrator that links a server crate directly can call its tools
//! through [`EmbeddableMcp`] without spawning a process or opening a
//! transport.
//!
//! ```rust,ignore
//! use mcp_host::EmbeddableMcp;
//!
//! let tools = server.list_tools();
//! let result = server.call_tool("sql_list_tables", serde_json::json!({})).await?;
//! ```

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;

/// Error type for embedded tool calls
#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    /// No tool with this name
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments did not deserialize into the tool's parameter type
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] serde_json::Error),

    /// The tool ran and returned an MCP error
    #[error("mcp error: {0}")]
    McpError(String),
}

impl From<rmcp::ErrorData> for EmbeddableError {
    fn from(err: rmcp::ErrorData) -> Self {
        EmbeddableError::McpError(err.message.to_string())
    }
}

/// Result type for embedded tool calls
pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// An MCP server callable in-process
///
/// Implementations must be `Send + Sync`; concurrent calls from several tasks
/// are expected. Servers built on rmcp's `#[tool_router]` usually delegate
/// `list_tools` to `self.tool_router.list_all()` and dispatch `call_tool` on
/// the tool name.
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Name used to identify the server in MCP configuration
    fn server_name(&self) -> &str;

    /// All tools with their names, descriptions and input schemas
    fn list_tools(&self) -> Vec<Tool>;

    /// Execute the tool `name` with JSON-object arguments
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    /// Human-readable summary of the server
    fn server_description(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoServer;

    #[async_trait]
    impl EmbeddableMcp for EchoServer {
        fn server_name(&self) -> &str {
            "echo"
        }

        fn list_tools(&self) -> Vec<Tool> {
            vec![]
        }

        async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
            match name {
                "echo" => {
                    let text: String = serde_json::from_value(params)?;
                    Ok(crate::json_success(&text)?)
                }
                _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let result = EchoServer.call_tool("unknown", serde_json::json!({})).await;
        assert!(matches!(result, Err(EmbeddableError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_bad_params_are_invalid_params() {
        let result = EchoServer.call_tool("echo", serde_json::json!(42)).await;
        assert!(matches!(result, Err(EmbeddableError::InvalidParams(_))));
    }

    #[test]
    fn test_default_description() {
        assert_eq!(EchoServer.server_name(), "echo");
        assert!(EchoServer.server_description().is_none());
    }
}
