//! MCP Host - the runtime around an MCP server
//!
//! Everything a server needs besides its own tools:
//!
//! - **Serving**: [`serve_stdio`] and [`serve_http`] run a server over the
//!   stdio or streamable-HTTP transport until shutdown
//! - **Tracing**: [`init_tracing`] sets up stderr logging
//! - **Results**: [`json_success`] turns serializable data into a `CallToolResult`
//! - **Errors**: [`IntoMcpError`] maps domain errors onto MCP error codes
//! - **Embedding**: [`EmbeddableMcp`] for in-process execution
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_host::{init_tracing, serve_stdio};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_tracing("my_mcp")?;
//!     serve_stdio(MyServer::try_new()?).await
//! }
//! ```

pub mod embeddable;
pub mod error;
pub mod init;
pub mod result;
pub mod transport;

// Re-export commonly used items at crate root
pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{IntoMcpError, McpResult, ResultExt};
pub use init::init_tracing;
pub use result::json_success;
pub use transport::{serve_http, serve_stdio, Transport};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};

// Re-export async_trait for implementing EmbeddableMcp
pub use async_trait::async_trait;
