//! SQL Gateway MCP Library
//!
//! Exposes a relational database (PostgreSQL, SQL Server or SQLite) as three read-only
//! tools: list tables, preview a table, run a SELECT query. Every call opens
//! its own short-lived connection and returns a uniform `{columns, rows}`
//! result in which every cell is a string or null.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use sql_gateway_mcp::{ConnectionDescriptor, DataAccessGateway, GatewayOptions};
//!
//! let descriptor = ConnectionDescriptor::new("postgres://app@localhost/app")?;
//! let gateway = DataAccessGateway::new(&descriptor, GatewayOptions::default())?;
//! let tables = gateway.list_tables().await?;
//! let preview = gateway.preview_table("public.users", 5).await?;
//! ```
//!
//! # Known limitations
//!
//! Table names are interpolated into the preview statement without quoting,
//! and the default read-only guard is a prefix check on the SQL text. Both
//! can be tightened through the `[guard]` config section.

pub mod config;
pub mod connectors;
pub mod descriptor;
pub mod gateway;
pub mod guard;
pub mod params;
pub mod server;
pub mod types;

// Re-export main server type
pub use server::SqlGatewayMcpServer;

pub use config::GatewayConfig;
pub use descriptor::ConnectionDescriptor;
pub use gateway::{DataAccessGateway, GatewayOptions, DEFAULT_PREVIEW_ROWS};
pub use types::{GatewayError, Row, TabularResult};

// Re-export parameter types for direct API usage
pub use params::*;
