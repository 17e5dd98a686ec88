//! Database connectors
//!
//! PostgreSQL goes through sqlx and SQL Server through tiberius, both on the
//! async runtime. SQLite goes through rusqlite on the blocking pool.

mod pg_text;
mod postgres;
mod sqlite;
mod sqlserver;
mod traits;

use std::fmt::Write;
use std::sync::Arc;

use crate::descriptor::{Backend, ConnectionDescriptor};
use crate::types::GatewayError;

pub use postgres::PostgresConnector;
pub use sqlite::SqliteConnector;
pub use sqlserver::SqlServerConnector;
pub use traits::Connector;

/// Build the connector a descriptor points at; no I/O happens here
///
/// Fails with [`GatewayError::Configuration`] when the backend rejects the
/// connection string's syntax.
pub fn connector_for(descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Connector>, GatewayError> {
    Ok(match descriptor.backend() {
        Backend::Postgres => Arc::new(PostgresConnector::new(descriptor.as_str())),
        Backend::SqlServer => Arc::new(SqlServerConnector::new(descriptor.as_str())?),
        Backend::Sqlite { path } => Arc::new(SqliteConnector::new(path.clone())),
    })
}

/// Floats as Rust prints them, except non-finite values which use the SQL
/// spellings `NaN`, `Infinity` and `-Infinity`
pub(crate) fn float_text(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        value.to_string()
    }
}

/// Render bytes as `0x` plus upper-case hex
pub(crate) fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
