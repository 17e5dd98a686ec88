//! Connector trait definition

use async_trait::async_trait;

use crate::types::{GatewayError, Statement, TabularResult};

/// One database backend behind the gateway
///
/// A connector holds no connection. Every [`fetch`](Connector::fetch) opens
/// its own, executes one statement, drains the rows and closes the
/// connection again, whether the call succeeds, fails or is dropped midway.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Run one statement in a fresh connection and collect every row
    ///
    /// Fails with [`GatewayError::Connection`] when the connection cannot be
    /// opened and [`GatewayError::Query`] for anything after that.
    async fn fetch(&self, statement: &Statement) -> Result<TabularResult, GatewayError>;

    /// Catalog query returning one `schema.table` column for every base table,
    /// sorted by schema then table name
    fn list_tables_statement(&self) -> Statement;

    /// `SELECT *` of the first `limit` rows of `table`, with `limit` bound
    ///
    /// `table` is interpolated as given.
    fn preview_statement(&self, table: &str, limit: i64) -> Statement;

    /// Short backend name for logs
    fn connector_type(&self) -> &'static str;
}
