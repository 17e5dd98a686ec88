//! Data access gateway
//!
//! Turns each of the three operations into one database round trip:
//! validate arguments, open a connection, execute, drain rows, close.
//! Nothing but the connector (and through it the descriptor) is shared
//! between calls, so any number of operations may run concurrently.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{GatewayConfig, GuardConfig};
use crate::connectors::{connector_for, Connector};
use crate::descriptor::ConnectionDescriptor;
use crate::guard::QueryGuard;
use crate::types::{GatewayError, Statement, TabularResult};

/// Rows returned by a preview when the caller asks for none or fewer
pub const DEFAULT_PREVIEW_ROWS: i64 = 20;

/// Settings besides the descriptor
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub guard: GuardConfig,
    /// Upper bound for one round trip; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            guard: GuardConfig::default(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// The three read operations over one database
#[derive(Clone)]
pub struct DataAccessGateway {
    connector: Arc<dyn Connector>,
    guard: QueryGuard,
    timeout: Option<Duration>,
}

impl DataAccessGateway {
    /// Configure a gateway for the database `descriptor` points at
    ///
    /// No connection is opened here; each operation opens its own.
    pub fn new(
        descriptor: &ConnectionDescriptor,
        options: GatewayOptions,
    ) -> Result<Self, GatewayError> {
        tracing::info!("Configuring gateway for {}", descriptor);
        Self::with_connector(connector_for(descriptor)?, options)
    }

    /// Configure from a loaded config; fails if no connection string is set
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let descriptor = config.descriptor()?;
        Self::new(
            &descriptor,
            GatewayOptions {
                guard: config.guard,
                timeout: config.timeout(),
            },
        )
    }

    /// Build a gateway around an existing connector
    pub fn with_connector(
        connector: Arc<dyn Connector>,
        options: GatewayOptions,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            connector,
            guard: QueryGuard::new(&options.guard)?,
            timeout: options.timeout,
        })
    }

    pub fn guard(&self) -> &QueryGuard {
        &self.guard
    }

    /// Every base table as `schema.table`, sorted by schema then name
    pub async fn list_tables(&self) -> Result<Vec<String>, GatewayError> {
        tracing::debug!("Listing tables");

        let result = self
            .round_trip("list_tables", self.connector.list_tables_statement())
            .await?;

        result
            .into_rows()
            .into_iter()
            .map(|row| {
                row.values().first().cloned().flatten().ok_or_else(|| {
                    GatewayError::Query("catalog returned a row without a table name".to_string())
                })
            })
            .collect()
    }

    /// Up to `top` rows of `table` in whatever order the engine returns them
    ///
    /// `top <= 0` means [`DEFAULT_PREVIEW_ROWS`]. The table name is placed
    /// into the SQL text as given; only the row count is a bound parameter.
    pub async fn preview_table(&self, table: &str, top: i64) -> Result<TabularResult, GatewayError> {
        self.guard.check_table_name(table)?;

        let limit = if top <= 0 { DEFAULT_PREVIEW_ROWS } else { top };
        tracing::debug!(table, limit, "Previewing table");

        self.round_trip("preview_table", self.connector.preview_statement(table, limit))
            .await
    }

    /// Execute a read-only query verbatim
    ///
    /// The guard runs first; a rejected query never opens a connection.
    pub async fn run_query(&self, sql: &str) -> Result<TabularResult, GatewayError> {
        self.guard.check_query(sql)?;

        tracing::debug!("Running query");

        self.round_trip("run_query", Statement::new(sql)).await
    }

    async fn round_trip(
        &self,
        operation: &'static str,
        statement: Statement,
    ) -> Result<TabularResult, GatewayError> {
        let fetch = self.connector.fetch(&statement);

        // Timing out drops `fetch`, which abandons the round trip and closes
        // its connection
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Query(format!(
                    "statement timed out after {:?}",
                    limit
                ))),
            },
            None => fetch.await,
        };

        match &result {
            Ok(table) => tracing::debug!(
                operation,
                connector = self.connector.connector_type(),
                rows = table.rows().len(),
                "Round trip complete"
            ),
            Err(e) => tracing::warn!(
                operation,
                connector = self.connector.connector_type(),
                "Round trip failed: {}",
                e
            ),
        }

        result
    }
}
