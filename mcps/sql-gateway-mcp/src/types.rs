//! Type definitions for the SQL gateway

use std::sync::Arc;

use mcp_host::{IntoMcpError, McpError};
use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};
use thiserror::Error;

// ============================================================================
// Statements
// ============================================================================

/// A single SQL statement plus its bound integer parameters
///
/// Parameters are positional (`$1` on PostgreSQL, `?1` on SQLite).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<i64>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a positional parameter
    pub fn bind(mut self, value: i64) -> Self {
        self.params.push(value);
        self
    }
}

// ============================================================================
// Tabular Results
// ============================================================================

/// The uniform `{columns, rows}` shape every read operation returns
///
/// Column order is the order of the result set; rows keep the order the
/// database returned them in. Every row holds exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl TabularResult {
    /// Start a result with the given column list and no rows
    pub fn builder(columns: Vec<String>) -> TabularResultBuilder {
        TabularResultBuilder {
            shared: columns.clone().into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Serialize for TabularResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TabularResult", 2)?;
        state.serialize_field("columns", &self.columns)?;
        state.serialize_field("rows", &self.rows)?;
        state.end()
    }
}

/// Accumulates rows for a [`TabularResult`]
#[derive(Debug)]
pub struct TabularResultBuilder {
    columns: Vec<String>,
    shared: Arc<[String]>,
    rows: Vec<Row>,
}

impl TabularResultBuilder {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Append a row; `values` must line up with the column list
    pub fn push_row(&mut self, values: Vec<Option<String>>) -> Result<(), GatewayError> {
        if values.len() != self.columns.len() {
            return Err(GatewayError::Query(format!(
                "row has {} values but the result has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(Row {
            columns: Arc::clone(&self.shared),
            values,
        });
        Ok(())
    }

    pub fn build(self) -> TabularResult {
        TabularResult {
            columns: self.columns,
            rows: self.rows,
        }
    }
}

/// One result row: a mapping from column name to a nullable string
///
/// Lookups by name ignore ASCII case. Cells are stored in column order, so a
/// result with two columns that differ only by case still keeps both values;
/// a lookup then returns the first matching column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Number of cells, always equal to the column count
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a cell by column name, ignoring case
    ///
    /// Returns `None` when no such column exists and `Some(None)` for a NULL.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .map(|idx| self.values[idx].as_deref())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Cells in column order
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// `(column, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Option::as_deref))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &value)?;
        }
        map.end()
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Missing, empty or unusable connection descriptor / config
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Rejected by the read-only guard
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl IntoMcpError for GatewayError {
    fn into_mcp_error(self) -> McpError {
        match &self {
            GatewayError::InvalidArgument(_) => McpError::invalid_params(self.to_string(), None),
            GatewayError::NotAllowed(_) => McpError::invalid_request(self.to_string(), None),
            GatewayError::Configuration(_)
            | GatewayError::Connection(_)
            | GatewayError::Query(_) => McpError::internal_error(self.to_string(), None),
        }
    }
}
