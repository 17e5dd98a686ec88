//! PostgreSQL connector implementation

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgColumn, PgConnection, PgRow, PgValueFormat};
use sqlx::{Column, Connection, Executor, Row, Statement as _, TypeInfo, ValueRef};

use super::pg_text;
use super::traits::Connector;
use crate::types::{GatewayError, Statement, TabularResult};

const LIST_TABLES_SQL: &str = r#"
SELECT table_schema || '.' || table_name AS name
FROM information_schema.tables
WHERE table_type = 'BASE TABLE'
  AND table_schema NOT IN ('pg_catalog', 'information_schema')
ORDER BY table_schema COLLATE "C", table_name COLLATE "C"
"#;

/// PostgreSQL connector opening one connection per round trip
pub struct PostgresConnector {
    url: String,
}

impl PostgresConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn fetch(&self, statement: &Statement) -> Result<TabularResult, GatewayError> {
        let mut conn = PgConnection::connect(&self.url)
            .await
            .map_err(map_connection_error)?;

        // Dropping `conn` on cancellation closes the socket
        let result = run(&mut conn, statement).await;

        if let Err(e) = conn.close().await {
            tracing::debug!("Error while closing PostgreSQL connection: {}", e);
        }

        result
    }

    fn list_tables_statement(&self) -> Statement {
        Statement::new(LIST_TABLES_SQL)
    }

    fn preview_statement(&self, table: &str, limit: i64) -> Statement {
        Statement::new(format!("SELECT * FROM {} LIMIT $1", table)).bind(limit)
    }

    fn connector_type(&self) -> &'static str {
        "postgres"
    }
}

async fn run(conn: &mut PgConnection, statement: &Statement) -> Result<TabularResult, GatewayError> {
    let prepared = (&mut *conn)
        .prepare(statement.sql.as_str())
        .await
        .map_err(map_query_error)?;

    let columns: Vec<String> = prepared
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();
    let mut builder = TabularResult::builder(columns);

    let mut query = prepared.query();
    for param in &statement.params {
        query = query.bind(*param);
    }

    let mut rows = query.fetch(&mut *conn);
    while let Some(row) = rows.try_next().await.map_err(map_query_error)? {
        builder.push_row(convert_row(&row)?)?;
    }

    Ok(builder.build())
}

fn convert_row(row: &PgRow) -> Result<Vec<Option<String>>, GatewayError> {
    row.columns()
        .iter()
        .map(|column| convert_value(row, column))
        .collect()
}

/// Render one cell as text; NULL stays `None`
fn convert_value(row: &PgRow, column: &PgColumn) -> Result<Option<String>, GatewayError> {
    let raw = row
        .try_get_raw(column.ordinal())
        .map_err(map_query_error)?;
    if raw.is_null() {
        return Ok(None);
    }

    let text = match raw.format() {
        PgValueFormat::Text => raw.as_str().map(str::to_string).map_err(|e| e.to_string()),
        PgValueFormat::Binary => raw
            .as_bytes()
            .map_err(|e| e.to_string())
            .and_then(|bytes| pg_text::render(column.type_info(), bytes)),
    };

    text.map(Some).map_err(|e| {
        GatewayError::Query(format!(
            "cannot convert column '{}' of type {} to text: {}",
            column.name(),
            column.type_info().name(),
            e
        ))
    })
}

fn map_connection_error(error: sqlx::Error) -> GatewayError {
    GatewayError::Connection(format!("PostgreSQL connection failed: {}", error))
}

/// Database errors keep PostgreSQL's detail and hint lines
fn map_query_error(error: sqlx::Error) -> GatewayError {
    let Some(db_error) = error.as_database_error() else {
        return GatewayError::Query(error.to_string());
    };

    let mut message = db_error.message().to_string();
    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            message.push_str("\n  DETAIL: ");
            message.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            message.push_str("\n  HINT: ");
            message.push_str(hint);
        }
    }

    GatewayError::Query(message)
}
