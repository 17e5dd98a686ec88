//! SQLite connector implementation
//!
//! rusqlite is synchronous, so each round trip runs on tokio's blocking pool.
//! If the calling future is dropped mid-query the statement is interrupted
//! and the connection closes as soon as the blocking task returns.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags};

use super::{float_text, hex_string};
use super::traits::Connector;
use crate::types::{GatewayError, Statement, TabularResult};

/// How long a statement waits on a locked database file
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const LIST_TABLES_SQL: &str = r"
SELECT schema || '.' || name AS name
FROM pragma_table_list
WHERE type = 'table'
  AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
ORDER BY schema, name
";

/// SQLite connector opening the database file once per round trip
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn fetch(&self, statement: &Statement) -> Result<TabularResult, GatewayError> {
        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || open(&path))
            .await
            .map_err(|e| GatewayError::Connection(format!("SQLite open task failed: {}", e)))??;

        let guard = InterruptOnDrop::new(conn.get_interrupt_handle());
        let statement = statement.clone();
        let result = tokio::task::spawn_blocking(move || run(conn, &statement))
            .await
            .map_err(|e| GatewayError::Query(format!("SQLite query task failed: {}", e)));
        guard.disarm();

        result?
    }

    fn list_tables_statement(&self) -> Statement {
        Statement::new(LIST_TABLES_SQL)
    }

    fn preview_statement(&self, table: &str, limit: i64) -> Statement {
        Statement::new(format!("SELECT * FROM {} LIMIT ?1", table)).bind(limit)
    }

    fn connector_type(&self) -> &'static str {
        "sqlite"
    }
}

/// Open an existing database; a missing file is a connection error, not a new
/// empty database
fn open(path: &Path) -> Result<Connection, GatewayError> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if path == Path::new(":memory:") {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }

    let conn = Connection::open_with_flags(path, flags).map_err(|e| {
        GatewayError::Connection(format!(
            "Failed to open SQLite database at {}: {}",
            path.display(),
            e
        ))
    })?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| GatewayError::Connection(format!("Failed to set busy timeout: {}", e)))?;

    Ok(conn)
}

/// Execute one statement and drain its rows; `conn` is closed on return
fn run(conn: Connection, statement: &Statement) -> Result<TabularResult, GatewayError> {
    let mut stmt = conn.prepare(&statement.sql).map_err(map_query_error)?;

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut builder = TabularResult::builder(columns.clone());
    let width = builder.column_count();

    let mut rows = stmt
        .query(rusqlite::params_from_iter(statement.params.iter()))
        .map_err(map_query_error)?;

    while let Some(row) = rows.next().map_err(map_query_error)? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            let value = row.get_ref(idx).map_err(map_query_error)?;
            values.push(cell_text(value, &columns[idx])?);
        }
        builder.push_row(values)?;
    }

    Ok(builder.build())
}

/// Render one cell as text; NULL stays `None`
fn cell_text(value: ValueRef<'_>, column: &str) -> Result<Option<String>, GatewayError> {
    Ok(match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(float_text(f)),
        ValueRef::Text(bytes) => Some(String::from_utf8(bytes.to_vec()).map_err(|e| {
            GatewayError::Query(format!(
                "cannot convert column '{}' to text: {}",
                column, e
            ))
        })?),
        ValueRef::Blob(bytes) => Some(hex_string(bytes)),
    })
}

fn map_query_error(error: rusqlite::Error) -> GatewayError {
    GatewayError::Query(error.to_string())
}

/// Interrupts the running statement unless disarmed first
struct InterruptOnDrop(Option<InterruptHandle>);

impl InterruptOnDrop {
    fn new(handle: InterruptHandle) -> Self {
        Self(Some(handle))
    }

    fn disarm(mut self) {
        self.0.take();
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            tracing::debug!("Round trip abandoned, interrupting SQLite statement");
            handle.interrupt();
        }
    }
}
