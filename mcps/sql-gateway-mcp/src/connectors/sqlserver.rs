//! SQL Server connector implementation
//!
//! tiberius speaks TDS over a tokio `TcpStream` wrapped in the futures-io
//! compatibility layer. The connection string is an ADO.NET string
//! (`Server=tcp:host,1433;Database=app;User Id=...;Password=...`) or a
//! `jdbc:sqlserver://` URL.

use async_trait::async_trait;
use futures::TryStreamExt;
use tiberius::{Client, ColumnData, Config, FromSql, QueryItem, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::hex_string;
use super::traits::Connector;
use crate::types::{GatewayError, Statement, TabularResult};

const JDBC_PREFIX: &str = "jdbc:sqlserver://";

const LIST_TABLES_SQL: &str = "
SELECT TABLE_SCHEMA + '.' + TABLE_NAME AS Name
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_SCHEMA COLLATE Latin1_General_BIN2, TABLE_NAME COLLATE Latin1_General_BIN2
";

type SqlClient = Client<Compat<TcpStream>>;

/// SQL Server connector opening one TDS session per round trip
pub struct SqlServerConnector {
    config: Config,
}

impl SqlServerConnector {
    /// Parse the connection string; malformed strings fail at startup
    pub fn new(connection_string: &str) -> Result<Self, GatewayError> {
        let is_jdbc = connection_string
            .get(..JDBC_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(JDBC_PREFIX));

        let config = if is_jdbc {
            Config::from_jdbc_string(connection_string)
        } else {
            Config::from_ado_string(connection_string)
        }
        .map_err(|e| {
            GatewayError::Configuration(format!("invalid SQL Server connection string: {}", e))
        })?;

        Ok(Self { config })
    }

    async fn connect(&self) -> Result<SqlClient, GatewayError> {
        let tcp = open_tcp(&self.config).await?;

        match Client::connect(self.config.clone(), tcp.compat_write()).await {
            Ok(client) => Ok(client),
            // Azure SQL gateways redirect to the node hosting the database
            Err(tiberius::error::Error::Routing { host, port }) => {
                tracing::debug!(%host, port, "SQL Server redirected the connection");
                let mut config = self.config.clone();
                config.host(&host);
                config.port(port);

                let tcp = open_tcp(&config).await?;
                Client::connect(config, tcp.compat_write())
                    .await
                    .map_err(map_connection_error)
            }
            Err(e) => Err(map_connection_error(e)),
        }
    }
}

#[async_trait]
impl Connector for SqlServerConnector {
    async fn fetch(&self, statement: &Statement) -> Result<TabularResult, GatewayError> {
        let mut client = self.connect().await?;

        // Dropping `client` on cancellation closes the socket
        let result = run(&mut client, statement).await;

        if let Err(e) = client.close().await {
            tracing::debug!("Error while closing SQL Server connection: {}", e);
        }

        result
    }

    fn list_tables_statement(&self) -> Statement {
        Statement::new(LIST_TABLES_SQL)
    }

    fn preview_statement(&self, table: &str, limit: i64) -> Statement {
        Statement::new(format!("SELECT TOP (@P1) * FROM {}", table)).bind(limit)
    }

    fn connector_type(&self) -> &'static str {
        "sqlserver"
    }
}

async fn open_tcp(config: &Config) -> Result<TcpStream, GatewayError> {
    let addr = config.get_addr();
    let tcp = TcpStream::connect(&addr).await.map_err(|e| {
        GatewayError::Connection(format!("failed to reach SQL Server at {}: {}", addr, e))
    })?;
    tcp.set_nodelay(true)
        .map_err(|e| GatewayError::Connection(format!("failed to configure socket: {}", e)))?;
    Ok(tcp)
}

/// Execute one statement and collect the rows of its first result set
async fn run(client: &mut SqlClient, statement: &Statement) -> Result<TabularResult, GatewayError> {
    let params: Vec<&dyn ToSql> = statement.params.iter().map(|p| p as &dyn ToSql).collect();

    let mut stream = client
        .query(statement.sql.as_str(), &params)
        .await
        .map_err(map_query_error)?;

    let columns: Vec<String> = stream
        .columns()
        .await
        .map_err(map_query_error)?
        .map(|columns| columns.iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let mut builder = TabularResult::builder(columns);

    // Rows of later result sets are drained but not kept
    while let Some(item) = stream.try_next().await.map_err(map_query_error)? {
        if let QueryItem::Row(row) = item {
            if row.result_index() == 0 {
                let values = row
                    .cells()
                    .map(|(column, data)| cell_text(data, column.name()))
                    .collect::<Result<Vec<_>, _>>()?;
                builder.push_row(values)?;
            }
        }
    }

    Ok(builder.build())
}

/// Render one cell as text; NULL stays `None`
fn cell_text(data: &ColumnData<'static>, column: &str) -> Result<Option<String>, GatewayError> {
    let text = match data {
        ColumnData::U8(v) => v.map(|v| v.to_string()),
        ColumnData::I16(v) => v.map(|v| v.to_string()),
        ColumnData::I32(v) => v.map(|v| v.to_string()),
        ColumnData::I64(v) => v.map(|v| v.to_string()),
        ColumnData::F32(v) => v.map(|v| v.to_string()),
        ColumnData::F64(v) => v.map(|v| v.to_string()),
        ColumnData::Bit(v) => v.map(|v| v.to_string()),
        ColumnData::String(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::Guid(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::Binary(v) => v.as_ref().map(|v| hex_string(v)),
        ColumnData::Numeric(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::Xml(v) => v.as_ref().map(|v| v.clone().into_owned().into_string()),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            decode::<chrono::NaiveDateTime>(data, column)?.map(|v| v.to_string())
        }
        ColumnData::Date(_) => decode::<chrono::NaiveDate>(data, column)?.map(|v| v.to_string()),
        ColumnData::Time(_) => decode::<chrono::NaiveTime>(data, column)?.map(|v| v.to_string()),
        ColumnData::DateTimeOffset(_) => {
            decode::<chrono::DateTime<chrono::FixedOffset>>(data, column)?.map(|v| v.to_rfc3339())
        }
    };
    Ok(text)
}

fn decode<'a, T: FromSql<'a>>(
    data: &'a ColumnData<'static>,
    column: &str,
) -> Result<Option<T>, GatewayError> {
    T::from_sql(data).map_err(|e| {
        GatewayError::Query(format!("cannot convert column '{}' to text: {}", column, e))
    })
}

fn map_connection_error(error: tiberius::error::Error) -> GatewayError {
    GatewayError::Connection(format!("SQL Server connection failed: {}", error))
}

fn map_query_error(error: tiberius::error::Error) -> GatewayError {
    match error {
        tiberius::error::Error::Server(token) => {
            GatewayError::Query(format!("{} (error {})", token.message(), token.code()))
        }
        other => GatewayError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use tiberius::numeric::Numeric;
    use tiberius::IntoSql;

    use super::*;

    #[test]
    fn test_parses_ado_and_jdbc_strings() {
        let connector =
            SqlServerConnector::new("Server=tcp:db.internal,1433;Database=app;User Id=sa;Password=pw;TrustServerCertificate=true")
                .unwrap();
        assert_eq!(connector.config.get_addr(), "db.internal:1433");

        let connector =
            SqlServerConnector::new("jdbc:sqlserver://db.internal:1444;databaseName=app;user=sa;password=pw")
                .unwrap();
        assert_eq!(connector.config.get_addr(), "db.internal:1444");
    }

    #[test]
    fn test_statements() {
        let connector = SqlServerConnector::new("Server=tcp:localhost,1433;Database=app").unwrap();

        let stmt = connector.preview_statement("dbo.Users", 5);
        assert_eq!(stmt.sql, "SELECT TOP (@P1) * FROM dbo.Users");
        assert_eq!(stmt.params, vec![5]);

        let stmt = connector.list_tables_statement();
        assert!(stmt.sql.contains("INFORMATION_SCHEMA.TABLES"));
        assert!(stmt.sql.contains("'BASE TABLE'"));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&ColumnData::I32(Some(-42)), "n").unwrap(), Some("-42".to_string()));
        assert_eq!(cell_text(&ColumnData::I64(None), "n").unwrap(), None);
        assert_eq!(cell_text(&ColumnData::Bit(Some(true)), "b").unwrap(), Some("true".to_string()));
        assert_eq!(cell_text(&ColumnData::F64(Some(1.5)), "f").unwrap(), Some("1.5".to_string()));
        assert_eq!(
            cell_text(&ColumnData::String(Some(Cow::Borrowed("null"))), "s").unwrap(),
            Some("null".to_string())
        );
        assert_eq!(cell_text(&ColumnData::String(None), "s").unwrap(), None);
        assert_eq!(
            cell_text(&ColumnData::Binary(Some(Cow::Borrowed(&[0xCA, 0xFE][..]))), "b").unwrap(),
            Some("0xCAFE".to_string())
        );
        assert_eq!(
            cell_text(&ColumnData::Numeric(Some(Numeric::new_with_scale(1250, 2))), "d").unwrap(),
            Some("12.50".to_string())
        );
    }

    #[test]
    fn test_cell_text_dates() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let data: ColumnData<'static> = date.into_sql();
        assert_eq!(cell_text(&data, "d").unwrap(), Some("2024-01-31".to_string()));

        let stamp = date.and_hms_opt(12, 0, 0).unwrap();
        let data: ColumnData<'static> = stamp.into_sql();
        assert_eq!(cell_text(&data, "t").unwrap(), Some("2024-01-31 12:00:00".to_string()));
    }

    #[test]
    fn test_invalid_connection_string_is_configuration_error() {
        let err = SqlServerConnector::new("Server=tcp:localhost,notaport;Database=app").err();
        assert!(matches!(err, Some(GatewayError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let connector =
            SqlServerConnector::new("Server=tcp:127.0.0.1,1;Database=none;User Id=sa;Password=pw")
                .unwrap();
        let err = connector
            .fetch(&Statement::new("SELECT 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
    }

    // Requires a running SQL Server instance
    fn test_connection_string() -> Option<String> {
        std::env::var("MSSQL_CONNECTION_STRING").ok()
    }

    #[tokio::test]
    #[ignore = "requires MSSQL_CONNECTION_STRING pointing at SQL Server"]
    async fn test_select_literal_values() {
        let Some(conn_str) = test_connection_string() else {
            eprintln!("Skipping test: MSSQL_CONNECTION_STRING not set");
            return;
        };
        let connector = SqlServerConnector::new(&conn_str).unwrap();
        let result = connector
            .fetch(&Statement::new(
                "SELECT 1 AS a, CAST(NULL AS nvarchar(10)) AS b, 'null' AS c, CAST(12.50 AS decimal(5,2)) AS d",
            ))
            .await
            .unwrap();

        assert_eq!(result.columns(), ["a", "b", "c", "d"]);
        let row = &result.rows()[0];
        assert_eq!(row.get("A"), Some(Some("1")));
        assert_eq!(row.get("b"), Some(None));
        assert_eq!(row.get("c"), Some(Some("null")));
        assert_eq!(row.get("d"), Some(Some("12.50")));
    }

    #[tokio::test]
    #[ignore = "requires MSSQL_CONNECTION_STRING pointing at SQL Server"]
    async fn test_top_is_bound() {
        let Some(conn_str) = test_connection_string() else {
            eprintln!("Skipping test: MSSQL_CONNECTION_STRING not set");
            return;
        };
        let connector = SqlServerConnector::new(&conn_str).unwrap();
        let result = connector
            .fetch(&connector.preview_statement("sys.objects", 3))
            .await
            .unwrap();
        assert_eq!(result.rows().len(), 3);
    }
}
