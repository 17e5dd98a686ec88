//! End-to-end tests for the gateway against SQLite database files
//!
//! PostgreSQL coverage lives in the connector's unit tests and needs
//! `DATABASE_URL`; everything here runs offline.

use std::path::Path;

use sql_gateway_mcp::{
    ConnectionDescriptor, DataAccessGateway, GatewayConfig, GatewayError, GatewayOptions,
};

/// Create a database file with a few tables, a view and some NULLs
fn create_fixture(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE zeta (id INTEGER);
         CREATE TABLE Alpha (id INTEGER);
         CREATE TABLE beta (id INTEGER, label TEXT, price REAL);
         CREATE VIEW beta_labels AS SELECT label FROM beta;
         INSERT INTO beta (id, label, price) VALUES
            (1, 'one', 1.5),
            (2, NULL, NULL),
            (3, 'null', 3.0);",
    )
    .unwrap();

    let mut stmt = conn.prepare("INSERT INTO zeta (id) VALUES (?1)").unwrap();
    for id in 0..30 {
        stmt.execute([id]).unwrap();
    }
}

fn fixture_gateway() -> (tempfile::TempDir, DataAccessGateway) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.db");
    create_fixture(&path);

    let descriptor = ConnectionDescriptor::new(format!("sqlite:{}", path.display())).unwrap();
    let gateway = DataAccessGateway::new(&descriptor, GatewayOptions::default()).unwrap();
    (dir, gateway)
}

#[tokio::test]
async fn list_tables_sorted_without_views() {
    let (_dir, gateway) = fixture_gateway();
    let tables = gateway.list_tables().await.unwrap();
    assert_eq!(tables, vec!["main.Alpha", "main.beta", "main.zeta"]);
}

#[tokio::test]
async fn list_tables_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.db");
    rusqlite::Connection::open(&path).unwrap();

    let descriptor = ConnectionDescriptor::new(format!("sqlite:{}", path.display())).unwrap();
    let gateway = DataAccessGateway::new(&descriptor, GatewayOptions::default()).unwrap();
    assert!(gateway.list_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn preview_default_limit() {
    let (_dir, gateway) = fixture_gateway();

    let default = gateway.preview_table("main.zeta", 0).await.unwrap();
    let negative = gateway.preview_table("main.zeta", -1).await.unwrap();
    let twenty = gateway.preview_table("main.zeta", 20).await.unwrap();

    assert_eq!(twenty.rows().len(), 20);
    assert_eq!(default, twenty);
    assert_eq!(negative, twenty);

    let five = gateway.preview_table("zeta", 5).await.unwrap();
    assert_eq!(five.rows().len(), 5);
}

#[tokio::test]
async fn preview_rows_have_every_column() {
    let (_dir, gateway) = fixture_gateway();
    let result = gateway.preview_table("main.beta", 10).await.unwrap();

    assert_eq!(result.columns(), ["id", "label", "price"]);
    for row in result.rows() {
        assert_eq!(row.len(), result.columns().len());
        for column in result.columns() {
            assert!(row.contains_column(column));
            assert!(row.contains_column(&column.to_uppercase()));
        }
    }

    let rows = result.rows();
    assert_eq!(rows[0].get("PRICE"), Some(Some("1.5")));
    assert_eq!(rows[1].get("label"), Some(None));
    assert_eq!(rows[2].get("label"), Some(Some("null")));
}

#[tokio::test]
async fn preview_missing_table_is_query_error() {
    let (_dir, gateway) = fixture_gateway();
    let err = gateway.preview_table("main.nope", 5).await.unwrap_err();
    assert!(matches!(err, GatewayError::Query(_)));
}

#[tokio::test]
async fn preview_blank_name_is_invalid_argument() {
    let (_dir, gateway) = fixture_gateway();
    let err = gateway.preview_table("", 5).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidArgument(_)));
}

#[tokio::test]
async fn run_query_lowercase_with_leading_whitespace() {
    let (_dir, gateway) = fixture_gateway();
    let result = gateway.run_query("  select 1 as a").await.unwrap();

    assert_eq!(result.columns(), ["a"]);
    assert_eq!(result.rows().len(), 1);
    assert_eq!(result.rows()[0].get("a"), Some(Some("1")));
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({"columns": ["a"], "rows": [{"a": "1"}]})
    );
}

#[tokio::test]
async fn run_query_with_cte() {
    let (_dir, gateway) = fixture_gateway();
    let result = gateway
        .run_query("WITH priced AS (SELECT id FROM beta WHERE price > 2) SELECT count(*) AS n FROM priced")
        .await
        .unwrap();
    assert_eq!(result.rows()[0].get("n"), Some(Some("1")));
}

#[tokio::test]
async fn run_query_rejects_writes_and_leaves_data_alone() {
    let (_dir, gateway) = fixture_gateway();

    let err = gateway.run_query("DELETE FROM beta").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotAllowed(_)));

    let count = gateway.run_query("SELECT count(*) AS n FROM beta").await.unwrap();
    assert_eq!(count.rows()[0].get("n"), Some(Some("3")));
}

#[tokio::test]
async fn run_query_syntax_error_is_query_error() {
    let (_dir, gateway) = fixture_gateway();
    let err = gateway.run_query("SELECT FROM WHERE").await.unwrap_err();
    assert!(matches!(err, GatewayError::Query(_)));
}

#[tokio::test]
async fn null_serializes_differently_from_null_string() {
    let (_dir, gateway) = fixture_gateway();
    let result = gateway
        .run_query("SELECT NULL AS a, 'null' AS b")
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&result).unwrap()["rows"][0],
        serde_json::json!({"a": null, "b": "null"})
    );
}

#[tokio::test]
async fn missing_database_file_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor =
        ConnectionDescriptor::new(format!("sqlite:{}", dir.path().join("gone.db").display()))
            .unwrap();
    let gateway = DataAccessGateway::new(&descriptor, GatewayOptions::default()).unwrap();

    let err = gateway.list_tables().await.unwrap_err();
    assert!(matches!(err, GatewayError::Connection(_)));
}

#[tokio::test]
async fn concurrent_operations_use_independent_connections() {
    let (_dir, gateway) = fixture_gateway();

    let mut handles = Vec::new();
    for i in 0..16 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway
                .run_query(&format!("SELECT {} AS n", i))
                .await
                .map(|result| result.rows()[0].get("n").flatten().map(str::to_string))
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value, Some(i.to_string()));
    }
}

#[test]
fn gateway_requires_connection_string() {
    let config = GatewayConfig::default();
    assert!(matches!(
        DataAccessGateway::from_config(&config).err(),
        Some(GatewayError::Configuration(_))
    ));
    assert!(matches!(
        ConnectionDescriptor::new(""),
        Err(GatewayError::Configuration(_))
    ));
}
