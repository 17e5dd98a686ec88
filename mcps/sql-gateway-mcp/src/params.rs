//! Parameter types for SQL gateway tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PreviewTableParams {
    #[schemars(description = "Schema-qualified table name, e.g. 'public.users'")]
    #[serde(rename = "tableName")]
    pub table_name: String,

    #[schemars(description = "Maximum number of rows to return (default 20; values <= 0 use the default)")]
    #[serde(default)]
    pub top: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunQueryParams {
    #[schemars(description = "A read-only SQL statement starting with SELECT or WITH")]
    pub sql: String,
}
