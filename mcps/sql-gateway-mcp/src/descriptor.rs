//! Connection descriptor
//!
//! The one piece of process-wide state: built once at startup, read-only
//! afterwards. A gateway cannot be constructed without one.

use std::fmt;
use std::path::PathBuf;

use crate::types::GatewayError;

/// Database engine a descriptor points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// PostgreSQL via a `postgres://` URL
    Postgres,
    /// SQL Server via an ADO.NET string or a `jdbc:sqlserver://` URL
    SqlServer,
    /// SQLite database file (or `:memory:`)
    Sqlite { path: PathBuf },
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::SqlServer => "sqlserver",
            Backend::Sqlite { .. } => "sqlite",
        }
    }
}

/// How to reach the database: host, credentials, database name
///
/// The raw string is never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    raw: String,
    backend: Backend,
}

impl ConnectionDescriptor {
    /// Parse a connection string
    ///
    /// Fails with [`GatewayError::Configuration`] when the string is blank or
    /// names no supported backend.
    pub fn new(raw: impl Into<String>) -> Result<Self, GatewayError> {
        let raw = raw.into().trim().to_string();
        if raw.is_empty() {
            return Err(GatewayError::Configuration(
                "connection string is missing or empty".to_string(),
            ));
        }

        let backend = detect_backend(&raw)?;
        Ok(Self { raw, backend })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The connection string as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("backend", &self.backend.name())
            .field("raw", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} database", self.backend.name())
    }
}

fn detect_backend(raw: &str) -> Result<Backend, GatewayError> {
    let lower = raw.to_ascii_lowercase();

    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        return Ok(Backend::Postgres);
    }

    if let Some(prefix) = ["sqlite://", "sqlite:"]
        .into_iter()
        .find(|prefix| lower.starts_with(prefix))
    {
        let rest = &raw[prefix.len()..];
        if rest.is_empty() {
            return Err(GatewayError::Configuration(
                "sqlite connection string has no database path".to_string(),
            ));
        }
        return Ok(Backend::Sqlite {
            path: PathBuf::from(rest),
        });
    }

    // Checked before file extensions: `Database=app.db` is a SQL Server catalog
    if lower.starts_with("jdbc:sqlserver://") || is_ado_string(raw) {
        return Ok(Backend::SqlServer);
    }

    if raw == ":memory:"
        || [".db", ".sqlite", ".sqlite3"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    {
        return Ok(Backend::Sqlite {
            path: PathBuf::from(raw),
        });
    }

    Err(GatewayError::Configuration(
        "unsupported connection string: expected a postgres:// URL, a sqlite: path \
         or a SQL Server connection string"
            .to_string(),
    ))
}

/// `Key=Value;...` with a key naming a SQL Server host
fn is_ado_string(raw: &str) -> bool {
    raw.split(';').any(|pair| {
        pair.split_once('=').is_some_and(|(key, _)| {
            matches!(
                key.trim().to_ascii_lowercase().as_str(),
                "server" | "data source" | "addr" | "address" | "network address"
            )
        })
    })
}
