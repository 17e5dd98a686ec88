//! Query guard - argument and read-only checks run before any connection
//!
//! The default SQL check is a textual prefix test: after leading whitespace
//! the statement must start with `SELECT` or `WITH`. It does not parse SQL,
//! so a `WITH` whose CTE body modifies data still passes. The strict modes
//! are opt-in and only ever reject more.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::GuardConfig;
use crate::types::GatewayError;

const READ_ONLY_PREFIXES: [&str; 2] = ["SELECT", "WITH"];

const MUTATING_KEYWORDS: &str = r"(?i)\b(?:INSERT|UPDATE|DELETE|MERGE|UPSERT|DROP|ALTER|CREATE|TRUNCATE|GRANT|REVOKE|EXEC|EXECUTE|CALL|COPY|INTO|ATTACH|DETACH|PRAGMA|VACUUM|REINDEX)\b";

const STRICT_IDENTIFIER: &str = r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?$";

/// How `sql_run_query` text is vetted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlGuardMode {
    /// Leading `SELECT` / `WITH` only
    #[default]
    Prefix,
    /// Prefix check, single statement, no mutating keyword outside literals
    Strict,
}

/// How `sql_preview_table` names are vetted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierMode {
    /// Non-blank only; the name is interpolated as given
    #[default]
    Permissive,
    /// `name` or `schema.name` built from `[A-Za-z0-9_]`
    Strict,
}

/// Validates operation arguments before a round trip is attempted
#[derive(Debug, Clone)]
pub struct QueryGuard {
    sql_mode: SqlGuardMode,
    identifier_mode: IdentifierMode,
    mutating: Regex,
    identifier: Regex,
}

impl QueryGuard {
    pub fn new(config: &GuardConfig) -> Result<Self, GatewayError> {
        let mutating = Regex::new(MUTATING_KEYWORDS).map_err(|e| {
            GatewayError::Configuration(format!("Invalid keyword pattern: {}", e))
        })?;
        let identifier = Regex::new(STRICT_IDENTIFIER).map_err(|e| {
            GatewayError::Configuration(format!("Invalid identifier pattern: {}", e))
        })?;

        Ok(Self {
            sql_mode: config.sql_mode,
            identifier_mode: config.identifier_mode,
            mutating,
            identifier,
        })
    }

    pub fn sql_mode(&self) -> SqlGuardMode {
        self.sql_mode
    }

    /// Check a table name for `sql_preview_table`
    pub fn check_table_name(&self, table: &str) -> Result<(), GatewayError> {
        if table.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "tableName is required.".to_string(),
            ));
        }

        if self.identifier_mode == IdentifierMode::Strict && !self.identifier.is_match(table) {
            return Err(GatewayError::InvalidArgument(format!(
                "'{}' is not a plain schema.table identifier",
                table
            )));
        }

        Ok(())
    }

    /// Check SQL text for `sql_run_query`
    pub fn check_query(&self, sql: &str) -> Result<(), GatewayError> {
        if sql.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("sql is required.".to_string()));
        }

        if !has_read_only_prefix(sql) {
            return Err(GatewayError::NotAllowed(
                "Only read-only SELECT queries are allowed.".to_string(),
            ));
        }

        if self.sql_mode == SqlGuardMode::Strict {
            let code = strip_literals_and_comments(sql);

            if has_multiple_statements(&code) {
                return Err(GatewayError::NotAllowed(
                    "Only a single statement is allowed.".to_string(),
                ));
            }

            if let Some(keyword) = self.mutating.find(&code) {
                return Err(GatewayError::NotAllowed(format!(
                    "Keyword {} is not allowed in a read-only query.",
                    keyword.as_str().to_ascii_uppercase()
                )));
            }
        }

        Ok(())
    }
}

fn has_read_only_prefix(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    READ_ONLY_PREFIXES.iter().any(|keyword| {
        trimmed
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
    })
}

/// True when a `;` is followed by anything but whitespace or more `;`
fn has_multiple_statements(code: &str) -> bool {
    match code.find(';') {
        Some(idx) => code[idx..].chars().any(|c| c != ';' && !c.is_whitespace()),
        None => false,
    }
}

/// Blank out string literals, quoted identifiers and comments
///
/// Covers `'..'` (with `''` escapes), `".."`, `[..]`, `` `..` ``, PostgreSQL
/// dollar quoting, `-- ..` and `/* .. */`. Each removed span becomes one space
/// so tokens on either side stay separate.
fn strip_literals_and_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '\'' => {
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\'' {
                        if chars.get(i + 1) == Some(&'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
                out.push(' ');
            }
            '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                i += 1;
                while i < chars.len() && chars[i] != close {
                    i += 1;
                }
                i += 1;
                out.push(' ');
            }
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                out.push(' ');
            }
            '/' if next == Some('*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                out.push(' ');
            }
            '$' => match dollar_tag(&chars[i..]) {
                Some(tag) => {
                    i += tag.len();
                    while i < chars.len() && !chars[i..].starts_with(&tag) {
                        i += 1;
                    }
                    i += tag.len();
                    out.push(' ');
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// `$$` or `$tag$` at the start of `chars`; `$1` style parameters are not tags
fn dollar_tag(chars: &[char]) -> Option<Vec<char>> {
    let end = chars
        .iter()
        .skip(1)
        .position(|c| !(c.is_ascii_alphabetic() || *c == '_'))?
        + 1;
    (chars[end] == '$').then(|| chars[..=end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(sql_mode: SqlGuardMode, identifier_mode: IdentifierMode) -> QueryGuard {
        QueryGuard::new(&GuardConfig {
            sql_mode,
            identifier_mode,
        })
        .unwrap()
    }

    fn default_guard() -> QueryGuard {
        QueryGuard::new(&GuardConfig::default()).unwrap()
    }

    #[test]
    fn test_select_and_with_allowed() {
        let guard = default_guard();
        assert!(guard.check_query("SELECT 1").is_ok());
        assert!(guard.check_query("  select 1 as a").is_ok());
        assert!(guard.check_query("\n\tWith x AS (SELECT 1) SELECT * FROM x").is_ok());
    }

    #[test]
    fn test_other_statements_not_allowed() {
        let guard = default_guard();
        for sql in [
            "DELETE FROM x",
            "update t set a = 1",
            "DROP TABLE users",
            "EXEC sp_who",
            "-- comment\nSELECT 1",
        ] {
            assert!(
                matches!(guard.check_query(sql), Err(GatewayError::NotAllowed(_))),
                "{sql} should be rejected"
            );
        }
    }

    #[test]
    fn test_blank_sql_is_invalid_argument() {
        let guard = default_guard();
        assert!(matches!(
            guard.check_query(""),
            Err(GatewayError::InvalidArgument(_))
        ));
        assert!(matches!(
            guard.check_query(" \n "),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prefix_mode_is_textual_only() {
        let guard = default_guard();
        // Documented gap: the prefix check does not look past the first word
        assert!(guard
            .check_query("WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d")
            .is_ok());
        assert!(guard.check_query("SELECT 1; DROP TABLE t").is_ok());
    }

    #[test]
    fn test_strict_mode_rejects_smuggled_statements() {
        let guard = guard(SqlGuardMode::Strict, IdentifierMode::Permissive);
        assert!(matches!(
            guard.check_query("WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d"),
            Err(GatewayError::NotAllowed(_))
        ));
        assert!(matches!(
            guard.check_query("SELECT 1; DROP TABLE t"),
            Err(GatewayError::NotAllowed(_))
        ));
        assert!(matches!(
            guard.check_query("SELECT * INTO backup FROM t"),
            Err(GatewayError::NotAllowed(_))
        ));
    }

    #[test]
    fn test_strict_mode_ignores_literals_and_comments() {
        let guard = guard(SqlGuardMode::Strict, IdentifierMode::Permissive);
        assert!(guard
            .check_query("SELECT 'delete me; now' AS note, \"update\" FROM t;")
            .is_ok());
        assert!(guard
            .check_query("SELECT 1 -- drop table t\n")
            .is_ok());
        assert!(guard
            .check_query("SELECT /* insert */ [create] FROM t")
            .is_ok());
        assert!(guard
            .check_query("SELECT $$ drop $$, $body$ x; y $body$ FROM t WHERE id = $1")
            .is_ok());
        assert!(guard.check_query("SELECT 'it''s; fine'").is_ok());
    }

    #[test]
    fn test_table_name_checks() {
        let guard = default_guard();
        assert!(matches!(
            guard.check_table_name(""),
            Err(GatewayError::InvalidArgument(_))
        ));
        assert!(matches!(
            guard.check_table_name("   "),
            Err(GatewayError::InvalidArgument(_))
        ));
        assert!(guard.check_table_name("dbo.Users").is_ok());
        // Permissive mode passes anything non-blank through
        assert!(guard.check_table_name("users; DROP TABLE x").is_ok());
    }

    #[test]
    fn test_strict_identifier_mode() {
        let guard = guard(SqlGuardMode::Prefix, IdentifierMode::Strict);
        assert!(guard.check_table_name("users").is_ok());
        assert!(guard.check_table_name("public.order_items").is_ok());
        assert!(matches!(
            guard.check_table_name("users; DROP TABLE x"),
            Err(GatewayError::InvalidArgument(_))
        ));
        assert!(matches!(
            guard.check_table_name("a.b.c"),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_has_multiple_statements() {
        assert!(!has_multiple_statements("SELECT 1"));
        assert!(!has_multiple_statements("SELECT 1;  ;\n"));
        assert!(has_multiple_statements("SELECT 1; SELECT 2"));
    }
}
