//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (PostgreSQL/SQLite), `` ` `` (MySQL), `[]` (SQL Server)
//! - Parameter placeholders: `$1` (PostgreSQL), `?` (MySQL/SQLite), `@p1` (SQL Server)
//! - Pagination: LIMIT/OFFSET vs OFFSET FETCH vs TOP
//! - Boolean literals: true/false vs 1/0
//! - Upsert: ON CONFLICT vs ON DUPLICATE KEY UPDATE vs MERGE
//!
//! # Usage
//!
//! ```ignore
//! use relmap::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! let placeholder = dialect.placeholder(1);       // $1
//! ```
//!
//! # Feature Matrix
//!
//! | Feature | PostgreSQL | SQL Server | MySQL | SQLite |
//! |---------|-----------|------------|-------|--------|
//! | NULLS FIRST/LAST | ✓ | ❌ | ❌ | ✓ |
//! | FULL OUTER JOIN | ✓ | ✓ | ❌ | ❌ |
//! | RIGHT JOIN | ✓ | ✓ | ✓ | ❌ |
//! | TOP | ❌ | ✓ | ❌ | ❌ |
//! | Upsert | ON CONFLICT | MERGE | ON DUPLICATE KEY | ON CONFLICT |
//!
//! Constructs a dialect cannot express are reported as
//! `QueryError::UnsupportedDialectConstruct` instead of emitting degraded SQL.

pub mod helpers;
mod mysql;
mod postgres;
mod sqlite;
mod tsql;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;

/// How a dialect spells INSERT-or-UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `ON CONFLICT (cols) DO UPDATE SET c = EXCLUDED.c` (PostgreSQL, SQLite)
    OnConflict,
    /// `ON DUPLICATE KEY UPDATE c = VALUES(c)` (MySQL)
    OnDuplicateKey,
    /// `MERGE INTO ... USING (VALUES ...)` (SQL Server)
    Merge,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format a NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    /// Format a date literal.
    ///
    /// - PostgreSQL/MySQL: `DATE 'YYYY-MM-DD'`
    /// - SQL Server/SQLite: `'YYYY-MM-DD'`
    fn format_date_literal(&self, date: &str) -> String {
        format!("DATE {}", helpers::quote_string_single(date))
    }

    /// Format a timestamp literal.
    fn format_timestamp_literal(&self, ts: &str) -> String {
        format!("TIMESTAMP {}", helpers::quote_string_single(ts))
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Emit a `TOP n` clause placed right after `SELECT [DISTINCT]`.
    ///
    /// Returns `None` when the dialect paginates at the end of the statement
    /// instead. A dialect that returns `Some` owns the limit; the trailing
    /// pagination clause is then skipped.
    fn emit_top(&self, limit: Option<u64>, offset: Option<u64>) -> Option<TokenStream> {
        let _ = (limit, offset);
        None
    }

    /// Whether this dialect requires ORDER BY for OFFSET/LIMIT.
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    // =========================================================================
    // JOIN / ORDER BY support
    // =========================================================================

    fn supports_full_outer_join(&self) -> bool {
        true
    }

    fn supports_right_join(&self) -> bool {
        true
    }

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // Upsert
    // =========================================================================

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    Sqlite,
    #[serde(alias = "mssql", alias = "sqlserver")]
    TSql,
}

impl Dialect {
    /// All supported dialects, in a stable order.
    pub const ALL: [Dialect; 4] = [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::Sqlite,
        Dialect::TSql,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
            Dialect::TSql => &TSql,
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "tsql" | "mssql" | "sqlserver" => Ok(Dialect::TSql),
            other => Err(format!("unknown dialect: {}", other)),
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.dialect().format_date_literal(date)
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        self.dialect().format_timestamp_literal(ts)
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn emit_top(&self, limit: Option<u64>, offset: Option<u64>) -> Option<TokenStream> {
        self.dialect().emit_top(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        self.dialect().requires_order_by_for_offset()
    }

    fn supports_full_outer_join(&self) -> bool {
        self.dialect().supports_full_outer_join()
    }

    fn supports_right_join(&self) -> bool {
        self.dialect().supports_right_join()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn upsert_style(&self) -> UpsertStyle {
        self.dialect().upsert_style()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
