//! INSERT with dialect-specific upsert.
//!
//! # Examples
//!
//! ```ignore
//! use relmap::sql::dml::{Insert, OnConflict};
//! use relmap::sql::expr::param;
//!
//! let insert = Insert::into("users")
//!     .columns(["id", "email"])
//!     .values([param(1), param("ada@example.com")])
//!     .on_conflict(OnConflict::do_update(["id"], ["email"]));
//! ```
//!
//! | Dialect | Update on conflict | Ignore on conflict |
//! |---------|--------------------|--------------------|
//! | PostgreSQL / SQLite | `ON CONFLICT (k) DO UPDATE SET c = EXCLUDED.c` | `ON CONFLICT DO NOTHING` |
//! | MySQL | `ON DUPLICATE KEY UPDATE c = VALUES(c)` | `INSERT IGNORE` |
//! | SQL Server | `MERGE ... WHEN MATCHED THEN UPDATE` | `MERGE` without a matched branch |

use super::dialect::{Dialect, SqlDialect, UpsertStyle};
use super::expr::Expr;
use super::token::{CompiledQuery, Token, TokenStream};
use crate::error::{QueryError, QueryResult};

const MERGE_TARGET: &str = "target";
const MERGE_SOURCE: &str = "source";

// ============================================================================
// INSERT
// ============================================================================

/// INSERT statement.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until compiled"]
pub struct Insert {
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
    pub on_conflict: Option<OnConflict>,
}

impl Insert {
    /// Create a new INSERT statement.
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            on_conflict: None,
        }
    }

    /// Set the schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the columns to insert.
    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    /// Add a row of values.
    pub fn values(mut self, vals: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.values
            .push(vals.into_iter().map(|v| v.into()).collect());
        self
    }

    /// Add multiple rows of values.
    pub fn values_many(mut self, rows: impl IntoIterator<Item = Vec<Expr>>) -> Self {
        self.values.extend(rows);
        self
    }

    /// Turn this INSERT into an upsert.
    pub fn on_conflict(mut self, conflict: OnConflict) -> Self {
        self.on_conflict = Some(conflict);
        self
    }

    /// Render SQL with placeholders plus the parameter list.
    pub fn compile(&self, dialect: Dialect) -> QueryResult<CompiledQuery> {
        Ok(self.to_tokens(dialect)?.compile(dialect))
    }

    /// Convert to SQL with parameters inlined (debug output only).
    pub fn to_sql(&self, dialect: Dialect) -> QueryResult<String> {
        Ok(self.to_tokens(dialect)?.serialize(dialect))
    }

    fn validate(&self) -> QueryResult<()> {
        if self.columns.is_empty() || self.values.is_empty() {
            return Err(QueryError::InvalidQuery(format!(
                "INSERT INTO {} needs columns and at least one row",
                self.table
            )));
        }
        if let Some(row) = self.values.iter().find(|r| r.len() != self.columns.len()) {
            return Err(QueryError::InvalidQuery(format!(
                "INSERT INTO {}: row has {} values for {} columns",
                self.table,
                row.len(),
                self.columns.len()
            )));
        }
        if let Some(OnConflict::DoUpdate { update_columns, .. }) = &self.on_conflict {
            if update_columns.is_empty() {
                return Err(QueryError::InvalidQuery(
                    "ON CONFLICT DO UPDATE needs at least one column to update".into(),
                ));
            }
        }
        Ok(())
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> QueryResult<TokenStream> {
        self.validate()?;

        match (&self.on_conflict, dialect.upsert_style()) {
            (Some(conflict), UpsertStyle::Merge) => self.merge_tokens(conflict, dialect),
            (conflict, style) => {
                let mut ts = TokenStream::new();

                ts.push(Token::Insert).space();
                if matches!(
                    (conflict, style),
                    (Some(OnConflict::DoNothing { .. }), UpsertStyle::OnDuplicateKey)
                ) {
                    ts.push(Token::Ignore).space();
                }
                ts.push(Token::Into).space();
                ts.push(self.table_token());
                ts.space().append(&self.column_list());
                ts.space().push(Token::Values);
                self.append_rows(&mut ts, dialect)?;

                if let Some(conflict) = conflict {
                    match style {
                        UpsertStyle::OnConflict => {
                            ts.space().append(&conflict.on_conflict_tokens());
                        }
                        UpsertStyle::OnDuplicateKey => {
                            if let Some(dup) = conflict.on_duplicate_key_tokens() {
                                ts.space().append(&dup);
                            }
                        }
                        UpsertStyle::Merge => {}
                    }
                }

                Ok(ts)
            }
        }
    }

    fn table_token(&self) -> Token {
        Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        }
    }

    fn column_list(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.lparen();
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(col.clone()));
        }
        ts.rparen();
        ts
    }

    fn append_rows(&self, ts: &mut TokenStream, dialect: Dialect) -> QueryResult<()> {
        for (row_idx, row) in self.values.iter().enumerate() {
            if row_idx > 0 {
                ts.comma();
            }
            ts.space().lparen();
            for (i, val) in row.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&val.to_tokens_for_dialect(dialect)?);
            }
            ts.rparen();
        }
        Ok(())
    }

    /// `MERGE INTO t AS target USING (VALUES ...) AS source (cols) ON ... ;`
    fn merge_tokens(&self, conflict: &OnConflict, dialect: Dialect) -> QueryResult<TokenStream> {
        let keys = conflict.conflict_columns();
        if keys.is_empty() {
            return Err(QueryError::unsupported(
                dialect.name(),
                "upsert without conflict columns",
            ));
        }

        let mut ts = TokenStream::new();
        ts.push(Token::Merge).space().push(Token::Into).space();
        ts.push(self.table_token())
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident(MERGE_TARGET.into()));

        ts.space().push(Token::Using).space().lparen().push(Token::Values);
        self.append_rows(&mut ts, dialect)?;
        ts.rparen()
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident(MERGE_SOURCE.into()))
            .space()
            .append(&self.column_list());

        ts.space().push(Token::On).space();
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                ts.space().push(Token::And).space();
            }
            push_qualified(&mut ts, MERGE_TARGET, key);
            ts.space().push(Token::Eq).space();
            push_qualified(&mut ts, MERGE_SOURCE, key);
        }

        if let OnConflict::DoUpdate { update_columns, .. } = conflict {
            ts.space()
                .push(Token::When)
                .space()
                .push(Token::Matched)
                .space()
                .push(Token::Then)
                .space()
                .push(Token::Update)
                .space()
                .push(Token::Set)
                .space();
            for (i, col) in update_columns.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(col.clone()))
                    .space()
                    .push(Token::Eq)
                    .space();
                push_qualified(&mut ts, MERGE_SOURCE, col);
            }
        }

        ts.space()
            .push(Token::When)
            .space()
            .push(Token::Not)
            .space()
            .push(Token::Matched)
            .space()
            .push(Token::Then)
            .space()
            .push(Token::Insert)
            .space()
            .append(&self.column_list())
            .space()
            .push(Token::Values)
            .space()
            .lparen();
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            push_qualified(&mut ts, MERGE_SOURCE, col);
        }
        // MERGE must be terminated
        ts.rparen().push(Token::Semicolon);

        Ok(ts)
    }
}

fn push_qualified(ts: &mut TokenStream, table: &str, column: &str) {
    ts.push(Token::Ident(table.into()))
        .push(Token::Dot)
        .push(Token::Ident(column.into()));
}

/// Conflict handling for INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum OnConflict {
    /// Keep the existing row. `conflict_columns` may be empty except on SQL Server.
    DoNothing { conflict_columns: Vec<String> },
    /// Overwrite `update_columns` with the proposed row's values.
    DoUpdate {
        conflict_columns: Vec<String>,
        update_columns: Vec<String>,
    },
}

impl OnConflict {
    /// Ignore any conflicting row.
    pub fn do_nothing() -> Self {
        OnConflict::DoNothing {
            conflict_columns: Vec::new(),
        }
    }

    /// Ignore rows conflicting on these key columns.
    pub fn do_nothing_on(conflict_columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        OnConflict::DoNothing {
            conflict_columns: conflict_columns.into_iter().map(|c| c.into()).collect(),
        }
    }

    /// Update `update_columns` from the proposed row when `conflict_columns` collide.
    pub fn do_update(
        conflict_columns: impl IntoIterator<Item = impl Into<String>>,
        update_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        OnConflict::DoUpdate {
            conflict_columns: conflict_columns.into_iter().map(|c| c.into()).collect(),
            update_columns: update_columns.into_iter().map(|c| c.into()).collect(),
        }
    }

    pub fn conflict_columns(&self) -> &[String] {
        match self {
            OnConflict::DoNothing { conflict_columns }
            | OnConflict::DoUpdate {
                conflict_columns, ..
            } => conflict_columns,
        }
    }

    fn conflict_target(&self, ts: &mut TokenStream) {
        let cols = self.conflict_columns();
        if cols.is_empty() {
            return;
        }
        ts.space().lparen();
        for (i, col) in cols.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(col.clone()));
        }
        ts.rparen();
    }

    /// `ON CONFLICT [(k)] DO NOTHING | DO UPDATE SET c = EXCLUDED.c`
    fn on_conflict_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::On).space().push(Token::Conflict);
        self.conflict_target(&mut ts);
        ts.space().push(Token::Do).space();

        match self {
            OnConflict::DoNothing { .. } => {
                ts.push(Token::Nothing);
            }
            OnConflict::DoUpdate { update_columns, .. } => {
                ts.push(Token::Update).space().push(Token::Set).space();
                for (i, col) in update_columns.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(col.clone()))
                        .space()
                        .push(Token::Eq)
                        .space()
                        .push(Token::Excluded)
                        .push(Token::Dot)
                        .push(Token::Ident(col.clone()));
                }
            }
        }

        ts
    }

    /// `ON DUPLICATE KEY UPDATE c = VALUES(c)`; `None` for DoNothing (handled by INSERT IGNORE).
    fn on_duplicate_key_tokens(&self) -> Option<TokenStream> {
        let OnConflict::DoUpdate { update_columns, .. } = self else {
            return None;
        };

        let mut ts = TokenStream::new();
        ts.push(Token::On)
            .space()
            .push(Token::Duplicate)
            .space()
            .push(Token::Key)
            .space()
            .push(Token::Update)
            .space();
        for (i, col) in update_columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(col.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .push(Token::Values)
                .lparen()
                .push(Token::Ident(col.clone()))
                .rparen();
        }
        Some(ts)
    }
}

// ============================================================================
// Tests
// ============================================================================
