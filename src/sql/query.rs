//! Query builder - construct SQL queries with a fluent API.

use serde::Deserialize;

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{CompiledQuery, Token, TokenStream};
use crate::error::{QueryError, QueryResult};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> QueryResult<TokenStream> {
        let mut ts = self.expr.to_tokens_for_dialect(dialect)?;
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        Ok(ts)
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// What a FROM/JOIN item reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table {
        schema: Option<String>,
        name: String,
    },
    /// Derived table: `(SELECT ...) AS alias`
    Derived(Box<Query>),
}

/// A table reference with optional schema and alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub source: TableSource,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            source: TableSource::Table {
                schema: None,
                name: table.into(),
            },
            alias: None,
        }
    }

    /// A derived table. Every dialect requires the alias.
    pub fn derived(query: Query, alias: &str) -> Self {
        Self {
            source: TableSource::Derived(Box::new(query)),
            alias: Some(alias.into()),
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        if let TableSource::Table { schema: s, .. } = &mut self.source {
            *s = Some(schema.into());
        }
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The name columns qualify against: the alias if present, else the table name.
    pub fn exposed_name(&self) -> &str {
        match (&self.alias, &self.source) {
            (Some(alias), _) => alias,
            (None, TableSource::Table { name, .. }) => name,
            (None, TableSource::Derived(_)) => "",
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> QueryResult<TokenStream> {
        let mut ts = TokenStream::new();
        match &self.source {
            TableSource::Table { schema, name } => {
                ts.push(Token::QualifiedIdent {
                    schema: schema.clone(),
                    name: name.clone(),
                });
            }
            TableSource::Derived(query) => {
                ts.lparen()
                    .append(&query.to_tokens_for_dialect(dialect)?)
                    .rparen();
            }
        }
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        Ok(ts)
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Option<Expr>,
}

impl Join {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> QueryResult<TokenStream> {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
            JoinType::Right => {
                if !dialect.supports_right_join() {
                    return Err(QueryError::unsupported(dialect.name(), "RIGHT JOIN"));
                }
                ts.push(Token::Right)
            }
            JoinType::Full => {
                if !dialect.supports_full_outer_join() {
                    return Err(QueryError::unsupported(dialect.name(), "FULL OUTER JOIN"));
                }
                ts.push(Token::Full).space().push(Token::Outer)
            }
            JoinType::Cross => ts.push(Token::Cross),
        };

        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens_for_dialect(dialect)?);

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect)?);
        }

        Ok(ts)
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            dir: None,
            nulls: None,
        }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// NULLS FIRST/LAST on a dialect without it is an error, not a silent drop.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> QueryResult<TokenStream> {
        let mut ts = self.expr.to_tokens_for_dialect(dialect)?;

        if let Some(dir) = &self.dir {
            ts.space().push(match dir {
                SortDir::Asc => Token::Asc,
                SortDir::Desc => Token::Desc,
            });
        }

        if let Some(nulls) = &self.nulls {
            if !dialect.supports_nulls_ordering() {
                let construct = match nulls {
                    NullsOrder::First => "NULLS FIRST",
                    NullsOrder::Last => "NULLS LAST",
                };
                return Err(QueryError::unsupported(dialect.name(), construct));
            }
            ts.space().push(match nulls {
                NullsOrder::First => Token::NullsFirst,
                NullsOrder::Last => Token::NullsLast,
            });
        }

        Ok(ts)
    }
}

// =============================================================================
// LIMIT / OFFSET
// =============================================================================

/// LIMIT and OFFSET clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitOffset {
    /// Convert to token stream using dialect-specific pagination.
    ///
    /// Delegates to `SqlDialect::emit_limit_offset()` for the actual formatting.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(self.limit, self.offset)
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until compiled with compile() or to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: Option<LimitOffset>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Append to the SELECT list.
    pub fn add_select(mut self, expr: impl Into<SelectExpr>) -> Self {
        self.select.push(expr.into());
        self
    }

    /// SELECT *
    pub fn select_star(mut self) -> Self {
        self.select = vec![SelectExpr::new(super::expr::star())];
        self
    }

    /// Add DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Set the FROM table.
    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    /// Add a JOIN.
    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on: Some(on),
        });
        self
    }

    /// Add an INNER JOIN.
    pub fn inner_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Inner, table, on)
    }

    /// Add a LEFT JOIN.
    pub fn left_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Left, table, on)
    }

    /// Add a RIGHT JOIN.
    pub fn right_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Right, table, on)
    }

    /// Add a FULL OUTER JOIN.
    pub fn full_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Full, table, on)
    }

    /// Add a CROSS JOIN.
    pub fn cross_join(mut self, table: TableRef) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Cross,
            table,
            on: None,
        });
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Set the HAVING clause.
    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    /// Set the ORDER BY clause.
    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).limit = Some(limit);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).offset = Some(offset);
        self
    }

    /// Names exposed by this query's FROM and JOIN items, in order.
    pub fn exposed_names(&self) -> Vec<String> {
        self.from
            .iter()
            .chain(self.joins.iter().map(|j| &j.table))
            .map(|t| t.exposed_name().to_string())
            .collect()
    }

    /// Table qualifiers referenced anywhere in this query (including nested
    /// subqueries) that no enclosing FROM/JOIN exposes.
    ///
    /// An empty result means every column reference resolves.
    pub fn unresolved_references(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_unresolved(&[], &mut out);
        out
    }

    pub(crate) fn collect_unresolved(&self, outer: &[String], out: &mut Vec<String>) {
        let mut scope = outer.to_vec();
        scope.extend(self.exposed_names());

        let tables = self.from.iter().chain(self.joins.iter().map(|j| &j.table));
        for table in tables {
            if let TableSource::Derived(query) = &table.source {
                query.collect_unresolved(outer, out);
            }
        }

        let exprs = self
            .select
            .iter()
            .map(|s| &s.expr)
            .chain(self.joins.iter().filter_map(|j| j.on.as_ref()))
            .chain(self.where_clause.iter())
            .chain(self.group_by.iter())
            .chain(self.having.iter())
            .chain(self.order_by.iter().map(|o| &o.expr));
        for expr in exprs {
            expr.collect_unresolved(&scope, out);
        }
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> QueryResult<TokenStream> {
        let mut ts = TokenStream::new();

        let (limit, offset) = match &self.limit_offset {
            Some(lo) => (lo.limit, lo.offset),
            None => (None, None),
        };
        let top = dialect.emit_top(limit, offset);

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }
        if let Some(top) = &top {
            ts.space().append(top);
        }

        // Columns
        for (i, select_expr) in self.select.iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&select_expr.to_tokens_for_dialect(dialect)?);
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens_for_dialect(dialect)?);
        }

        // JOINs
        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens_for_dialect(dialect)?);
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect)?);
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect)?);
            }
        }

        // HAVING
        if let Some(having) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&having.to_tokens_for_dialect(dialect)?);
        }

        // ORDER BY
        let paginated = top.is_none() && (limit.is_some() || offset.is_some());
        let needs_order_by_placeholder =
            dialect.requires_order_by_for_offset() && self.order_by.is_empty() && paginated;

        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect)?);
            }
        } else if needs_order_by_placeholder {
            // OFFSET FETCH is only legal after ORDER BY; row order is then unspecified.
            ts.newline()
                .push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        // LIMIT / OFFSET
        if paginated {
            if let Some(lo) = &self.limit_offset {
                ts.newline();
                ts.append(&lo.to_tokens(dialect));
            }
        }

        Ok(ts)
    }

    /// Render SQL with placeholders plus the parameter list, in placeholder order.
    pub fn compile(&self, dialect: Dialect) -> QueryResult<CompiledQuery> {
        Ok(self.to_tokens_for_dialect(dialect)?.compile(dialect))
    }

    /// Generate SQL with parameters inlined as literals.
    ///
    /// For logs and debugging. Never execute the result.
    pub fn to_sql(&self, dialect: Dialect) -> QueryResult<String> {
        Ok(self.to_tokens_for_dialect(dialect)?.serialize(dialect))
    }
}

// =============================================================================
// Tests
// =============================================================================
