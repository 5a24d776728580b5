//! Lowering of [`Filter`] trees to SQL predicates.
//!
//! Field operators become comparisons against bound parameters. Relation
//! operators become:
//!
//! | operator | to-one, outer WHERE | otherwise |
//! |---|---|---|
//! | `some(p)` | own `LEFT JOIN`, `key IS NOT NULL AND p` | `EXISTS (... AND p)` |
//! | `none(p)` | `NOT EXISTS (... AND p)` | same |
//! | `every(p)` | `NOT EXISTS (... AND CASE WHEN p THEN 1 ELSE 0 END = 0)` | same |
//! | `isEmpty` | `NOT EXISTS (...)` | same |
//! | `isNotEmpty` | `EXISTS (...)` | same |
//!
//! Joins are only introduced in conjunctive position of the outer WHERE; under
//! `OR`/`NOT` and inside subqueries everything is `EXISTS`. Every table the
//! translation touches is reserved in the statement's [`AliasRegistry`].

use crate::error::{QueryError, QueryResult};
use crate::filter::{FieldOp, Filter, RelationFilter};
use crate::schema::registry::RelationKeys;
use crate::schema::{RelationDef, SchemaRegistry, TableDef};
use crate::sql::{
    and_all, exists, lit_int, not_exists, param, table_col, Expr, ExprExt, Join, JoinType, Literal,
    Query,
};

use super::alias::AliasRegistry;
use super::{join_path, key_link, table_ref};

/// Escape character used for `contains`/`startsWith`/`endsWith` patterns.
pub const LIKE_ESCAPE: char = '!';

/// Result of lowering a filter for the outer WHERE clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    /// `None` when the filter places no constraint.
    pub predicate: Option<Expr>,
    /// Extra joins the predicate references, in the order they must be emitted.
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, Copy)]
pub struct RelationFilterTranslator<'a> {
    registry: &'a SchemaRegistry,
}

struct Cx<'r> {
    aliases: &'r mut AliasRegistry,
    joins: Vec<Join>,
}

#[derive(Clone, Copy, PartialEq)]
enum Probe {
    /// Rows where the predicate holds.
    Matching,
    /// Rows where the predicate does not hold (NULL counts as not holding).
    CounterExample,
}

impl<'a> RelationFilterTranslator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Lower `filter` against `table` exposed as `alias` for the outer WHERE clause.
    pub fn translate(
        &self,
        table: &TableDef,
        alias: &str,
        filter: &Filter,
        aliases: &mut AliasRegistry,
    ) -> QueryResult<Translation> {
        let mut cx = Cx {
            aliases,
            joins: Vec::new(),
        };
        let predicate = self.lower(&mut cx, table, alias, filter, "", true)?;
        Ok(Translation {
            predicate,
            joins: cx.joins,
        })
    }

    /// Lower `filter` where no joins can be added (join ON clauses, subqueries).
    ///
    /// `path` prefixes relation names in error messages.
    pub fn translate_correlated(
        &self,
        table: &TableDef,
        alias: &str,
        filter: &Filter,
        path: &str,
        aliases: &mut AliasRegistry,
    ) -> QueryResult<Option<Expr>> {
        let mut cx = Cx {
            aliases,
            joins: Vec::new(),
        };
        self.lower(&mut cx, table, alias, filter, path, false)
    }

    fn lower(
        &self,
        cx: &mut Cx<'_>,
        table: &TableDef,
        alias: &str,
        filter: &Filter,
        path: &str,
        join_ok: bool,
    ) -> QueryResult<Option<Expr>> {
        match filter {
            Filter::And(parts) => {
                let mut exprs = Vec::with_capacity(parts.len());
                for part in parts {
                    if let Some(e) = self.lower(cx, table, alias, part, path, join_ok)? {
                        exprs.push(e);
                    }
                }
                Ok(and_all(exprs))
            }
            Filter::Or(parts) => {
                if parts.is_empty() {
                    return Ok(Some(never()));
                }
                let mut exprs = Vec::with_capacity(parts.len());
                for part in parts {
                    match self.lower(cx, table, alias, part, path, false)? {
                        Some(e) => exprs.push(e),
                        // One unconstrained branch makes the disjunction true.
                        None => return Ok(None),
                    }
                }
                Ok(exprs.into_iter().reduce(|acc, e| acc.or(e)))
            }
            Filter::Not(inner) => Ok(Some(
                match self.lower(cx, table, alias, inner, path, false)? {
                    Some(e) => e.not(),
                    None => never(),
                },
            )),
            Filter::Field { column, op } => {
                if !table.has_column(column) {
                    return Err(QueryError::UnknownColumn {
                        table: table.name.clone(),
                        column: column.clone(),
                    });
                }
                Ok(Some(field_predicate(table_col(alias, column), op)))
            }
            Filter::Relation { relation, filter } => {
                self.lower_relation(cx, table, alias, relation, filter, path, join_ok)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_relation(
        &self,
        cx: &mut Cx<'_>,
        table: &TableDef,
        alias: &str,
        relation: &str,
        filter: &RelationFilter,
        path: &str,
        join_ok: bool,
    ) -> QueryResult<Option<Expr>> {
        let here = join_path(path, relation);

        if table.get_relation(relation).is_none() && table.has_column(relation) {
            return Err(QueryError::InvalidFilter {
                path: here,
                message: "no recognized field operator".into(),
            });
        }
        let (rel, keys) = self.registry.relation(table, relation)?;
        if filter.has_no_operator() {
            return Err(QueryError::RelationFilterMissingOperator { path: here });
        }

        tracing::trace!(relation = %here, kind = ?rel.kind, join_ok, "lowering relation filter");

        let mut parts = Vec::new();

        if let Some(p) = &filter.some {
            let fragment = match &keys {
                RelationKeys::Direct { target, pairs } if join_ok && !rel.kind.is_to_many() => {
                    let target_alias = cx.aliases.reserve(&target.name, Some(&rel.name));
                    cx.joins.push(Join {
                        join_type: JoinType::Left,
                        table: table_ref(target, &target_alias),
                        on: Some(key_link(&target_alias, alias, pairs)),
                    });
                    let present = table_col(&target_alias, &pairs[0].0).is_not_null();
                    match self.lower(cx, target, &target_alias, p, &here, true)? {
                        Some(pred) => present.and(pred),
                        None => present,
                    }
                }
                _ => exists(self.subquery(cx, alias, rel, &keys, Some(p), Probe::Matching, &here)?),
            };
            parts.push(fragment);
        }

        if let Some(p) = &filter.none {
            parts.push(not_exists(self.subquery(
                cx,
                alias,
                rel,
                &keys,
                Some(p),
                Probe::Matching,
                &here,
            )?));
        }

        if let Some(p) = &filter.every {
            parts.push(not_exists(self.subquery(
                cx,
                alias,
                rel,
                &keys,
                Some(p),
                Probe::CounterExample,
                &here,
            )?));
        }

        for (flag, want_rows) in [(filter.is_empty, false), (filter.is_not_empty, true)] {
            if let Some(value) = flag {
                let q = self.subquery(cx, alias, rel, &keys, None, Probe::Matching, &here)?;
                parts.push(if value == want_rows { exists(q) } else { not_exists(q) });
            }
        }

        Ok(and_all(parts))
    }

    /// `SELECT 1 FROM target WHERE <link to source> AND <probe>` (via the pivot
    /// for many-to-many).
    #[allow(clippy::too_many_arguments)]
    fn subquery(
        &self,
        cx: &mut Cx<'_>,
        source_alias: &str,
        rel: &RelationDef,
        keys: &RelationKeys<'_>,
        predicate: Option<&Filter>,
        probe: Probe,
        path: &str,
    ) -> QueryResult<Query> {
        let (query, target, target_alias) = match keys {
            RelationKeys::Direct { target, pairs } => {
                let target_alias = cx.aliases.reserve(&target.name, Some(&rel.name));
                let query = Query::new()
                    .select(vec![lit_int(1)])
                    .from(table_ref(target, &target_alias))
                    .filter(key_link(&target_alias, source_alias, pairs));
                (query, *target, target_alias)
            }
            RelationKeys::Pivot {
                pivot,
                target,
                source_pairs,
                target_pairs,
            } => {
                let pivot_hint = format!("{}_pivot", rel.name);
                let pivot_alias = cx.aliases.reserve(&pivot.name, Some(&pivot_hint));
                let target_alias = cx.aliases.reserve(&target.name, Some(&rel.name));
                let query = Query::new()
                    .select(vec![lit_int(1)])
                    .from(table_ref(pivot, &pivot_alias))
                    .inner_join(
                        table_ref(target, &target_alias),
                        key_link(&target_alias, &pivot_alias, target_pairs),
                    )
                    .filter(key_link(&pivot_alias, source_alias, source_pairs));
                (query, *target, target_alias)
            }
        };

        let lowered = match predicate {
            Some(p) => self.lower(cx, target, &target_alias, p, path, false)?,
            None => None,
        };

        Ok(match (probe, lowered) {
            (Probe::Matching, None) => query,
            (Probe::CounterExample, None) => query.filter(never()),
            (Probe::Matching, Some(pred)) => query.filter(pred),
            (Probe::CounterExample, Some(pred)) => query.filter(counter_example(pred)),
        })
    }
}

/// `1 = 0`
fn never() -> Expr {
    lit_int(1).eq(lit_int(0))
}

/// `CASE WHEN p THEN 1 ELSE 0 END = 0`, true when `p` is false or NULL.
fn counter_example(pred: Expr) -> Expr {
    Expr::Case {
        operand: None,
        when_clauses: vec![(pred, lit_int(1))],
        else_clause: Some(Box::new(lit_int(0))),
    }
    .eq(lit_int(0))
}

fn field_predicate(column: Expr, op: &FieldOp) -> Expr {
    match op {
        FieldOp::Equals(v) => column.eq(param(v.clone())),
        FieldOp::Not(v) => column.ne(param(v.clone())),
        FieldOp::Gt(v) => column.gt(param(v.clone())),
        FieldOp::Gte(v) => column.gte(param(v.clone())),
        FieldOp::Lt(v) => column.lt(param(v.clone())),
        FieldOp::Lte(v) => column.lte(param(v.clone())),
        FieldOp::In(values) => column.in_list(values.iter().cloned().map(param).collect()),
        FieldOp::NotIn(values) => column.not_in_list(values.iter().cloned().map(param).collect()),
        FieldOp::Contains(s) => like(column, format!("%{}%", escape_like(s))),
        FieldOp::StartsWith(s) => like(column, format!("{}%", escape_like(s))),
        FieldOp::EndsWith(s) => like(column, format!("%{}", escape_like(s))),
        FieldOp::IsNull(true) => column.is_null(),
        FieldOp::IsNull(false) => column.is_not_null(),
    }
}

fn like(column: Expr, pattern: String) -> Expr {
    column.like_escape(param(Literal::String(pattern)), LIKE_ESCAPE)
}

/// Escape LIKE metacharacters (and `[`, which SQL Server treats as a class).
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '[') || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}
