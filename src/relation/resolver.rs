//! Include trees to LEFT JOINs plus the column plan the hydrator reads.
//!
//! Joins are emitted depth-first in request order. Each eager relation reserves
//! its target (and pivot, for many-to-many) in the statement's
//! [`AliasRegistry`] and becomes the source of its own nested includes. Output
//! columns of a relation are named `<relation path joined by __>__<column>`,
//! root columns keep their bare names.

use std::collections::HashSet;

use crate::error::{QueryError, QueryResult};
use crate::schema::registry::RelationKeys;
use crate::schema::{ColumnType, LoadStrategy, RelationKind, SchemaRegistry, TableDef};
use crate::sql::{table_col, ExprExt, Join, JoinType, SelectExpr};

use super::alias::AliasRegistry;
use super::filter::RelationFilterTranslator;
use super::include::IncludeTree;
use super::lazy::LazyLoad;
use super::{join_path, key_link, table_ref};

// =============================================================================
// Column plan
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PlanColumn {
    pub name: String,
    pub column_type: ColumnType,
}

/// Columns selected from one table occurrence, and what hangs off it.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub table: String,
    /// Exposed name in the statement.
    pub alias: String,
    /// Output-name prefix; empty for the root.
    pub prefix: String,
    /// Columns identifying one row; empty when the table has no primary key.
    pub key: Vec<String>,
    pub columns: Vec<PlanColumn>,
    pub includes: Vec<IncludeNode>,
    pub lazy: Vec<LazyLoad>,
}

/// An eagerly joined relation.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeNode {
    pub relation: String,
    pub kind: RelationKind,
    pub projection: Projection,
}

/// How flat rows map back to the requested object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAliasPlan {
    pub root: Projection,
}

impl Projection {
    /// Result-set column name for `column` of this table occurrence.
    pub fn output_name(&self, column: &str) -> String {
        if self.prefix.is_empty() {
            column.to_string()
        } else {
            format!("{}__{}", self.prefix, column)
        }
    }

    fn push_select(&self, out: &mut Vec<SelectExpr>) {
        for c in &self.columns {
            out.push(table_col(&self.alias, &c.name).alias(&self.output_name(&c.name)));
        }
        for node in &self.includes {
            node.projection.push_select(out);
        }
    }

    fn has_to_many(&self) -> bool {
        self.includes
            .iter()
            .any(|n| n.kind.is_to_many() || n.projection.has_to_many())
    }

    fn find(&self, path: &[&str]) -> Option<&Projection> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .includes
                .iter()
                .find(|n| n.relation == *head)
                .and_then(|n| n.projection.find(rest)),
        }
    }

    fn has_lazy(&self) -> bool {
        !self.lazy.is_empty() || self.includes.iter().any(|n| n.projection.has_lazy())
    }
}

impl ColumnAliasPlan {
    /// Select list in plan order: root columns, then each include depth-first.
    pub fn select_list(&self) -> Vec<SelectExpr> {
        let mut out = Vec::new();
        self.root.push_select(&mut out);
        out
    }

    /// Whether any eager include (at any depth) fans out root rows.
    pub fn has_to_many(&self) -> bool {
        self.root.has_to_many()
    }

    pub fn has_lazy(&self) -> bool {
        self.root.has_lazy()
    }

    /// Projection reached by following eager relation names from the root.
    pub fn find(&self, path: &[&str]) -> Option<&Projection> {
        self.root.find(path)
    }

    /// Whether every hop of `path` is a to-one eager include.
    pub fn is_to_one_path(&self, path: &[&str]) -> bool {
        let mut node = &self.root;
        for name in path {
            match node.includes.iter().find(|n| n.relation == *name) {
                Some(n) if !n.kind.is_to_many() => node = &n.projection,
                _ => return false,
            }
        }
        true
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Joins and column plan for one include tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub joins: Vec<Join>,
    pub plan: ColumnAliasPlan,
}

#[derive(Debug, Clone, Copy)]
pub struct RelationResolver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> RelationResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `tree` against `root`, already reserved as `root_alias`.
    ///
    /// `columns` restricts the root's selected columns; primary-key columns are
    /// always kept.
    pub fn resolve(
        &self,
        root: &TableDef,
        root_alias: &str,
        columns: Option<&[String]>,
        tree: &IncludeTree,
        aliases: &mut AliasRegistry,
    ) -> QueryResult<Resolution> {
        let mut joins = Vec::new();
        let projection = self.project(root, root_alias, "", "", columns, tree, aliases, &mut joins)?;
        Ok(Resolution {
            joins,
            plan: ColumnAliasPlan { root: projection },
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn project(
        &self,
        table: &TableDef,
        alias: &str,
        prefix: &str,
        path: &str,
        columns: Option<&[String]>,
        tree: &IncludeTree,
        aliases: &mut AliasRegistry,
        joins: &mut Vec<Join>,
    ) -> QueryResult<Projection> {
        let mut projection = Projection {
            table: table.name.clone(),
            alias: alias.to_string(),
            prefix: prefix.to_string(),
            key: table.primary_key.clone(),
            columns: select_columns(table, columns)?,
            includes: Vec::new(),
            lazy: Vec::new(),
        };

        let mut seen = HashSet::new();
        for include in tree {
            let here = join_path(path, &include.relation);
            if !seen.insert(include.relation.as_str()) {
                return Err(QueryError::DuplicateIncludeRequest { path: here });
            }

            let (rel, keys) = self.registry.relation(table, &include.relation)?;
            let lazy = include.lazy.unwrap_or(rel.load == LoadStrategy::Lazy);

            if lazy {
                let load = LazyLoad::describe(rel, &keys, include, &here)?;
                ensure_column(&mut projection, table, &load.parent_column)?;
                tracing::trace!(relation = %here, "deferred relation to lazy load");
                projection.lazy.push(load);
                continue;
            }

            let (target, target_alias) = match &keys {
                RelationKeys::Direct { target, pairs } => {
                    let target_alias = aliases.reserve(&target.name, Some(&rel.name));
                    let on = key_link(&target_alias, alias, pairs);
                    joins.push(Join {
                        join_type: JoinType::Left,
                        table: table_ref(target, &target_alias),
                        on: Some(on),
                    });
                    (*target, target_alias)
                }
                RelationKeys::Pivot {
                    pivot,
                    target,
                    source_pairs,
                    target_pairs,
                } => {
                    let pivot_alias = aliases.reserve(&pivot.name, Some(&format!("{}_pivot", rel.name)));
                    let target_alias = aliases.reserve(&target.name, Some(&rel.name));
                    joins.push(Join {
                        join_type: JoinType::Left,
                        table: table_ref(pivot, &pivot_alias),
                        on: Some(key_link(&pivot_alias, alias, source_pairs)),
                    });
                    joins.push(Join {
                        join_type: JoinType::Left,
                        table: table_ref(target, &target_alias),
                        on: Some(key_link(&target_alias, &pivot_alias, target_pairs)),
                    });
                    (*target, target_alias)
                }
            };

            // Include filters narrow the target join only, so parents survive.
            if let Some(filter) = &include.filter {
                let translator = RelationFilterTranslator::new(self.registry);
                if let Some(pred) =
                    translator.translate_correlated(target, &target_alias, filter, &here, aliases)?
                {
                    if let Some(join) = joins.last_mut() {
                        join.on = join.on.take().map(|on| on.and(pred));
                    }
                }
            }

            tracing::trace!(
                relation = %here,
                kind = ?rel.kind,
                alias = %target_alias,
                "joined relation"
            );

            let child_prefix = if prefix.is_empty() {
                include.relation.clone()
            } else {
                format!("{}__{}", prefix, include.relation)
            };
            let child = self.project(
                target,
                &target_alias,
                &child_prefix,
                &here,
                include.columns.as_deref(),
                &include.include,
                aliases,
                joins,
            )?;

            projection.includes.push(IncludeNode {
                relation: include.relation.clone(),
                kind: rel.kind,
                projection: child,
            });
        }

        Ok(projection)
    }
}

/// Requested columns (all when `None`), validated, with key columns first.
fn select_columns(table: &TableDef, requested: Option<&[String]>) -> QueryResult<Vec<PlanColumn>> {
    let names: Vec<&str> = match requested {
        None => table.column_names().collect(),
        Some(cols) => {
            let mut names: Vec<&str> = table
                .primary_key
                .iter()
                .map(String::as_str)
                .filter(|pk| !cols.iter().any(|c| c == pk))
                .collect();
            names.extend(cols.iter().map(String::as_str));
            names
        }
    };

    names
        .into_iter()
        .map(|name| {
            table
                .get_column(name)
                .map(|c| PlanColumn {
                    name: c.name.clone(),
                    column_type: c.column_type,
                })
                .ok_or_else(|| QueryError::UnknownColumn {
                    table: table.name.clone(),
                    column: name.to_string(),
                })
        })
        .collect()
}

/// Make sure `column` is selected; lazy loads read it from the parent row.
fn ensure_column(projection: &mut Projection, table: &TableDef, column: &str) -> QueryResult<()> {
    if projection.columns.iter().any(|c| c.name == column) {
        return Ok(());
    }
    let def = table.get_column(column).ok_or_else(|| QueryError::UnknownColumn {
        table: table.name.clone(),
        column: column.to_string(),
    })?;
    projection.columns.push(PlanColumn {
        name: def.name.clone(),
        column_type: def.column_type,
    });
    Ok(())
}
