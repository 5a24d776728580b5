//! Deferred relation loads.
//!
//! A lazy include adds nothing to the main statement. The hydrator leaves a
//! [`LazyRef`] (`{"key": <parent key>, "resolved": false}`) where the relation
//! would appear, and [`crate::builder::QueryOutput::load_all`] later replaces
//! every placeholder of one relation with the result of a single batched
//! `WHERE key IN (...)` query. Batches for different relations run
//! concurrently.

use std::collections::{HashMap, HashSet};

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::builder::SelectBuilder;
use crate::error::{QueryError, QueryResult};
use crate::executor::{Executor, Session};
use crate::filter::{FieldOp, Filter};
use crate::schema::registry::RelationKeys;
use crate::schema::{RelationDef, RelationKind, SchemaRegistry};
use crate::sql::{param, table_col, ExprExt, Literal, Query};

use super::include::{Include, IncludeTree};
use super::resolver::{ColumnAliasPlan, Projection};
use super::table_ref;

/// How batch rows are matched back to parents.
#[derive(Debug, Clone, PartialEq)]
pub enum LazyLink {
    /// `target.target_column IN (parent keys)`.
    Direct { target_column: String },
    /// Pivot rows map parent keys to target keys.
    Pivot {
        table: String,
        /// Pivot column holding the parent key.
        source_column: String,
        /// Pivot column holding the target key.
        target_column: String,
        /// Target column the pivot points at.
        target_key: String,
    },
}

/// A relation recorded for a follow-up query instead of a join.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyLoad {
    pub relation: String,
    /// Dotted relation path from the root, for logs.
    pub path: String,
    pub kind: RelationKind,
    pub target: String,
    /// Parent column whose value keys the batch.
    pub parent_column: String,
    pub link: LazyLink,
    pub columns: Option<Vec<String>>,
    pub filter: Option<Filter>,
    pub include: IncludeTree,
}

impl LazyLoad {
    pub(crate) fn describe(
        rel: &RelationDef,
        keys: &RelationKeys<'_>,
        include: &Include,
        path: &str,
    ) -> QueryResult<Self> {
        let composite = || {
            QueryError::InvalidQuery(format!(
                "relation '{}' has a composite key and cannot be loaded lazily",
                path
            ))
        };

        let (parent_column, link) = match keys {
            RelationKeys::Direct { pairs, .. } => {
                let [(target_column, parent_column)] = pairs.as_slice() else {
                    return Err(composite());
                };
                (
                    parent_column.clone(),
                    LazyLink::Direct {
                        target_column: target_column.clone(),
                    },
                )
            }
            RelationKeys::Pivot {
                pivot,
                source_pairs,
                target_pairs,
                ..
            } => {
                let ([(source_column, parent_column)], [(target_key, target_column)]) =
                    (source_pairs.as_slice(), target_pairs.as_slice())
                else {
                    return Err(composite());
                };
                (
                    parent_column.clone(),
                    LazyLink::Pivot {
                        table: pivot.name.clone(),
                        source_column: source_column.clone(),
                        target_column: target_column.clone(),
                        target_key: target_key.clone(),
                    },
                )
            }
        };

        Ok(Self {
            relation: rel.name.clone(),
            path: path.to_string(),
            kind: rel.kind,
            target: keys.target().name.clone(),
            parent_column,
            link,
            columns: include.columns.clone(),
            filter: include.filter.clone(),
            include: include.include.clone(),
        })
    }

    /// Value the hydrator stores for this relation on a parent row.
    pub fn placeholder(&self, parent: &Map<String, Value>, output_name: &str) -> Value {
        match parent.get(output_name) {
            Some(key) if !key.is_null() => LazyRef::pending(key.clone()).to_value(),
            _ if self.kind.is_to_many() => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }
}

/// Unresolved reference left in hydrated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LazyRef {
    pub key: Value,
    pub resolved: bool,
}

impl LazyRef {
    pub fn pending(key: Value) -> Self {
        Self {
            key,
            resolved: false,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("key".into(), self.key.clone());
        obj.insert("resolved".into(), Value::Bool(self.resolved));
        Value::Object(obj)
    }

    /// Recognize an unresolved placeholder.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.len() != 2 || obj.get("resolved")? != &Value::Bool(false) {
            return None;
        }
        Some(Self::pending(obj.get("key")?.clone()))
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Batch rows grouped by the parent key they belong to (JSON text of the key).
type Groups = HashMap<String, Vec<Value>>;

fn key_text(value: &Value) -> String {
    value.to_string()
}

fn collect_sites<'p>(
    projection: &'p Projection,
    path: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, &'p LazyLoad)>,
) {
    for load in &projection.lazy {
        out.push((path.clone(), load));
    }
    for node in &projection.includes {
        path.push(node.relation.clone());
        collect_sites(&node.projection, path, out);
        path.pop();
    }
}

fn for_each_parent(value: &mut Value, path: &[String], f: &mut dyn FnMut(&mut Map<String, Value>)) {
    match value {
        Value::Array(items) => {
            for item in items {
                for_each_parent(item, path, f);
            }
        }
        Value::Object(obj) => match path.split_first() {
            None => f(obj),
            Some((head, rest)) => {
                if let Some(child) = obj.get_mut(head) {
                    for_each_parent(child, rest, f);
                }
            }
        },
        _ => {}
    }
}

/// Resolve every placeholder in `rows`, one batch per lazy relation.
pub(crate) async fn load_deferred<E: Executor>(
    registry: &SchemaRegistry,
    plan: &ColumnAliasPlan,
    rows: &mut [Value],
    session: &Session<E>,
) -> QueryResult<()> {
    let mut sites = Vec::new();
    collect_sites(&plan.root, &mut Vec::new(), &mut sites);
    if sites.is_empty() {
        return Ok(());
    }

    let mut batches = Vec::with_capacity(sites.len());
    for (path, load) in &sites {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for row in rows.iter_mut() {
            for_each_parent(row, path, &mut |parent| {
                if let Some(r) = parent.get(&load.relation).and_then(LazyRef::from_value) {
                    if seen.insert(key_text(&r.key)) {
                        keys.push(r.key);
                    }
                }
            });
        }
        batches.push(fetch(registry, load, keys, session));
    }

    let results = try_join_all(batches).await?;

    for ((path, load), groups) in sites.iter().zip(results) {
        for row in rows.iter_mut() {
            for_each_parent(row, path, &mut |parent| {
                let Some(r) = parent.get(&load.relation).and_then(LazyRef::from_value) else {
                    return;
                };
                let found = groups.get(&key_text(&r.key));
                let value = if load.kind.is_to_many() {
                    Value::Array(found.cloned().unwrap_or_default())
                } else {
                    found
                        .and_then(|items| items.first().cloned())
                        .unwrap_or(Value::Null)
                };
                parent.insert(load.relation.clone(), value);
            });
        }
    }
    Ok(())
}

fn key_literals(keys: &[Value]) -> Vec<Literal> {
    keys.iter().filter_map(Literal::from_json).collect()
}

/// Query the target table for `keys` on `column`, honoring the include options.
async fn load_targets<E: Executor>(
    registry: &SchemaRegistry,
    load: &LazyLoad,
    column: &str,
    keys: &[Value],
    session: &Session<E>,
) -> QueryResult<Vec<Value>> {
    let mut builder = SelectBuilder::new(registry, &load.target)?
        .filter(Filter::field(column, FieldOp::In(key_literals(keys))))
        .include_tree(load.include.clone());
    if let Some(cols) = &load.columns {
        let mut cols = cols.clone();
        if !cols.iter().any(|c| c == column) {
            cols.push(column.to_string());
        }
        builder = builder.select(cols);
    }
    if let Some(filter) = &load.filter {
        builder = builder.filter(filter.clone());
    }

    let mut output = builder.execute(session).await?;
    output.load_all(session).await?;
    Ok(output.into_rows())
}

fn fetch<'s, E: Executor>(
    registry: &'s SchemaRegistry,
    load: &'s LazyLoad,
    keys: Vec<Value>,
    session: &'s Session<E>,
) -> BoxFuture<'s, QueryResult<Groups>> {
    async move {
        let mut groups = Groups::new();
        if keys.is_empty() {
            return Ok(groups);
        }
        tracing::debug!(relation = %load.path, keys = keys.len(), "loading lazy relation");

        match &load.link {
            LazyLink::Direct { target_column } => {
                for row in load_targets(registry, load, target_column, &keys, session).await? {
                    let Some(k) = row.get(target_column).map(key_text) else {
                        continue;
                    };
                    groups.entry(k).or_default().push(row);
                }
            }
            LazyLink::Pivot {
                table,
                source_column,
                target_column,
                target_key,
            } => {
                let pivot = registry.table(table)?;
                let exposed = pivot.name.as_str();
                let compiled = Query::new()
                    .select(vec![
                        table_col(exposed, source_column).alias("parent_key"),
                        table_col(exposed, target_column).alias("child_key"),
                    ])
                    .from(table_ref(pivot, exposed))
                    .filter(
                        table_col(exposed, source_column)
                            .in_list(key_literals(&keys).into_iter().map(param).collect()),
                    )
                    .compile(session.dialect())?;
                let links = session.run(&compiled).await?;

                let mut seen = HashSet::new();
                let child_keys: Vec<Value> = links
                    .iter()
                    .filter_map(|l| l.get("child_key").cloned())
                    .filter(|k| !k.is_null() && seen.insert(key_text(k)))
                    .collect();
                if child_keys.is_empty() {
                    return Ok(groups);
                }

                let targets: HashMap<String, Value> =
                    load_targets(registry, load, target_key, &child_keys, session)
                        .await?
                        .into_iter()
                        .filter_map(|row| {
                            let k = key_text(row.get(target_key)?);
                            Some((k, row))
                        })
                        .collect();

                for link in &links {
                    let (Some(parent), Some(child)) = (link.get("parent_key"), link.get("child_key"))
                    else {
                        continue;
                    };
                    if let Some(row) = targets.get(&key_text(child)) {
                        groups.entry(key_text(parent)).or_default().push(row.clone());
                    }
                }
            }
        }
        Ok(groups)
    }
    .boxed()
}
