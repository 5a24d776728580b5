//! Flat rows back to nested objects.
//!
//! Rows are grouped by root key in first-seen order. A to-one relation becomes
//! an object or `null`; a to-many relation becomes an array with one entry per
//! distinct child key. A child whose key columns are all NULL was not matched by
//! its LEFT JOIN and is left out. Tables without a primary key are keyed by all
//! of their selected columns.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::executor::Row;
use crate::relation::{ColumnAliasPlan, Projection};
use crate::schema::ColumnType;

struct Node {
    fields: Map<String, Value>,
    /// One slot per entry of the projection's `includes`.
    children: Vec<Slot>,
}

enum Slot {
    One(Option<Box<Node>>),
    Many(IndexMap<String, Node>),
}

impl Node {
    fn new(projection: &Projection, row: &Row) -> Self {
        let mut fields = Map::new();
        for column in &projection.columns {
            let value = row
                .get(&projection.output_name(&column.name))
                .cloned()
                .unwrap_or(Value::Null);
            fields.insert(column.name.clone(), coerce(value, column.column_type));
        }
        for load in &projection.lazy {
            let key_column = projection.output_name(&load.parent_column);
            fields.insert(load.relation.clone(), load.placeholder(row, &key_column));
        }
        let children = projection
            .includes
            .iter()
            .map(|n| {
                if n.kind.is_to_many() {
                    Slot::Many(IndexMap::new())
                } else {
                    Slot::One(None)
                }
            })
            .collect();
        Self { fields, children }
    }

    fn merge(&mut self, projection: &Projection, row: &Row) {
        for (slot, node) in self.children.iter_mut().zip(&projection.includes) {
            let child = &node.projection;
            let Some(key) = row_key(child, row) else {
                continue;
            };
            let target = match slot {
                Slot::One(existing) => existing
                    .get_or_insert_with(|| Box::new(Node::new(child, row)))
                    .as_mut(),
                Slot::Many(items) => items.entry(key).or_insert_with(|| Node::new(child, row)),
            };
            target.merge(child, row);
        }
    }

    fn into_value(self, projection: &Projection) -> Value {
        let mut map = self.fields;
        for (slot, node) in self.children.into_iter().zip(&projection.includes) {
            let value = match slot {
                Slot::One(Some(child)) => child.into_value(&node.projection),
                Slot::One(None) => Value::Null,
                Slot::Many(items) => Value::Array(
                    items
                        .into_values()
                        .map(|child| child.into_value(&node.projection))
                        .collect(),
                ),
            };
            map.insert(node.relation.clone(), value);
        }
        Value::Object(map)
    }
}

/// Identity of the row's occurrence of `projection`; `None` if it is absent.
fn row_key(projection: &Projection, row: &Row) -> Option<String> {
    let values: Vec<&Value> = if projection.key.is_empty() {
        projection
            .columns
            .iter()
            .map(|c| row.get(&projection.output_name(&c.name)).unwrap_or(&Value::Null))
            .collect()
    } else {
        projection
            .key
            .iter()
            .map(|k| row.get(&projection.output_name(k)).unwrap_or(&Value::Null))
            .collect()
    };
    if values.iter().all(|v| v.is_null()) {
        return None;
    }
    Some(Value::Array(values.into_iter().cloned().collect()).to_string())
}

/// Normalize driver values to the column's declared type.
fn coerce(value: Value, column_type: ColumnType) -> Value {
    match (column_type, value) {
        (ColumnType::Bool, Value::Number(n)) => match n.as_i64() {
            Some(i) => Value::Bool(i != 0),
            None => Value::Number(n),
        },
        (ColumnType::Json, Value::String(s)) => {
            serde_json::from_str(&s).unwrap_or(Value::String(s))
        }
        (_, v) => v,
    }
}

/// Reshape `rows` according to `plan`.
pub fn hydrate(plan: &ColumnAliasPlan, rows: &[Row]) -> Vec<Value> {
    let root = &plan.root;
    let mut roots: IndexMap<String, Node> = IndexMap::new();
    for row in rows {
        let Some(key) = row_key(root, row) else {
            continue;
        };
        roots
            .entry(key)
            .or_insert_with(|| Node::new(root, row))
            .merge(root, row);
    }
    tracing::trace!(rows = rows.len(), roots = roots.len(), "hydrated rows");
    roots.into_values().map(|n| n.into_value(root)).collect()
}
