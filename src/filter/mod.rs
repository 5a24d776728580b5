//! Predicate model for `where` clauses and include filters.
//!
//! A [`Filter`] is schema-agnostic: column and relation names are only checked
//! when the filter is translated against a table (see
//! [`crate::relation::filter`]). The JSON form mirrors the typed one:
//!
//! ```json
//! {
//!   "name": { "startsWith": "A" },
//!   "age": 30,
//!   "posts": { "some": { "published": true } },
//!   "OR": [{ "role": "admin" }, { "role": { "in": ["owner", "staff"] } }]
//! }
//! ```
//!
//! A bare scalar means `equals`; `null` means `isNull: true`. An object keyed by
//! a name whose value carries no field operator is kept as a relation filter
//! and rejected at translation if it has no relation operator either.

use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::sql::Literal;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Operator on a column of the table being filtered.
    Field { column: String, op: FieldOp },
    /// Predicate over the rows reached through a relation.
    Relation {
        relation: String,
        filter: RelationFilter,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Equals(Literal),
    Not(Literal),
    Gt(Literal),
    Gte(Literal),
    Lt(Literal),
    Lte(Literal),
    In(Vec<Literal>),
    NotIn(Vec<Literal>),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    IsNull(bool),
}

/// Relation operators. All present operators must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationFilter {
    pub some: Option<Box<Filter>>,
    pub none: Option<Box<Filter>>,
    pub every: Option<Box<Filter>>,
    pub is_empty: Option<bool>,
    pub is_not_empty: Option<bool>,
}

const FIELD_OPS: &[&str] = &[
    "equals",
    "not",
    "gt",
    "gte",
    "lt",
    "lte",
    "in",
    "notIn",
    "contains",
    "startsWith",
    "endsWith",
    "isNull",
];

const RELATION_OPS: &[&str] = &["some", "none", "every", "isEmpty", "isNotEmpty"];

// =============================================================================
// Typed construction
// =============================================================================

impl Filter {
    pub fn field(column: impl Into<String>, op: FieldOp) -> Self {
        Filter::Field {
            column: column.into(),
            op,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        let value = value.into();
        if value.is_null() {
            return Self::field(column, FieldOp::IsNull(true));
        }
        Self::field(column, FieldOp::Equals(value))
    }

    pub fn relation(relation: impl Into<String>, filter: RelationFilter) -> Self {
        Filter::Relation {
            relation: relation.into(),
            filter,
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Parse the JSON DTO form.
    pub fn from_json(value: &Value) -> QueryResult<Filter> {
        parse_filter(value, "")
    }
}

impl RelationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn some(mut self, filter: Filter) -> Self {
        self.some = Some(Box::new(filter));
        self
    }

    pub fn none(mut self, filter: Filter) -> Self {
        self.none = Some(Box::new(filter));
        self
    }

    pub fn every(mut self, filter: Filter) -> Self {
        self.every = Some(Box::new(filter));
        self
    }

    pub fn is_empty(mut self, value: bool) -> Self {
        self.is_empty = Some(value);
        self
    }

    pub fn is_not_empty(mut self, value: bool) -> Self {
        self.is_not_empty = Some(value);
        self
    }

    /// True when no operator is set.
    pub fn has_no_operator(&self) -> bool {
        self.some.is_none()
            && self.none.is_none()
            && self.every.is_none()
            && self.is_empty.is_none()
            && self.is_not_empty.is_none()
    }
}

// =============================================================================
// JSON parsing
// =============================================================================

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn invalid(path: &str, message: impl Into<String>) -> QueryError {
    QueryError::InvalidFilter {
        path: if path.is_empty() { "<root>".into() } else { path.to_string() },
        message: message.into(),
    }
}

fn parse_filter(value: &Value, path: &str) -> QueryResult<Filter> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(path, "expected an object"))?;

    let mut parts = Vec::with_capacity(obj.len());
    for (key, val) in obj {
        match key.as_str() {
            "AND" => parts.push(Filter::And(parse_list(val, &join_path(path, key))?)),
            "OR" => parts.push(Filter::Or(parse_list(val, &join_path(path, key))?)),
            "NOT" => {
                let inner = parse_list(val, &join_path(path, key))?;
                parts.push(Filter::not(single_or_and(inner)));
            }
            _ => parts.extend(parse_entry(key, val, path)?),
        }
    }
    Ok(single_or_and(parts))
}

fn single_or_and(mut parts: Vec<Filter>) -> Filter {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Filter::And(parts)
    }
}

/// `AND`/`OR`/`NOT` take either one filter object or a list of them.
fn parse_list(value: &Value, path: &str) -> QueryResult<Vec<Filter>> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| parse_filter(v, &format!("{}[{}]", path, i)))
            .collect(),
        Value::Object(_) => Ok(vec![parse_filter(value, path)?]),
        _ => Err(invalid(path, "expected a filter object or a list of them")),
    }
}

fn parse_entry(key: &str, value: &Value, path: &str) -> QueryResult<Vec<Filter>> {
    let here = join_path(path, key);
    match value {
        Value::Object(ops) => {
            if ops.keys().any(|k| RELATION_OPS.contains(&k.as_str())) {
                Ok(vec![Filter::relation(key, parse_relation(ops, &here)?)])
            } else if !ops.is_empty() && ops.keys().all(|k| FIELD_OPS.contains(&k.as_str())) {
                parse_field_ops(key, ops, &here)
            } else {
                // Neither field nor relation operators: the translator decides
                // which error applies once it knows whether `key` is a relation.
                Ok(vec![Filter::relation(key, RelationFilter::new())])
            }
        }
        Value::Array(_) => Err(invalid(&here, "bare arrays are not filters; use `in`")),
        scalar => {
            let lit = scalar_literal(scalar, &here)?;
            Ok(vec![Filter::eq(key, lit)])
        }
    }
}

fn parse_relation(ops: &Map<String, Value>, path: &str) -> QueryResult<RelationFilter> {
    let mut rf = RelationFilter::new();
    for (op, val) in ops {
        match op.as_str() {
            "some" => rf.some = Some(Box::new(parse_filter(val, path)?)),
            "none" => rf.none = Some(Box::new(parse_filter(val, path)?)),
            "every" => rf.every = Some(Box::new(parse_filter(val, path)?)),
            "isEmpty" => rf.is_empty = Some(bool_value(val, path, op)?),
            "isNotEmpty" => rf.is_not_empty = Some(bool_value(val, path, op)?),
            other => {
                return Err(invalid(
                    path,
                    format!("'{}' cannot be mixed with relation operators", other),
                ))
            }
        }
    }
    Ok(rf)
}

fn parse_field_ops(column: &str, ops: &Map<String, Value>, path: &str) -> QueryResult<Vec<Filter>> {
    let mut out = Vec::with_capacity(ops.len());
    for (op, val) in ops {
        let filter = match op.as_str() {
            "equals" => Filter::eq(column, scalar_literal(val, path)?),
            "not" => match val {
                Value::Object(inner) => Filter::not(single_or_and(parse_field_ops(column, inner, path)?)),
                Value::Null => Filter::field(column, FieldOp::IsNull(false)),
                v => Filter::field(column, FieldOp::Not(scalar_literal(v, path)?)),
            },
            "gt" => Filter::field(column, FieldOp::Gt(scalar_literal(val, path)?)),
            "gte" => Filter::field(column, FieldOp::Gte(scalar_literal(val, path)?)),
            "lt" => Filter::field(column, FieldOp::Lt(scalar_literal(val, path)?)),
            "lte" => Filter::field(column, FieldOp::Lte(scalar_literal(val, path)?)),
            "in" => Filter::field(column, FieldOp::In(literal_list(val, path)?)),
            "notIn" => Filter::field(column, FieldOp::NotIn(literal_list(val, path)?)),
            "contains" => Filter::field(column, FieldOp::Contains(string_value(val, path, op)?)),
            "startsWith" => Filter::field(column, FieldOp::StartsWith(string_value(val, path, op)?)),
            "endsWith" => Filter::field(column, FieldOp::EndsWith(string_value(val, path, op)?)),
            "isNull" => Filter::field(column, FieldOp::IsNull(bool_value(val, path, op)?)),
            other => return Err(invalid(path, format!("unknown operator '{}'", other))),
        };
        out.push(filter);
    }
    Ok(out)
}

fn scalar_literal(value: &Value, path: &str) -> QueryResult<Literal> {
    Literal::from_json(value).ok_or_else(|| invalid(path, "expected a scalar value"))
}

fn literal_list(value: &Value, path: &str) -> QueryResult<Vec<Literal>> {
    value
        .as_array()
        .ok_or_else(|| invalid(path, "expected a list of values"))?
        .iter()
        .map(|v| scalar_literal(v, path))
        .collect()
}

fn bool_value(value: &Value, path: &str, op: &str) -> QueryResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| invalid(path, format!("'{}' takes a boolean", op)))
}

fn string_value(value: &Value, path: &str, op: &str) -> QueryResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(path, format!("'{}' takes a string", op)))
}
