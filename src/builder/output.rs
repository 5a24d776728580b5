//! Hydrated results of an executed select.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::QueryResult;
use crate::executor::{Executor, Session};
use crate::relation::{lazy, ColumnAliasPlan};
use crate::schema::SchemaRegistry;

/// Root objects in first-seen order, possibly holding lazy placeholders.
#[derive(Debug)]
pub struct QueryOutput<'a> {
    registry: &'a SchemaRegistry,
    plan: ColumnAliasPlan,
    rows: Vec<Value>,
}

impl<'a> QueryOutput<'a> {
    pub(crate) fn new(registry: &'a SchemaRegistry, plan: ColumnAliasPlan, rows: Vec<Value>) -> Self {
        Self {
            registry,
            plan,
            rows,
        }
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Value> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn plan(&self) -> &ColumnAliasPlan {
        &self.plan
    }

    /// Whether any relation was deferred to a lazy load.
    pub fn has_lazy(&self) -> bool {
        self.plan.has_lazy()
    }

    /// Resolve every lazy placeholder: one batched query per lazy relation,
    /// issued concurrently.
    pub async fn load_all<E: Executor>(&mut self, session: &Session<E>) -> QueryResult<()> {
        lazy::load_deferred(self.registry, &self.plan, &mut self.rows, session).await
    }
}

impl Serialize for QueryOutput<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}
