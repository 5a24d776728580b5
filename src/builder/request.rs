//! JSON query requests.
//!
//! ```json
//! {
//!   "table": "employees",
//!   "select": ["name"],
//!   "where": { "manager": { "some": { "name": { "startsWith": "A" } } } },
//!   "include": { "manager": true, "reports": { "columns": ["name"] } },
//!   "orderBy": [{ "path": "name", "dir": "desc" }],
//!   "limit": 10
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::SelectBuilder;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::relation::IncludeTree;
use crate::schema::SchemaRegistry;
use crate::sql::{NullsOrder, SortDir};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryRequest {
    pub table: String,
    #[serde(default)]
    pub select: Option<Vec<String>>,
    /// Filter DTO, parsed by [`Filter::from_json`].
    #[serde(default, rename = "where")]
    pub filter: Option<Value>,
    #[serde(default)]
    pub include: IncludeTree,
    #[serde(default)]
    pub order_by: Vec<OrderRequest>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderRequest {
    pub path: String,
    #[serde(default)]
    pub dir: SortDir,
    #[serde(default)]
    pub nulls: Option<NullsOrder>,
}

impl QueryRequest {
    pub fn from_json_str(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| QueryError::InvalidQuery(format!("malformed query request: {}", e)))
    }

    pub fn into_builder(self, registry: &SchemaRegistry) -> QueryResult<SelectBuilder<'_>> {
        let mut builder = SelectBuilder::new(registry, &self.table)?.include_tree(self.include);
        if let Some(columns) = self.select {
            builder = builder.select(columns);
        }
        if let Some(filter) = &self.filter {
            builder = builder.filter(Filter::from_json(filter)?);
        }
        for order in self.order_by {
            builder = builder.order_by_nulls(order.path, order.dir, order.nulls);
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }
        if let Some(offset) = self.offset {
            builder = builder.offset(offset);
        }
        Ok(builder)
    }
}
