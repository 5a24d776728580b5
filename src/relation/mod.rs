//! Relation handling: alias allocation, include resolution, relation filters
//! and deferred loads.
//!
//! All four pieces share one [`AliasRegistry`] per statement, which is what keeps
//! every exposed table name unique even when the same physical table is reached
//! through several relations.

pub mod alias;
pub mod filter;
pub mod include;
pub mod lazy;
pub mod resolver;

pub use alias::AliasRegistry;
pub use filter::{RelationFilterTranslator, Translation};
pub use include::{Include, IncludeTree};
pub use lazy::{LazyLink, LazyLoad, LazyRef};
pub use resolver::{ColumnAliasPlan, IncludeNode, PlanColumn, Projection, RelationResolver, Resolution};

use crate::schema::TableDef;
use crate::sql::{and_all, lit_int, table_col, Expr, ExprExt, TableRef};

/// `relation.path` form used in error messages and logs.
pub(crate) fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

/// FROM/JOIN item for `table` exposed as `exposed`; aliased only when the names differ.
pub(crate) fn table_ref(table: &TableDef, exposed: &str) -> TableRef {
    let mut t = TableRef::new(&table.name);
    if let Some(schema) = &table.schema {
        t = t.with_schema(schema);
    }
    if exposed != table.name {
        t = t.with_alias(exposed);
    }
    t
}

/// `left.a = right.b AND ...` for `(a, b)` column pairs.
pub(crate) fn key_link(left: &str, right: &str, pairs: &[(String, String)]) -> Expr {
    and_all(
        pairs
            .iter()
            .map(|(l, r)| table_col(left, l).eq(table_col(right, r))),
    )
    .unwrap_or_else(|| lit_int(1).eq(lit_int(1)))
}
