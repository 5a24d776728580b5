//! # relmap
//!
//! A relational-mapping query engine: include trees and relation filters
//! against an explicit schema registry, compiled to multi-dialect SQL, with
//! result rows reshaped back into nested objects.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        SchemaRegistry (tables, columns, relations)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │  SelectBuilder: includes, filters, order, limit/offset   │
//! │    RelationResolver  ──┐                                 │
//! │    FilterTranslator  ──┼── one AliasRegistry per query   │
//! │    LazyLoad records  ──┘                                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │       Query AST → { sql, params } per dialect            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor + hydrate]
//! ┌─────────────────────────────────────────────────────────┐
//! │   rows (`relation__column`) → nested JSON objects        │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod hydrate;
pub mod relation;
pub mod schema;
pub mod sql;

// Re-export SQL submodules at crate level
pub use sql::dialect;
pub use sql::dml;
pub use sql::expr;
pub use sql::query;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::builder::{Page, Pagination, QueryOutput, QueryRequest, SelectBuilder};
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::error::{ExecutorError, QueryError, QueryResult, SchemaError};
    pub use crate::executor::{Executor, Row, Session, SqliteExecutor};
    pub use crate::filter::{FieldOp, Filter, RelationFilter};
    pub use crate::query::{NullsOrder, SortDir};
    pub use crate::relation::{Include, IncludeTree, LazyRef};
    pub use crate::schema::{ColumnDef, ColumnType, RelationDef, SchemaRegistry, TableDef};
    pub use crate::sql::{CompiledQuery, Literal};
}

// Also export at crate root for convenience
pub use builder::SelectBuilder;
pub use dialect::Dialect;
pub use error::{QueryError, QueryResult};
pub use schema::SchemaRegistry;
pub use token::CompiledQuery;
