//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that generates multi-dialect SQL.
//! It includes:
//!
//! - [`query`] - SELECT query AST and compiler
//! - [`expr`] - Expression AST and builder DSL
//! - [`dml`] - INSERT with dialect-specific upsert
//! - [`token`] - Token types, placeholder numbering and parameter collection
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod dml;
pub mod expr;
pub mod query;
pub mod token;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect, UpsertStyle};
pub use expr::{
    and_all, col, count_distinct, count_star, exists, lit_bool, lit_int, lit_null, lit_str,
    not_exists, param, star, table_col,
    BinaryOperator, Expr, ExprExt, Literal, UnaryOperator,
};
pub use query::{
    Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
    TableSource,
};
pub use token::{CompiledQuery, Token, TokenStream};

pub use dml::{Insert, OnConflict};
