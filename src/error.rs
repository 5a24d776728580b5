//! Error types for query building, schema loading and execution.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for query building and compilation.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for schema registration and loading.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for executor calls.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors raised while building or compiling a query.
///
/// Everything except `Executor` is reported before any SQL reaches the database.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A relation-keyed filter object has none of `some`, `none`, `every`,
    /// `isEmpty`, `isNotEmpty`.
    #[error(
        "relation filter on '{path}' needs one of: some, none, every, isEmpty, isNotEmpty"
    )]
    RelationFilterMissingOperator { path: String },

    /// The same relation was requested twice among siblings of one include tree.
    #[error("relation '{path}' is included more than once")]
    DuplicateIncludeRequest { path: String },

    #[error("table '{table}' has no relation named '{relation}'")]
    UnknownRelation { table: String, relation: String },

    #[error("table '{table}' has no column named '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// The target dialect has no rendering for a construct the query uses.
    #[error("{dialect} cannot express {construct}")]
    UnsupportedDialectConstruct {
        dialect: &'static str,
        construct: String,
    },

    #[error("table '{table}' has no primary key")]
    MissingPrimaryKey { table: String },

    #[error("invalid filter at '{path}': {message}")]
    InvalidFilter { path: String, message: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl QueryError {
    pub(crate) fn unsupported(dialect: &'static str, construct: impl Into<String>) -> Self {
        QueryError::UnsupportedDialectConstruct {
            dialect,
            construct: construct.into(),
        }
    }
}

/// Errors raised while registering or loading table definitions.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("table '{0}' is already registered")]
    DuplicateTable(String),

    #[error("table '{table}' declares relation '{relation}' twice")]
    DuplicateRelation { table: String, relation: String },

    #[error("relation '{table}.{relation}' targets unknown table '{target}'")]
    UnknownTarget {
        table: String,
        relation: String,
        target: String,
    },

    #[error("'{context}' references unknown column '{table}.{column}'")]
    UnknownKeyColumn {
        context: String,
        table: String,
        column: String,
    },

    #[error("relation '{table}.{relation}': {message}")]
    InvalidRelation {
        table: String,
        relation: String,
        message: String,
    },

    #[error("schema file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read schema file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse schema file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Errors surfaced by an executor. Passed through unchanged.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("database error: {0}")]
    Database(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("transaction error: {0}")]
    Transaction(String),
}
