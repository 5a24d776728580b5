//! Executor contract and the session that wraps it.
//!
//! The query core never performs I/O itself: compiled SQL and its bound
//! parameters are handed to an [`Executor`], and whatever it returns (rows or
//! errors) is passed through unchanged.

pub mod sqlite;

pub use sqlite::SqliteExecutor;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::builder::Pagination;
use crate::config::Settings;
use crate::error::{ExecutorResult, QueryResult};
use crate::sql::{CompiledQuery, Dialect, Literal};

/// One result row, keyed by output column name in select order.
pub type Row = Map<String, Value>;

/// Runs SQL against a database.
///
/// Implementations decide pooling, timeouts and cancellation; the core adds
/// none of these and never retries.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Dialect the SQL handed to this executor is compiled for.
    fn dialect(&self) -> Dialect;

    /// Execute one statement. `params` line up 1:1 with the placeholders in `sql`.
    async fn execute_sql(&self, sql: &str, params: &[Literal]) -> ExecutorResult<Vec<Row>>;

    async fn begin_transaction(&self) -> ExecutorResult<()>;

    async fn commit(&self) -> ExecutorResult<()>;

    async fn rollback(&self) -> ExecutorResult<()>;
}

/// An executor plus the settings queries run under.
#[derive(Debug)]
pub struct Session<E> {
    executor: E,
    settings: Settings,
}

impl<E: Executor> Session<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            settings: Settings::default(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dialect(&self) -> Dialect {
        self.executor.dialect()
    }

    /// Page request clamped to the configured bounds.
    pub fn paginate(&self, page: u64, page_size: Option<u64>) -> Pagination {
        Pagination::new(page, page_size, &self.settings.pagination)
    }

    /// Execute a compiled query.
    pub async fn run(&self, query: &CompiledQuery) -> QueryResult<Vec<Row>> {
        tracing::debug!(
            target: "relmap.query",
            sql = %query.sql,
            params = query.params.len(),
            "executing query"
        );
        Ok(self.executor.execute_sql(&query.sql, &query.params).await?)
    }

    pub async fn begin_transaction(&self) -> QueryResult<()> {
        Ok(self.executor.begin_transaction().await?)
    }

    pub async fn commit(&self) -> QueryResult<()> {
        Ok(self.executor.commit().await?)
    }

    pub async fn rollback(&self) -> QueryResult<()> {
        Ok(self.executor.rollback().await?)
    }
}
