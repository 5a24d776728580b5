//! Reference executor over an embedded SQLite connection.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Executor, Row};
use crate::error::{ExecutorError, ExecutorResult};
use crate::sql::{Dialect, Literal};

/// Single-connection SQLite executor. Statements are serialized on the connection.
#[derive(Debug)]
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn open_in_memory() -> ExecutorResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> ExecutorResult<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run one or more parameterless statements (DDL, fixtures).
    pub async fn execute_batch(&self, sql: &str) -> ExecutorResult<()> {
        self.conn.lock().await.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute_sql(&self, sql: &str, params: &[Literal]) -> ExecutorResult<Vec<Row>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            out.push(map);
        }
        tracing::trace!(rows = out.len(), "sqlite statement finished");
        Ok(out)
    }

    async fn begin_transaction(&self) -> ExecutorResult<()> {
        tracing::info!("sqlite: begin transaction");
        self.run_control("BEGIN").await
    }

    async fn commit(&self) -> ExecutorResult<()> {
        tracing::info!("sqlite: commit");
        self.run_control("COMMIT").await
    }

    async fn rollback(&self) -> ExecutorResult<()> {
        tracing::info!("sqlite: rollback");
        self.run_control("ROLLBACK").await
    }
}

impl SqliteExecutor {
    async fn run_control(&self, statement: &str) -> ExecutorResult<()> {
        self.conn
            .lock()
            .await
            .execute_batch(statement)
            .map_err(|e| ExecutorError::Transaction(format!("{}: {}", statement, e)))
    }
}

impl ToSql for Literal {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Literal::Int(n) => n.to_sql(),
            Literal::Float(f) => f.to_sql(),
            Literal::String(s) | Literal::Date(s) | Literal::Timestamp(s) => s.to_sql(),
            Literal::Bool(b) => b.to_sql(),
            Literal::Null => Ok(ToSqlOutput::Owned(rusqlite::types::Value::Null)),
        }
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
