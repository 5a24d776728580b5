//! Shared fixtures: a schema exercising every relation kind, and an in-memory
//! SQLite database seeded to match it.

#![allow(dead_code)]

use relmap::executor::{Session, SqliteExecutor};
use relmap::schema::{parse_schema, SchemaRegistry};
use relmap::sql::Dialect;
use serde_json::Value;
use sqlparser::dialect::{MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

pub const SCHEMA: &str = r#"
[[tables]]
name = "employees"
primary_key = "id"
columns = [
  { name = "id", type = "int" },
  { name = "manager_id", type = "int", nullable = true },
  { name = "name", type = "text" },
]

[[tables.relations]]
name = "manager"
kind = "belongs_to"
target = "employees"
foreign_key = "manager_id"

[[tables.relations]]
name = "reports"
kind = "has_many"
target = "employees"
foreign_key = "manager_id"

[[tables]]
name = "people"
primary_key = "id"
columns = [{ name = "id", type = "int" }, { name = "name", type = "text" }]

[[tables]]
name = "tasks"
primary_key = "id"
columns = [
  { name = "id", type = "int" },
  { name = "title", type = "text" },
  { name = "creator_id", type = "int" },
  { name = "assignee_id", type = "int", nullable = true },
]

[[tables.relations]]
name = "creator"
kind = "belongs_to"
target = "people"
foreign_key = "creator_id"

[[tables.relations]]
name = "assignee"
kind = "belongs_to"
target = "people"
foreign_key = "assignee_id"

[[tables]]
name = "authors"
primary_key = "id"
columns = [{ name = "id", type = "int" }, { name = "name", type = "text" }]

[[tables.relations]]
name = "posts"
kind = "has_many"
target = "posts"
foreign_key = "author_id"

[[tables]]
name = "posts"
primary_key = "id"
columns = [
  { name = "id", type = "int" },
  { name = "author_id", type = "int" },
  { name = "title", type = "text" },
  { name = "published", type = "bool" },
]

[[tables.relations]]
name = "author"
kind = "belongs_to"
target = "authors"
foreign_key = "author_id"
load = "lazy"

[[tables.relations]]
name = "comments"
kind = "has_many"
target = "comments"
foreign_key = "post_id"

[[tables.relations]]
name = "tags"
kind = "belongs_to_many"
target = "tags"
pivot = { table = "post_tags", source_key = "post_id", target_key = "tag_id" }

[[tables]]
name = "comments"
primary_key = "id"
columns = [
  { name = "id", type = "int" },
  { name = "post_id", type = "int" },
  { name = "body", type = "text" },
  { name = "approved", type = "bool" },
]

[[tables.relations]]
name = "post"
kind = "belongs_to"
target = "posts"
foreign_key = "post_id"

[[tables]]
name = "tags"
primary_key = "id"
columns = [{ name = "id", type = "int" }, { name = "name", type = "text" }]

[[tables]]
name = "post_tags"
primary_key = ["post_id", "tag_id"]
columns = [{ name = "post_id", type = "int" }, { name = "tag_id", type = "int" }]
"#;

const FIXTURES: &str = r#"
CREATE TABLE employees (id INTEGER PRIMARY KEY, manager_id INTEGER, name TEXT NOT NULL);
INSERT INTO employees VALUES (1, 1, 'CEO'), (2, 1, 'Mgr');

CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
INSERT INTO people VALUES (1, 'Ada'), (2, 'Brian');

CREATE TABLE tasks (
  id INTEGER PRIMARY KEY,
  title TEXT NOT NULL,
  creator_id INTEGER NOT NULL,
  assignee_id INTEGER
);
INSERT INTO tasks VALUES (1, 'Write docs', 1, 2), (2, 'Fix bug', 2, NULL);

CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
INSERT INTO authors VALUES (1, 'Ann'), (2, 'Ben');

CREATE TABLE posts (
  id INTEGER PRIMARY KEY,
  author_id INTEGER NOT NULL,
  title TEXT NOT NULL,
  published INTEGER NOT NULL
);
INSERT INTO posts VALUES
  (1, 1, 'Intro', 1),
  (2, 1, 'Draft', 0),
  (3, 1, 'Deep dive', 1),
  (4, 2, 'Hello', 1);

CREATE TABLE comments (
  id INTEGER PRIMARY KEY,
  post_id INTEGER NOT NULL,
  body TEXT NOT NULL,
  approved INTEGER NOT NULL
);
INSERT INTO comments VALUES (1, 1, 'Great', 1), (2, 1, 'spam', 0), (3, 3, 'Nice', 1);

CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
INSERT INTO tags VALUES (1, 'rust'), (2, 'sql');

CREATE TABLE post_tags (post_id INTEGER NOT NULL, tag_id INTEGER NOT NULL, PRIMARY KEY (post_id, tag_id));
INSERT INTO post_tags VALUES (1, 1), (1, 2), (3, 2);
"#;

pub fn registry() -> SchemaRegistry {
    parse_schema(SCHEMA).expect("fixture schema is valid")
}

/// A session over a fresh in-memory database holding the fixture rows.
pub async fn session() -> Session<SqliteExecutor> {
    let executor = SqliteExecutor::open_in_memory().expect("open in-memory sqlite");
    executor
        .execute_batch(FIXTURES)
        .await
        .expect("seed fixtures");
    Session::new(executor)
}

/// Parse `sql` with sqlparser for `dialect`.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
    };
    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

/// Values of `field` across `rows`, in order.
pub fn pluck<'a>(rows: &'a [Value], field: &str) -> Vec<&'a Value> {
    rows.iter().map(|r| &r[field]).collect()
}

/// Exposed names must be pairwise distinct.
pub fn assert_unique(names: &[String]) {
    for (i, name) in names.iter().enumerate() {
        assert!(
            !names[..i].contains(name),
            "exposed name '{}' appears twice in {:?}",
            name,
            names
        );
    }
}
