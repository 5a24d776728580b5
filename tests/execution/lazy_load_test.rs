#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use relmap::error::ExecutorResult;
use relmap::executor::{Executor, Row, Session, SqliteExecutor};
use relmap::filter::Filter;
use relmap::relation::{Include, LazyRef};
use relmap::sql::{Dialect, Literal, SortDir};
use relmap::SelectBuilder;
use serde_json::{json, Value};

/// Counts statements so tests can check batching.
struct Counting {
    inner: SqliteExecutor,
    statements: AtomicUsize,
}

#[async_trait]
impl Executor for Counting {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn execute_sql(&self, sql: &str, params: &[Literal]) -> ExecutorResult<Vec<Row>> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        self.inner.execute_sql(sql, params).await
    }

    async fn begin_transaction(&self) -> ExecutorResult<()> {
        self.inner.begin_transaction().await
    }

    async fn commit(&self) -> ExecutorResult<()> {
        self.inner.commit().await
    }

    async fn rollback(&self) -> ExecutorResult<()> {
        self.inner.rollback().await
    }
}

async fn counting_session() -> Session<Counting> {
    let inner = common::session().await.into_executor();
    Session::new(Counting {
        inner,
        statements: AtomicUsize::new(0),
    })
}

fn sorted_names(items: &Value, field: &str) -> Vec<String> {
    let mut names: Vec<String> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i[field].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_to_one_placeholder_then_resolved() {
    let reg = common::registry();
    let session = common::session().await;
    let mut output = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["title"])
        .include(Include::new("author"))
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();

    assert!(output.has_lazy());
    assert_eq!(
        output.rows()[0],
        json!({
            "id": 1,
            "title": "Intro",
            "author_id": 1,
            "author": { "key": 1, "resolved": false },
        })
    );
    assert_eq!(
        LazyRef::from_value(&output.rows()[3]["author"]),
        Some(LazyRef::pending(json!(2)))
    );

    output.load_all(&session).await.unwrap();
    let authors: Vec<&Value> = output.rows().iter().map(|r| &r["author"]).collect();
    let ann = json!({ "id": 1, "name": "Ann" });
    let ben = json!({ "id": 2, "name": "Ben" });
    assert_eq!(authors, [&ann, &ann, &ann, &ben]);
}

#[tokio::test]
async fn test_lazy_to_many_gets_empty_arrays() {
    let reg = common::registry();
    let session = common::session().await;
    let mut output = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["title"])
        .include(Include::new("comments").lazy(true).columns(["body"]))
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();
    output.load_all(&session).await.unwrap();

    let rows = output.rows();
    assert_eq!(sorted_names(&rows[0]["comments"], "body"), ["Great", "spam"]);
    assert_eq!(rows[1]["comments"], json!([]));
    assert_eq!(
        rows[2]["comments"],
        json!([{ "id": 3, "body": "Nice", "post_id": 3 }])
    );
    assert_eq!(rows[3]["comments"], json!([]));
}

#[tokio::test]
async fn test_lazy_pivot_relation() {
    let reg = common::registry();
    let session = common::session().await;
    let mut output = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["title"])
        .include(Include::new("tags").lazy(true))
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();
    output.load_all(&session).await.unwrap();

    let rows = output.rows();
    assert_eq!(sorted_names(&rows[0]["tags"], "name"), ["rust", "sql"]);
    assert_eq!(rows[1]["tags"], json!([]));
    assert_eq!(rows[2]["tags"], json!([{ "id": 2, "name": "sql" }]));
    assert_eq!(rows[3]["tags"], json!([]));
}

#[tokio::test]
async fn test_lazy_include_honors_filter_and_nested_includes() {
    let reg = common::registry();
    let session = common::session().await;
    let mut output = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(
            Include::new("posts")
                .lazy(true)
                .columns(["title"])
                .filter(Filter::eq("published", true))
                .include(Include::new("comments").columns(["body"])),
        )
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();
    output.load_all(&session).await.unwrap();

    let rows = output.rows();
    assert_eq!(sorted_names(&rows[0]["posts"], "title"), ["Deep dive", "Intro"]);
    assert_eq!(sorted_names(&rows[1]["posts"], "title"), ["Hello"]);

    let intro = rows[0]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["title"] == "Intro")
        .unwrap();
    assert_eq!(sorted_names(&intro["comments"], "body"), ["Great", "spam"]);
}

#[tokio::test]
async fn test_lazy_inside_eager_include() {
    let reg = common::registry();
    let session = common::session().await;
    let mut output = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts").include(Include::new("author")))
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();
    output.load_all(&session).await.unwrap();

    for author in output.rows() {
        for post in author["posts"].as_array().unwrap() {
            assert_eq!(post["author"]["id"], author["id"]);
            assert_eq!(post["author"]["name"], author["name"]);
        }
    }
}

#[tokio::test]
async fn test_null_foreign_key_has_no_placeholder() {
    let reg = common::registry();
    let session = common::session().await;
    let mut output = SelectBuilder::new(&reg, "tasks")
        .unwrap()
        .include(Include::new("assignee").lazy(true))
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();
    assert_eq!(output.rows()[1]["assignee"], Value::Null);

    output.load_all(&session).await.unwrap();
    assert_eq!(output.rows()[0]["assignee"], json!({ "id": 2, "name": "Brian" }));
    assert_eq!(output.rows()[1]["assignee"], Value::Null);
}

#[tokio::test]
async fn test_one_batch_per_lazy_relation() {
    let reg = common::registry();
    let session = counting_session().await;
    let mut output = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .include(Include::new("author"))
        .include(Include::new("comments").lazy(true))
        .include(Include::new("tags").lazy(true))
        .execute(&session)
        .await
        .unwrap();
    assert_eq!(session.executor().statements.load(Ordering::SeqCst), 1);

    output.load_all(&session).await.unwrap();
    // author and comments batch once each; tags reads the pivot, then the targets.
    assert_eq!(session.executor().statements.load(Ordering::SeqCst), 5);

    output.load_all(&session).await.unwrap();
    assert_eq!(session.executor().statements.load(Ordering::SeqCst), 5);
}
