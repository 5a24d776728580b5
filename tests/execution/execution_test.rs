#[path = "../common/mod.rs"]
mod common;

use relmap::error::{ExecutorError, QueryError};
use relmap::executor::{Session, SqliteExecutor};
use relmap::filter::{Filter, RelationFilter};
use relmap::relation::Include;
use relmap::sql::SortDir;
use relmap::SelectBuilder;
use serde_json::{json, Value};

async fn ids(builder: SelectBuilder<'_>, session: &Session<SqliteExecutor>) -> Vec<i64> {
    builder
        .order_by("id", SortDir::Asc)
        .execute(session)
        .await
        .unwrap()
        .rows()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_self_join_returns_populated_manager() {
    let reg = common::registry();
    let session = common::session().await;

    let output = SelectBuilder::new(&reg, "employees")
        .unwrap()
        .include(Include::new("manager"))
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();

    let ceo = json!({ "id": 1, "manager_id": 1, "name": "CEO" });
    assert_eq!(
        output.rows(),
        &[
            json!({ "id": 1, "manager_id": 1, "name": "CEO", "manager": ceo }),
            json!({ "id": 2, "manager_id": 1, "name": "Mgr", "manager": ceo }),
        ]
    );
}

#[tokio::test]
async fn test_two_relations_to_same_table() {
    let reg = common::registry();
    let session = common::session().await;
    let builder = SelectBuilder::new(&reg, "tasks")
        .unwrap()
        .include(Include::new("creator"))
        .include(Include::new("assignee"))
        .order_by("id", SortDir::Asc);

    // Flat rows carry both prefixes.
    let compiled = builder.compile(session.dialect()).unwrap();
    let rows = session.run(&compiled).await.unwrap();
    assert_eq!(rows[0]["creator__id"], json!(1));
    assert_eq!(rows[0]["assignee__id"], json!(2));
    assert_eq!(rows[1]["creator__id"], json!(2));
    assert_eq!(rows[1]["assignee__id"], Value::Null);

    let output = builder.execute(&session).await.unwrap();
    assert_eq!(
        output.rows(),
        &[
            json!({
                "id": 1, "title": "Write docs", "creator_id": 1, "assignee_id": 2,
                "creator": { "id": 1, "name": "Ada" },
                "assignee": { "id": 2, "name": "Brian" },
            }),
            json!({
                "id": 2, "title": "Fix bug", "creator_id": 2, "assignee_id": null,
                "creator": { "id": 2, "name": "Brian" },
                "assignee": null,
            }),
        ]
    );
}

#[tokio::test]
async fn test_to_many_include_hydrates_arrays() {
    let reg = common::registry();
    let session = common::session().await;
    let output = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["title"])
        .include(Include::new("comments").columns(["body"]))
        .include(Include::new("tags").columns(["name"]))
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();

    let rows = output.rows();
    assert_eq!(rows.len(), 4);
    // Post 1 has two comments and two tags: four joined rows, one object.
    assert_eq!(
        rows[0],
        json!({
            "id": 1,
            "title": "Intro",
            "comments": [{ "id": 1, "body": "Great" }, { "id": 2, "body": "spam" }],
            "tags": [{ "id": 1, "name": "rust" }, { "id": 2, "name": "sql" }],
        })
    );
    assert_eq!(rows[1]["comments"], json!([]));
    assert_eq!(rows[1]["tags"], json!([]));
    assert_eq!(rows[2]["tags"], json!([{ "id": 2, "name": "sql" }]));
}

#[tokio::test]
async fn test_bool_columns_are_hydrated_as_bools() {
    let reg = common::registry();
    let session = common::session().await;
    let output = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["published"])
        .filter(Filter::eq("published", false))
        .execute(&session)
        .await
        .unwrap();
    assert_eq!(output.rows(), &[json!({ "id": 2, "published": false })]);
}

#[tokio::test]
async fn test_some_excludes_roots_without_matches() {
    let reg = common::registry();
    let session = common::session().await;
    let authors = |title: &str| {
        SelectBuilder::new(&reg, "authors")
            .unwrap()
            .filter(Filter::relation(
                "posts",
                RelationFilter::new().some(Filter::eq("title", title)),
            ))
    };
    assert_eq!(ids(authors("Hello"), &session).await, vec![2]);
    assert_eq!(ids(authors("Nope"), &session).await, Vec::<i64>::new());

    let by_author = SelectBuilder::new(&reg, "posts").unwrap().filter(Filter::relation(
        "author",
        RelationFilter::new().some(Filter::eq("name", "Ann")),
    ));
    assert_eq!(ids(by_author, &session).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_every_is_vacuously_true() {
    let reg = common::registry();
    let session = common::session().await;
    let builder = SelectBuilder::new(&reg, "posts").unwrap().filter(Filter::relation(
        "comments",
        RelationFilter::new().every(Filter::eq("approved", true)),
    ));
    // Post 1 has an unapproved comment; posts 2 and 4 have none at all.
    assert_eq!(ids(builder, &session).await, vec![2, 3, 4]);

    let none = SelectBuilder::new(&reg, "posts").unwrap().filter(Filter::relation(
        "comments",
        RelationFilter::new().none(Filter::eq("approved", false)),
    ));
    assert_eq!(ids(none, &session).await, vec![2, 3, 4]);
}

#[tokio::test]
async fn test_is_empty_and_is_not_empty_partition_roots() {
    let reg = common::registry();
    let session = common::session().await;
    let with = |filter: RelationFilter| {
        SelectBuilder::new(&reg, "posts")
            .unwrap()
            .filter(Filter::relation("comments", filter))
    };

    let empty = ids(with(RelationFilter::new().is_empty(true)), &session).await;
    let not_empty = ids(with(RelationFilter::new().is_not_empty(true)), &session).await;
    assert_eq!(empty, vec![2, 4]);
    assert_eq!(not_empty, vec![1, 3]);

    let mut all = [empty, not_empty].concat();
    all.sort_unstable();
    assert_eq!(all, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_nested_relation_filter_through_pivot() {
    let reg = common::registry();
    let session = common::session().await;
    let filter = Filter::from_json(&json!({
        "posts": { "some": { "tags": { "some": { "name": "sql" } }, "published": true } }
    }))
    .unwrap();
    let builder = SelectBuilder::new(&reg, "authors").unwrap().filter(filter);
    assert_eq!(ids(builder, &session).await, vec![1]);
}

#[tokio::test]
async fn test_include_filter_keeps_parents() {
    let reg = common::registry();
    let session = common::session().await;
    let output = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["title"])
        .include(
            Include::new("comments")
                .columns(["body"])
                .filter(Filter::eq("approved", true)),
        )
        .order_by("id", SortDir::Asc)
        .execute(&session)
        .await
        .unwrap();

    let rows = output.rows();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["comments"], json!([{ "id": 1, "body": "Great" }]));
    assert_eq!(rows[3]["comments"], json!([]));
}

#[tokio::test]
async fn test_count_versus_count_rows() {
    let reg = common::registry();
    let session = common::session().await;
    let builder = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts"));

    assert_eq!(builder.count(&session).await.unwrap(), 2);
    assert_eq!(builder.count_rows(&session).await.unwrap(), 4);

    let filtered = builder.filter(Filter::relation(
        "posts",
        RelationFilter::new().some(Filter::eq("published", false)),
    ));
    assert_eq!(filtered.count(&session).await.unwrap(), 1);
    assert_eq!(filtered.count_rows(&session).await.unwrap(), 3);
}

#[tokio::test]
async fn test_composite_key_count() {
    let reg = common::registry();
    let session = common::session().await;
    let builder = SelectBuilder::new(&reg, "post_tags").unwrap();
    assert_eq!(builder.count(&session).await.unwrap(), 3);
}

#[tokio::test]
async fn test_executor_errors_pass_through() {
    let reg = common::registry();
    let session = Session::new(SqliteExecutor::open_in_memory().unwrap());
    let err = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .execute(&session)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Executor(ExecutorError::Sqlite(_))));
}

#[tokio::test]
async fn test_transaction_passthrough() {
    let reg = common::registry();
    let session = common::session().await;

    session.begin_transaction().await.unwrap();
    session
        .executor()
        .execute_batch("DELETE FROM tasks;")
        .await
        .unwrap();
    session.rollback().await.unwrap();

    let tasks = SelectBuilder::new(&reg, "tasks").unwrap();
    assert_eq!(tasks.count(&session).await.unwrap(), 2);
}
