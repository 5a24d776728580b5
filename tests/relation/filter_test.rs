#[path = "../common/mod.rs"]
mod common;

use relmap::error::QueryError;
use relmap::filter::{FieldOp, Filter, RelationFilter};
use relmap::relation::Include;
use relmap::sql::{Dialect, Literal};
use relmap::SelectBuilder;
use serde_json::json;

fn where_clause(table: &str, filter: Filter) -> String {
    let reg = common::registry();
    let sql = SelectBuilder::new(&reg, table)
        .unwrap()
        .filter(filter)
        .to_sql(Dialect::Postgres)
        .unwrap();
    common::validate_sql(&sql, Dialect::Postgres).unwrap();
    sql
}

#[test]
fn test_some_on_to_many_is_exists() {
    let sql = where_clause(
        "authors",
        Filter::relation("posts", RelationFilter::new().some(Filter::eq("published", true))),
    );
    assert!(!sql.contains("JOIN"), "{}", sql);
    assert!(sql.contains("WHERE EXISTS (SELECT\n  1\nFROM \"posts\"\nWHERE \"posts\".\"author_id\" = \"authors\".\"id\" AND \"posts\".\"published\" = true)"), "{}", sql);
}

#[test]
fn test_some_on_to_one_joins_under_own_alias() {
    let sql = where_clause(
        "posts",
        Filter::and(vec![
            Filter::relation("comments", RelationFilter::new().is_not_empty(true)),
            Filter::relation("author", RelationFilter::new().some(Filter::eq("name", "Ann"))),
        ]),
    );
    assert!(sql.contains("LEFT JOIN \"authors\" ON \"authors\".\"id\" = \"posts\".\"author_id\""), "{}", sql);
    assert!(sql.contains("\"authors\".\"id\" IS NOT NULL AND \"authors\".\"name\" = 'Ann'"));
}

#[test]
fn test_some_under_or_never_joins() {
    let sql = where_clause(
        "posts",
        Filter::or(vec![
            Filter::eq("title", "Intro"),
            Filter::relation("author", RelationFilter::new().some(Filter::eq("name", "Ann"))),
        ]),
    );
    assert!(!sql.contains("JOIN"), "{}", sql);
    assert!(sql.contains(" OR EXISTS ("));
}

#[test]
fn test_none_and_every() {
    let none = where_clause(
        "posts",
        Filter::relation("comments", RelationFilter::new().none(Filter::eq("approved", false))),
    );
    assert!(none.contains("WHERE NOT EXISTS (SELECT"));
    assert!(none.contains("\"comments\".\"approved\" = false)"));

    let every = where_clause(
        "posts",
        Filter::relation("comments", RelationFilter::new().every(Filter::eq("approved", true))),
    );
    assert!(every.contains(
        "NOT EXISTS (SELECT\n  1\nFROM \"comments\"\nWHERE \"comments\".\"post_id\" = \"posts\".\"id\" AND CASE WHEN \"comments\".\"approved\" = true THEN 1 ELSE 0 END = 0)"
    ), "{}", every);
}

#[test]
fn test_is_empty_and_is_not_empty_are_complements() {
    let empty = where_clause(
        "posts",
        Filter::relation("comments", RelationFilter::new().is_empty(true)),
    );
    let not_empty = where_clause(
        "posts",
        Filter::relation("comments", RelationFilter::new().is_not_empty(true)),
    );
    let subquery = "EXISTS (SELECT\n  1\nFROM \"comments\"\nWHERE \"comments\".\"post_id\" = \"posts\".\"id\")";
    assert!(empty.contains(&format!("WHERE NOT {}", subquery)), "{}", empty);
    assert!(not_empty.contains(&format!("WHERE {}", subquery)), "{}", not_empty);

    let flipped = where_clause(
        "posts",
        Filter::relation("comments", RelationFilter::new().is_empty(false)),
    );
    assert!(flipped.contains(&format!("WHERE {}", subquery)));
}

#[test]
fn test_some_and_none_on_same_relation_are_independent() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .filter(Filter::relation(
            "comments",
            RelationFilter::new()
                .some(Filter::eq("approved", true))
                .none(Filter::eq("approved", false)),
        ))
        .build()
        .unwrap();
    let sql = built.query.to_sql(Dialect::Postgres).unwrap();
    assert!(sql.contains("FROM \"comments\"\n"));
    assert!(sql.contains("FROM \"comments\" AS \"comments_2\""), "{}", sql);
    assert!(sql.contains(") AND NOT EXISTS ("));
    assert!(built.query.unresolved_references().is_empty());
}

#[test]
fn test_nested_relation_filters() {
    let sql = where_clause(
        "authors",
        Filter::from_json(&json!({
            "posts": { "some": { "tags": { "some": { "name": "rust" } } } }
        }))
        .unwrap(),
    );
    assert!(sql.contains("WHERE EXISTS (SELECT"));
    assert!(sql.contains("FROM \"post_tags\"\nINNER JOIN \"tags\" ON \"tags\".\"id\" = \"post_tags\".\"tag_id\""), "{}", sql);
    assert!(sql.contains("\"post_tags\".\"post_id\" = \"posts\".\"id\""));
    assert!(sql.contains("\"tags\".\"name\" = 'rust'"));
}

#[test]
fn test_missing_operator_names_innermost_relation() {
    let reg = common::registry();
    let filter = Filter::from_json(&json!({
        "posts": { "some": { "comments": { "approved": true } } }
    }))
    .unwrap();
    let err = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .filter(filter)
        .build()
        .unwrap_err();
    match err {
        QueryError::RelationFilterMissingOperator { path } => assert_eq!(path, "posts.comments"),
        other => panic!("unexpected error: {other}"),
    }

    let err = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .filter(Filter::relation("posts", RelationFilter::new()))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::RelationFilterMissingOperator { ref path } if path == "posts"
    ));
}

#[test]
fn test_filter_columns_are_checked() {
    let reg = common::registry();
    let err = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .filter(Filter::field("rating", FieldOp::Gt(Literal::Int(3))))
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownColumn { .. }));
}

#[test]
fn test_field_ops_bind_parameters_in_order() {
    let reg = common::registry();
    let compiled = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .filter(Filter::field("title", FieldOp::StartsWith("50%".into())))
        .filter(Filter::field(
            "id",
            FieldOp::In(vec![Literal::Int(1), Literal::Int(2)]),
        ))
        .filter(Filter::field("author_id", FieldOp::IsNull(false)))
        .compile(Dialect::Postgres)
        .unwrap();

    assert!(compiled.sql.ends_with(
        "WHERE \"posts\".\"title\" LIKE $1 ESCAPE '!' AND \"posts\".\"id\" IN ($2, $3) AND \"posts\".\"author_id\" IS NOT NULL"
    ), "{}", compiled.sql);
    assert_eq!(
        compiled.params,
        vec![
            Literal::String("50!%%".into()),
            Literal::Int(1),
            Literal::Int(2)
        ]
    );
}

#[test]
fn test_display_and_filter_on_same_to_many_relation() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts"))
        .filter(Filter::relation(
            "posts",
            RelationFilter::new().some(Filter::eq("title", "Hello")),
        ))
        .build()
        .unwrap();
    let sql = built.query.to_sql(Dialect::Sqlite).unwrap();
    // The display join keeps every post; the filter probes its own occurrence.
    assert!(sql.contains("LEFT JOIN \"posts\" ON \"posts\".\"author_id\" = \"authors\".\"id\"\n"));
    assert!(sql.contains("FROM \"posts\" AS \"posts_2\""), "{}", sql);
    assert!(sql.contains("\"posts_2\".\"title\" = 'Hello'"));
}
