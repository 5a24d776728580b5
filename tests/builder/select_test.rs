#[path = "../common/mod.rs"]
mod common;

use relmap::builder::QueryRequest;
use relmap::error::QueryError;
use relmap::filter::{Filter, RelationFilter};
use relmap::relation::Include;
use relmap::sql::{Dialect, NullsOrder, SortDir};
use relmap::SelectBuilder;

#[test]
fn test_self_join_sql() {
    let reg = common::registry();
    let sql = SelectBuilder::new(&reg, "employees")
        .unwrap()
        .include(Include::new("manager"))
        .to_sql(Dialect::Postgres)
        .unwrap();

    insta::assert_snapshot!(sql, @r#"
    SELECT
      "employees"."id" AS "id",
      "employees"."manager_id" AS "manager_id",
      "employees"."name" AS "name",
      "manager"."id" AS "manager__id",
      "manager"."manager_id" AS "manager__manager_id",
      "manager"."name" AS "manager__name"
    FROM "employees"
    LEFT JOIN "employees" AS "manager" ON "manager"."id" = "employees"."manager_id"
    "#);
}

#[test]
fn test_compile_is_stable_across_runs() {
    let reg = common::registry();
    let compile = || {
        SelectBuilder::new(&reg, "authors")
            .unwrap()
            .include(
                Include::new("posts")
                    .include(Include::new("tags"))
                    .include(Include::new("comments").columns(["body"])),
            )
            .filter(Filter::relation(
                "posts",
                RelationFilter::new()
                    .some(Filter::eq("published", true))
                    .every(Filter::eq("title", "Intro")),
            ))
            .order_by("name", SortDir::Asc)
            .compile(Dialect::Sqlite)
            .unwrap()
    };
    let first = compile();
    for _ in 0..5 {
        assert_eq!(compile(), first);
    }
}

#[test]
fn test_parameters_follow_placeholder_order() {
    let reg = common::registry();
    let compiled = SelectBuilder::new(&reg, "tasks")
        .unwrap()
        .include(Include::new("assignee").filter(Filter::eq("name", "Brian")))
        .filter(Filter::eq("title", "Write docs"))
        .filter(Filter::relation(
            "creator",
            RelationFilter::new().some(Filter::eq("name", "Ada")),
        ))
        .compile(Dialect::Postgres)
        .unwrap();

    // Join ON clauses come before WHERE in the statement text.
    let positions: Vec<usize> = ["$1", "$2", "$3"]
        .iter()
        .map(|p| compiled.sql.find(p).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(
        serde_json::to_value(&compiled.params).unwrap(),
        serde_json::json!(["Brian", "Write docs", "Ada"])
    );
}

#[test]
fn test_select_always_keeps_primary_key() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["title"])
        .build()
        .unwrap();
    let names: Vec<_> = built
        .query
        .select
        .iter()
        .filter_map(|s| s.alias.as_deref())
        .collect();
    assert_eq!(names, ["id", "title"]);
}

#[test]
fn test_count_query_shapes() {
    let reg = common::registry();

    let sql = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts"))
        .count_query()
        .unwrap()
        .to_sql(Dialect::Postgres)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT\n  COUNT(DISTINCT \"authors\".\"id\") AS \"count\"\nFROM \"authors\""
    );

    let sql = SelectBuilder::new(&reg, "post_tags")
        .unwrap()
        .count_query()
        .unwrap()
        .to_sql(Dialect::Postgres)
        .unwrap();
    assert!(sql.starts_with("SELECT\n  COUNT(*) AS \"count\"\nFROM (SELECT DISTINCT"), "{}", sql);
    assert!(sql.ends_with(") AS \"counted\""));
}

#[test]
fn test_limit_without_to_many_applies_directly() {
    let reg = common::registry();
    let sql = SelectBuilder::new(&reg, "tasks")
        .unwrap()
        .include(Include::new("creator"))
        .order_by("creator.name", SortDir::Desc)
        .limit(1)
        .to_sql(Dialect::TSql)
        .unwrap();
    assert!(sql.starts_with("SELECT TOP 1\n"), "{}", sql);
    assert!(!sql.contains("page_keys"));
}

#[test]
fn test_paging_with_to_many_keeps_to_one_joins_for_ordering() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .include(Include::new("author").lazy(false))
        .include(Include::new("comments"))
        .order_by("author.name", SortDir::Asc)
        .limit(2)
        .offset(2)
        .build()
        .unwrap();

    let names = built.query.exposed_names();
    assert_eq!(names, vec!["posts", "authors", "comments"]);
    let sql = built.query.to_sql(Dialect::Postgres).unwrap();
    assert!(sql.contains(
        "FROM \"posts\" AS \"posts_2\"\nLEFT JOIN \"authors\" AS \"author\" ON \"author\".\"id\" = \"posts_2\".\"author_id\""
    ), "{}", sql);
    assert!(sql.contains("ORDER BY \"author\".\"name\" ASC, \"posts_2\".\"id\" ASC\nLIMIT 2 OFFSET 2) AS \"page_keys\")"));
    assert!(sql.ends_with("ORDER BY \"authors\".\"name\" ASC"));
    assert!(built.query.unresolved_references().is_empty());
    common::validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_nulls_ordering() {
    let reg = common::registry();
    let builder = SelectBuilder::new(&reg, "tasks")
        .unwrap()
        .order_by_nulls("assignee_id", SortDir::Asc, Some(NullsOrder::Last));
    assert!(builder
        .to_sql(Dialect::Postgres)
        .unwrap()
        .ends_with("ORDER BY \"tasks\".\"assignee_id\" ASC NULLS LAST"));
    assert!(matches!(
        builder.to_sql(Dialect::MySql),
        Err(QueryError::UnsupportedDialectConstruct { .. })
    ));
}

#[test]
fn test_request_round_trip() {
    let reg = common::registry();
    let request = QueryRequest::from_json_str(
        r#"{
            "table": "authors",
            "where": { "posts": { "isNotEmpty": true } },
            "include": { "posts": { "columns": ["title"], "include": { "tags": true } } },
            "orderBy": [{ "path": "name" }]
        }"#,
    )
    .unwrap();
    let from_json = request.into_builder(&reg).unwrap().compile(Dialect::MySql).unwrap();

    let typed = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .filter(Filter::relation("posts", RelationFilter::new().is_not_empty(true)))
        .include(Include::new("posts").columns(["title"]).include(Include::new("tags")))
        .order_by("name", SortDir::Asc)
        .compile(Dialect::MySql)
        .unwrap();
    assert_eq!(from_json, typed);
}
