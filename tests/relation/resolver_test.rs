#[path = "../common/mod.rs"]
mod common;

use relmap::error::QueryError;
use relmap::filter::Filter;
use relmap::relation::{Include, IncludeTree};
use relmap::sql::Dialect;
use relmap::SelectBuilder;

fn pg(builder: &SelectBuilder<'_>) -> String {
    builder.to_sql(Dialect::Postgres).unwrap()
}

#[test]
fn test_three_level_chain() {
    let reg = common::registry();
    let builder = SelectBuilder::new(&reg, "comments").unwrap().include(
        Include::new("post").include(Include::new("comments").include(Include::new("post"))),
    );
    let sql = pg(&builder);

    assert!(
        sql.contains("LEFT JOIN \"posts\" ON \"posts\".\"id\" = \"comments\".\"post_id\""),
        "{}",
        sql
    );
    // comments -> posts (bare) -> comments (aliased) -> posts (aliased)
    assert_eq!(
        builder.build().unwrap().query.exposed_names(),
        vec!["comments", "posts", "comments_2", "post"]
    );
    assert!(sql.contains(
        "LEFT JOIN \"comments\" AS \"comments_2\" ON \"comments_2\".\"post_id\" = \"posts\".\"id\""
    ));
    assert!(sql.contains(
        "LEFT JOIN \"posts\" AS \"post\" ON \"post\".\"id\" = \"comments_2\".\"post_id\""
    ));
    assert!(sql.contains("\"post\".\"title\" AS \"post__comments__post__title\""));
}

#[test]
fn test_many_to_many_uses_pivot() {
    let reg = common::registry();
    let sql = pg(&SelectBuilder::new(&reg, "posts")
        .unwrap()
        .include(Include::new("tags")));

    assert!(sql.contains(
        "LEFT JOIN \"post_tags\" ON \"post_tags\".\"post_id\" = \"posts\".\"id\"\n\
         LEFT JOIN \"tags\" ON \"tags\".\"id\" = \"post_tags\".\"tag_id\""
    ), "{}", sql);
    assert!(sql.contains("\"tags\".\"name\" AS \"tags__name\""));
    assert!(!sql.contains("post_tags__"));
}

#[test]
fn test_include_options() {
    let reg = common::registry();
    let sql = pg(&SelectBuilder::new(&reg, "authors").unwrap().include(
        Include::new("posts")
            .columns(["title"])
            .filter(Filter::eq("published", true)),
    ));

    assert!(sql.contains(
        "LEFT JOIN \"posts\" ON \"posts\".\"author_id\" = \"authors\".\"id\" AND \"posts\".\"published\" = true"
    ), "{}", sql);
    assert!(sql.contains("\"posts\".\"id\" AS \"posts__id\""));
    assert!(sql.contains("\"posts\".\"title\" AS \"posts__title\""));
    assert!(!sql.contains("posts__author_id"));
    assert!(!sql.contains("WHERE"));
}

#[test]
fn test_lazy_includes_add_no_joins() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .select(["title"])
        .include(Include::new("author"))
        .include(Include::new("comments").lazy(true))
        .build()
        .unwrap();

    assert!(built.query.joins.is_empty());
    assert!(built.plan.has_lazy());
    let lazy: Vec<_> = built.plan.root.lazy.iter().map(|l| l.relation.as_str()).collect();
    assert_eq!(lazy, ["author", "comments"]);
    // The lazy link column is selected even when not requested.
    let columns: Vec<_> = built.plan.root.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, ["id", "title", "author_id"]);
}

#[test]
fn test_eager_override_of_lazy_relation() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .include(Include::new("author").lazy(false))
        .build()
        .unwrap();
    assert_eq!(built.query.joins.len(), 1);
    assert!(!built.plan.has_lazy());
}

#[test]
fn test_duplicate_sibling_include() {
    let reg = common::registry();
    let tree = IncludeTree::from_json_str(r#"{ "posts": { "include": { "tags": true, "tags": true } } }"#)
        .unwrap();
    let err = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include_tree(tree)
        .build()
        .unwrap_err();
    match err {
        QueryError::DuplicateIncludeRequest { path } => assert_eq!(path, "posts.tags"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_same_relation_at_different_depths_is_allowed() {
    let reg = common::registry();
    let result = SelectBuilder::new(&reg, "employees")
        .unwrap()
        .include(Include::new("manager").include(Include::new("manager")))
        .build();
    assert!(result.is_ok());
}

#[test]
fn test_unknown_names_fail_before_sql() {
    let reg = common::registry();
    let err = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .include(Include::new("editor"))
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownRelation { ref relation, .. } if relation == "editor"));

    let err = SelectBuilder::new(&reg, "posts")
        .unwrap()
        .include(Include::new("comments").columns(["rating"]))
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownColumn { ref column, .. } if column == "rating"));

    assert!(matches!(
        SelectBuilder::new(&reg, "users"),
        Err(QueryError::UnknownTable(_))
    ));
}
