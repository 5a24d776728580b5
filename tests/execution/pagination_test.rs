#[path = "../common/mod.rs"]
mod common;

use relmap::builder::Pagination;
use relmap::config::{PaginationSettings, Settings};
use relmap::error::QueryError;
use relmap::filter::{Filter, RelationFilter};
use relmap::relation::Include;
use relmap::sql::SortDir;
use relmap::SelectBuilder;
use serde_json::json;

fn post_counts(rows: &[serde_json::Value]) -> Vec<usize> {
    rows.iter()
        .map(|r| r["posts"].as_array().map_or(0, Vec::len))
        .collect()
}

#[tokio::test]
async fn test_page_counts_roots_not_rows() {
    let reg = common::registry();
    let session = common::session().await;
    let page = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts"))
        .order_by("name", SortDir::Asc)
        .execute_paged(&session, session.paginate(1, Some(10)))
        .await
        .unwrap();

    assert_eq!(page.total_items, 2);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.items.len(), 2);
    assert_eq!(post_counts(page.items.rows()), vec![3, 1]);
}

#[tokio::test]
async fn test_page_size_limits_roots() {
    let reg = common::registry();
    let session = common::session().await;
    let builder = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts"))
        .order_by("name", SortDir::Asc);

    let first = builder
        .execute_paged(&session, session.paginate(1, Some(1)))
        .await
        .unwrap();
    assert_eq!(first.total_pages, 2);
    assert_eq!(common::pluck(first.items.rows(), "name"), [&json!("Ann")]);
    // All of Ann's posts survive the limit.
    assert_eq!(post_counts(first.items.rows()), vec![3]);

    let second = builder
        .execute_paged(&session, session.paginate(2, Some(1)))
        .await
        .unwrap();
    assert_eq!(common::pluck(second.items.rows(), "name"), [&json!("Ben")]);
    assert_eq!(post_counts(second.items.rows()), vec![1]);

    let past_end = builder
        .execute_paged(&session, session.paginate(3, Some(1)))
        .await
        .unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total_items, 2);
}

#[tokio::test]
async fn test_descending_order_pages() {
    let reg = common::registry();
    let session = common::session().await;
    let output = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts").columns(["title"]))
        .order_by("name", SortDir::Desc)
        .limit(1)
        .execute(&session)
        .await
        .unwrap();
    assert_eq!(
        output.rows(),
        &[json!({ "id": 2, "name": "Ben", "posts": [{ "id": 4, "title": "Hello" }] })]
    );
}

#[tokio::test]
async fn test_total_respects_filter() {
    let reg = common::registry();
    let session = common::session().await;
    let page = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts"))
        .filter(Filter::relation(
            "posts",
            RelationFilter::new().some(Filter::eq("published", false)),
        ))
        .execute_paged(&session, session.paginate(1, None))
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(common::pluck(page.items.rows(), "name"), [&json!("Ann")]);
}

#[tokio::test]
async fn test_page_size_is_clamped_by_settings() {
    let reg = common::registry();
    let settings = Settings {
        pagination: PaginationSettings {
            default_page_size: 1,
            max_page_size: 1,
        },
        ..Settings::default()
    };
    let session = common::session().await.with_settings(settings);

    let page = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .order_by("id", SortDir::Asc)
        .execute_paged(&session, session.paginate(0, Some(50)))
        .await
        .unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 1);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_page_serializes_camel_case() {
    let reg = common::registry();
    let session = common::session().await;
    let page = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .order_by("id", SortDir::Asc)
        .execute_paged(&session, session.paginate(2, Some(1)))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&page).unwrap(),
        json!({
            "items": [{ "id": 2, "name": "Ben" }],
            "totalItems": 2,
            "page": 2,
            "pageSize": 1,
            "totalPages": 2,
        })
    );
}

#[tokio::test]
async fn test_zero_page_size_is_rejected() {
    let reg = common::registry();
    let session = common::session().await;
    let err = SelectBuilder::new(&reg, "authors")
        .unwrap()
        .include(Include::new("posts"))
        .execute_paged(&session, Pagination { page: 1, page_size: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidQuery(_)), "{err}");
}
