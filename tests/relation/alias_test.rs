#[path = "../common/mod.rs"]
mod common;

use relmap::filter::{Filter, RelationFilter};
use relmap::relation::{AliasRegistry, Include};
use relmap::sql::Dialect;
use relmap::SelectBuilder;

#[test]
fn test_first_reservation_is_bare_then_relation_hint() {
    let mut aliases = AliasRegistry::new();
    assert_eq!(aliases.reserve("employees", None), "employees");
    assert_eq!(aliases.reserve("employees", Some("manager")), "manager");
    assert_eq!(aliases.reserve("employees", Some("manager")), "employees_2");
    assert_eq!(aliases.reserve("employees", None), "employees_3");
    assert_eq!(
        aliases.names_for("employees"),
        vec!["employees", "manager", "employees_2", "employees_3"]
    );
}

#[test]
fn test_self_join_aliases_second_occurrence_only() {
    let reg = common::registry();
    let sql = SelectBuilder::new(&reg, "employees")
        .unwrap()
        .include(Include::new("manager"))
        .to_sql(Dialect::Postgres)
        .unwrap();

    assert!(sql.contains("FROM \"employees\"\n"), "{}", sql);
    assert!(
        sql.contains(
            "LEFT JOIN \"employees\" AS \"manager\" ON \"manager\".\"id\" = \"employees\".\"manager_id\""
        ),
        "{}",
        sql
    );
}

#[test]
fn test_two_relations_to_one_table() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "tasks")
        .unwrap()
        .include(Include::new("creator"))
        .include(Include::new("assignee"))
        .build()
        .unwrap();

    assert_eq!(
        built.query.exposed_names(),
        vec!["tasks", "people", "assignee"]
    );
    let sql = built.query.to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("LEFT JOIN \"people\" ON \"people\".\"id\" = \"tasks\".\"creator_id\""));
    assert!(sql.contains(
        "LEFT JOIN \"people\" AS \"assignee\" ON \"assignee\".\"id\" = \"tasks\".\"assignee_id\""
    ));
    assert!(sql.contains("\"people\".\"id\" AS \"creator__id\""));
    assert!(sql.contains("\"assignee\".\"id\" AS \"assignee__id\""));
}

#[test]
fn test_exposed_names_unique_in_deep_trees() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "employees")
        .unwrap()
        .include(
            Include::new("manager").include(Include::new("manager").include(Include::new("reports"))),
        )
        .include(Include::new("reports").include(Include::new("manager")))
        .filter(Filter::relation(
            "manager",
            RelationFilter::new().some(Filter::eq("name", "CEO")),
        ))
        .build()
        .unwrap();

    let names = built.query.exposed_names();
    common::assert_unique(&names);
    assert_eq!(
        names,
        vec![
            "employees",
            "manager",
            "employees_2",
            "reports",
            "employees_3",
            "employees_4",
            "employees_5",
        ]
    );
    assert!(built.query.unresolved_references().is_empty());
    for dialect in Dialect::ALL {
        common::validate_sql(&built.query.to_sql(dialect).unwrap(), dialect).unwrap();
    }
}

#[test]
fn test_filter_join_never_reuses_display_alias() {
    let reg = common::registry();
    let built = SelectBuilder::new(&reg, "tasks")
        .unwrap()
        .include(Include::new("creator"))
        .filter(Filter::relation(
            "creator",
            RelationFilter::new().some(Filter::eq("name", "Ada")),
        ))
        .build()
        .unwrap();

    let names = built.query.exposed_names();
    common::assert_unique(&names);
    assert_eq!(names, vec!["tasks", "people", "creator"]);
    let sql = built.query.to_sql(Dialect::Postgres).unwrap();
    assert!(sql.contains("\"creator\".\"name\" = 'Ada'"), "{}", sql);
}
