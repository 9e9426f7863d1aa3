//! Query pipeline integration tests
//!
//! End-to-end coverage of the declarative read path through the database
//! facade: projection, filtering, ordering, grouping, and limits.
//!
//! Categories:
//! 1. Projection shape and aliases
//! 2. Predicate composition
//! 3. Ordering determinism
//! 4. Grouping and aggregates
//! 5. Evaluation errors

use serde_json::{json, Map, Value};
use tabula::db::Database;
use tabula::query::{
    FnKind, OrderSpec, Predicate, QueryError, QueryOptions, SelectExpr,
};
use tabula::schema::{FieldDef, ModelDef};
use tabula::DbError;

fn as_map(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn quiz_db() -> Database {
    let mut db = Database::new();
    db.define_model(
        ModelDef::new("Question")
            .field(FieldDef::string("title").not_null())
            .field(FieldDef::text("body"))
            .field(FieldDef::string("answer")),
    )
    .unwrap();
    for (title, body, answer) in [
        ("Capital of France", "Which city is the capital of France?", Some("Paris")),
        ("Capital of Italy", "Which city is the capital of Italy?", Some("Rome")),
        ("Largest continent", "Which continent is the largest?", Some("Asia")),
        ("Unanswered", "Nobody knows.", None),
    ] {
        let mut fields = as_map(json!({"title": title, "body": body}));
        if let Some(answer) = answer {
            fields.insert("answer".into(), json!(answer));
        }
        db.create("Question", fields).unwrap();
    }
    db
}

// =============================================================================
// 1. Projection shape
// =============================================================================

#[test]
fn test_default_projection_is_id_plus_declared_fields() {
    let db = quiz_db();
    let rows = db.find("Question", &QueryOptions::new()).unwrap();
    assert_eq!(rows.len(), 4);

    let names: Vec<&str> = rows[0].values.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["id", "title", "body", "answer"]);
    assert_eq!(rows[0].get("id"), Some(&json!(1)));
}

#[test]
fn test_aliases_and_scalar_functions() {
    let db = quiz_db();
    let options = QueryOptions::new()
        .select(vec![
            SelectExpr::aliased("body", "question"),
            SelectExpr::func(FnKind::Upper, "answer", "shout"),
        ])
        .filter(Predicate::eq("title", json!("Capital of France")));

    let rows = db.find("Question", &options).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("question"),
        Some(&json!("Which city is the capital of France?"))
    );
    assert_eq!(rows[0].get("shout"), Some(&json!("PARIS")));
    // Unprojected fields are not in the output.
    assert_eq!(rows[0].get("title"), None);
}

// =============================================================================
// 2. Predicate composition
// =============================================================================

#[test]
fn test_and_or_like() {
    let db = quiz_db();

    let either = QueryOptions::new().filter(Predicate::or(vec![
        Predicate::eq("answer", json!("Paris")),
        Predicate::eq("answer", json!("Rome")),
    ]));
    assert_eq!(db.find("Question", &either).unwrap().len(), 2);

    let narrowed = QueryOptions::new().filter(Predicate::and(vec![
        Predicate::like("title", "Capital%"),
        Predicate::ne("answer", json!("Rome")),
    ]));
    let rows = db.find("Question", &narrowed).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("answer"), Some(&json!("Paris")));
}

#[test]
fn test_like_is_case_insensitive_by_default() {
    let db = quiz_db();
    let options = QueryOptions::new().filter(Predicate::like("title", "%capital%"));
    assert_eq!(db.find("Question", &options).unwrap().len(), 2);
}

#[test]
fn test_null_matches_only_explicit_null() {
    let db = quiz_db();
    let unanswered = QueryOptions::new().filter(Predicate::eq("answer", Value::Null));
    let rows = db.find("Question", &unanswered).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("title"), Some(&json!("Unanswered")));
}

// =============================================================================
// 3. Ordering
// =============================================================================

#[test]
fn test_multi_key_order_is_stable() {
    let db = quiz_db();
    let options = QueryOptions::new()
        .filter(Predicate::ne("answer", Value::Null))
        .order_by(OrderSpec::asc("answer"));
    let rows = db.find("Question", &options).unwrap();
    let answers: Vec<&Value> = rows.iter().filter_map(|r| r.get("answer")).collect();
    assert_eq!(answers, vec![&json!("Asia"), &json!("Paris"), &json!("Rome")]);
}

#[test]
fn test_limit_truncates_after_order() {
    let db = quiz_db();
    let options = QueryOptions::new()
        .order_by(OrderSpec::desc("title"))
        .limit(1);
    let rows = db.find("Question", &options).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("title"), Some(&json!("Unanswered")));
}

// =============================================================================
// 4. Grouping and aggregates
// =============================================================================

#[test]
fn test_group_count_in_first_seen_order() {
    let mut db = quiz_db();
    // A second Paris answer to make a group of two.
    db.create(
        "Question",
        as_map(json!({"title": "Home of the Louvre", "answer": "Paris"})),
    )
    .unwrap();

    let options = QueryOptions::new()
        .select(vec![
            SelectExpr::col("answer"),
            SelectExpr::func(FnKind::Count, "answer", "total"),
        ])
        .group_by("answer");
    let rows = db.find("Question", &options).unwrap();

    assert_eq!(rows[0].get("answer"), Some(&json!("Paris")));
    assert_eq!(rows[0].get("total"), Some(&json!(2)));
    // Grouped rows carry no backing record.
    assert!(rows.iter().all(|row| row.pk.is_none()));
}

#[test]
fn test_ungrouped_aggregate_is_one_summary_row() {
    let db = quiz_db();
    let options = QueryOptions::new().select(vec![
        SelectExpr::func(FnKind::Count, "*", "rows"),
        SelectExpr::func(FnKind::Count, "answer", "answered"),
    ]);
    let rows = db.find("Question", &options).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("rows"), Some(&json!(4)));
    // Count over a column skips nulls.
    assert_eq!(rows[0].get("answered"), Some(&json!(3)));
}

#[test]
fn test_count_honors_filter() {
    let db = quiz_db();
    let options = QueryOptions::new().filter(Predicate::like("title", "Capital%"));
    assert_eq!(db.count("Question", &options).unwrap(), 2);
}

// =============================================================================
// 5. Evaluation errors
// =============================================================================

#[test]
fn test_unknown_field_is_an_error_not_a_miss() {
    let db = quiz_db();
    for options in [
        QueryOptions::new().filter(Predicate::eq("subject", json!("x"))),
        QueryOptions::new().select(vec![SelectExpr::col("subject")]),
        QueryOptions::new().order_by(OrderSpec::asc("subject")),
        QueryOptions::new().group_by("subject"),
    ] {
        let err = db.find("Question", &options).unwrap_err();
        assert_eq!(err.code(), "TAB_EVALUATION_ERROR");
        assert!(matches!(
            err,
            DbError::Query(QueryError::UnknownField { .. })
        ));
    }
}

#[test]
fn test_aggregate_order_key_is_rejected() {
    let db = quiz_db();
    let options = QueryOptions::new().order_by(OrderSpec::by_fn(
        FnKind::Count,
        "answer",
        tabula::query::SortDirection::Asc,
    ));
    let err = db.find("Question", &options).unwrap_err();
    assert!(matches!(
        err,
        DbError::Query(QueryError::AggregateInRowContext { .. })
    ));
}
