//! Validation invariant tests
//!
//! Exercises the full rule set through the database facade: built-in
//! field rules, custom per-field rules, and model-level rules, with the
//! all-or-nothing rejection property.

use serde_json::{json, Map, Value};
use tabula::db::Database;
use tabula::query::QueryOptions;
use tabula::schema::{FieldDef, ModelDef};
use tabula::validate::{FieldRule, ModelRule};
use tabula::DbError;

fn as_map(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn user_db() -> Database {
    let mut db = Database::new();
    db.define_model(
        ModelDef::new("User")
            .field(
                FieldDef::string("first_name")
                    .not_null()
                    .rule(FieldRule::NotEmpty)
                    .rule(FieldRule::len(2, 50)),
            )
            .field(
                FieldDef::string("last_name")
                    .not_null()
                    .rule(FieldRule::NotEmpty)
                    .rule(FieldRule::custom("is_palindrome", |value| {
                        let s = value.as_str().unwrap_or("");
                        let reversed: String = s.chars().rev().collect();
                        if s == reversed {
                            Ok(())
                        } else {
                            Err("Only palindromes are allowed!".to_string())
                        }
                    })),
            )
            .field(FieldDef::string("email").not_null().unique().rule(FieldRule::IsEmail))
            .field(
                FieldDef::integer("age")
                    .not_null()
                    .rule(FieldRule::Min(18))
                    .rule(FieldRule::Max(100)),
            )
            .field(FieldDef::string("password").not_null())
            .field(FieldDef::string("confirm_password").not_null())
            .model_rule(ModelRule::new("passwords_match", |fields| {
                if fields.get("password") == fields.get("confirm_password") {
                    Ok(())
                } else {
                    Err("Passwords do not match.".to_string())
                }
            })),
    )
    .unwrap();
    db
}

fn valid_user() -> Map<String, Value> {
    as_map(json!({
        "first_name": "John",
        "last_name": "anna",
        "email": "john.doe@example.com",
        "age": 20,
        "password": "password123!",
        "confirm_password": "password123!"
    }))
}

fn violations(err: DbError) -> Vec<String> {
    match err {
        DbError::Validation(e) => e.violations.iter().map(|v| v.rule.clone()).collect(),
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn test_valid_candidate_is_accepted() {
    let mut db = user_db();
    let record = db.create("User", valid_user()).unwrap();
    assert_eq!(record.get("first_name"), Some(&json!("John")));
}

#[test]
fn test_every_violation_is_collected() {
    let mut db = user_db();
    let mut fields = valid_user();
    fields.insert("first_name".into(), json!("J"));
    fields.insert("email".into(), json!("not-an-email"));
    fields.insert("age".into(), json!(10));

    let rules = violations(db.create("User", fields).unwrap_err());
    assert!(rules.contains(&"len".to_string()));
    assert!(rules.contains(&"is_email".to_string()));
    assert!(rules.contains(&"min".to_string()));
    // Nothing was persisted.
    assert_eq!(db.count("User", &QueryOptions::new()).unwrap(), 0);
}

#[test]
fn test_custom_field_rule() {
    let mut db = user_db();
    let mut fields = valid_user();
    fields.insert("last_name".into(), json!("Doe"));

    let rules = violations(db.create("User", fields).unwrap_err());
    assert_eq!(rules, vec!["is_palindrome"]);
}

#[test]
fn test_model_rule_sees_the_whole_candidate() {
    let mut db = user_db();
    let mut fields = valid_user();
    fields.insert("confirm_password".into(), json!("different"));

    let rules = violations(db.create("User", fields).unwrap_err());
    assert_eq!(rules, vec!["passwords_match"]);
}

#[test]
fn test_type_mismatch_is_not_coerced() {
    let mut db = user_db();
    let mut fields = valid_user();
    // A numeric string is not an integer.
    fields.insert("age".into(), json!("20"));

    let rules = violations(db.create("User", fields).unwrap_err());
    assert_eq!(rules, vec!["type"]);
}

#[test]
fn test_undeclared_field_rejected() {
    let mut db = user_db();
    let mut fields = valid_user();
    fields.insert("nickname".into(), json!("JD"));

    let rules = violations(db.create("User", fields).unwrap_err());
    assert_eq!(rules, vec!["unknown_field"]);
}

#[test]
fn test_update_is_validated_against_merged_state() {
    let mut db = user_db();
    let record = db.create("User", valid_user()).unwrap();

    // Changing only the password breaks the model rule on the merged
    // record even though the change set itself looks harmless.
    let err = db
        .update("User", record.pk, as_map(json!({"password": "changed"})))
        .unwrap_err();
    assert_eq!(violations(err), vec!["passwords_match"]);

    db.update(
        "User",
        record.pk,
        as_map(json!({"password": "changed", "confirm_password": "changed"})),
    )
    .unwrap();
}

#[test]
fn test_uniqueness_is_enforced_by_the_store_not_the_validator() {
    let mut db = user_db();
    db.create("User", valid_user()).unwrap();

    let mut second = valid_user();
    second.insert("first_name".into(), json!("Jane"));
    let err = db.create("User", second).unwrap_err();
    assert_eq!(err.code(), "TAB_UNIQUENESS_VIOLATION");
}
