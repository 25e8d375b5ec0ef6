use account_service::core::query::compile::to_document;
use account_service::core::query::{
    matcher, translate, PatternKind, Predicate, Projection, Query, QueryDefaults, QueryValue,
    SortDirection,
};
use account_service::core::validation::query::validate_references;
use account_service::utils::error::ValidationCode;
use serde_json::json;

fn defaults() -> QueryDefaults {
    QueryDefaults::default()
}

#[test]
fn test_built_query_survives_serialization() {
    let query = Query::builder()
        .filter("a", Predicate::Eq(QueryValue::Int(1)))
        .filter("b", Predicate::Gte(QueryValue::Int(2)))
        .build();

    let raw = query.to_query_string().unwrap();
    let translated = translate(&raw, &defaults()).unwrap();
    assert_eq!(translated, query);

    // translating the output again changes nothing
    let again = translate(&translated.to_query_string().unwrap(), &defaults()).unwrap();
    assert_eq!(again, translated);
}

#[test]
fn test_translation_of_a_full_request() {
    let query = translate(
        "gender=female&age=gte:7&age=lte:10&username=*child&sort=-username,age&page=2&limit=5&fields=username,age",
        &defaults(),
    )
    .unwrap();

    assert_eq!(query.predicates_for("gender"), &[Predicate::Eq(QueryValue::Text("female".into()))]);
    assert_eq!(
        query.predicates_for("age"),
        &[
            Predicate::Gte(QueryValue::Int(7)),
            Predicate::Lte(QueryValue::Int(10))
        ]
    );
    match &query.predicates_for("username")[0] {
        Predicate::Pattern(pattern) => {
            assert_eq!(pattern.kind, PatternKind::Suffix);
            assert_eq!(pattern.text, "child");
        }
        other => panic!("unexpected predicate {other:?}"),
    }

    let ordination = query.ordination();
    assert_eq!(ordination[0].field, "username");
    assert_eq!(ordination[0].direction, SortDirection::Desc);
    assert_eq!(ordination[1].direction, SortDirection::Asc);

    assert_eq!(query.pagination().page(), 2);
    assert_eq!(query.pagination().limit(), 5);
    assert_eq!(query.pagination().skip(), 5);
    assert_eq!(
        query.projection(),
        &Projection::Include(vec!["username".into(), "age".into()])
    );
}

#[test]
fn test_document_compilation_of_translated_query() {
    let query = translate("age=gte:7&age=lte:10&username=child*&sort=-username", &defaults()).unwrap();
    let document = to_document(&query);

    assert_eq!(document.filter["age"], json!({"$gte": 7, "$lte": 10}));
    assert_eq!(document.filter["username"]["$regex"], "^child");
    assert_eq!(document.sort, json!({"username": -1}));
    assert_eq!(document.skip, 0);
    assert_eq!(document.limit, 100);
}

#[test]
fn test_memory_plan_agrees_with_translation() {
    let rows = vec![
        json!({"username": "child01", "age": 7, "gender": "female"}),
        json!({"username": "child02", "age": 12, "gender": "female"}),
        json!({"username": "BR0003", "age": 8, "gender": "male"}),
    ];

    let query = translate("age=lt:10&sort=username", &defaults()).unwrap();
    let pairs = rows.iter().cloned().map(|row| (row.clone(), row)).collect();
    let selected = matcher::compile(&query).execute(pairs);
    let names: Vec<&str> = selected.iter().map(|r| r["username"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["BR0003", "child01"]);
    assert_eq!(matcher::compile(&query).count(rows.iter()), 2);
}

#[test]
fn test_reference_validation_after_translation() {
    let query = translate("institution=invalidId", &defaults()).unwrap();
    let err = validate_references(&query).unwrap_err();
    assert_eq!(err.code, ValidationCode::RefInvalid);
    assert_eq!(err.message, "Some ID provided does not have a valid format!");
}

#[test]
fn test_invalid_date_is_reported_with_field_and_value() {
    let err = translate("last_login=not-a-date", &defaults()).unwrap_err();
    assert_eq!(err.code, ValidationCode::DateInvalid);
    assert!(err.message.contains("last_login"));
    assert!(err.message.contains("not-a-date"));
}

#[test]
fn test_pagination_defaults_follow_collaborator() {
    let query = translate("", &defaults().with_limit(20)).unwrap();
    assert_eq!(query.pagination().page(), 1);
    assert_eq!(query.pagination().limit(), 20);
    assert!(query.filters().is_empty());
}
