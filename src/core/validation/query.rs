//! Checks on translated queries before they reach a repository:
//! identifier-bearing filters must carry store ids, and credentials can be
//! neither matched, sorted on nor projected.

use super::{ValidationResult, INVALID_ID_DESCRIPTION, INVALID_ID_MESSAGE};
use crate::core::query::{PatternKind, Predicate, Projection, Query, QueryValue};
use crate::utils::error::{ValidationCode, ValidationFailure};
use crate::utils::validation::is_store_id;

const PROTECTED_FIELDS: [&str; 1] = ["password"];

const ID_FIELDS: [(&str, ValidationCode); 5] = [
    ("id", ValidationCode::IdInvalid),
    ("institution", ValidationCode::RefInvalid),
    ("user", ValidationCode::RefInvalid),
    ("children", ValidationCode::ChildIdsInvalid),
    ("children_groups", ValidationCode::RefInvalid),
];

fn code_for(field: &str) -> Option<ValidationCode> {
    ID_FIELDS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, code)| *code)
}

fn is_id_predicate(predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Eq(QueryValue::Text(value)) => is_store_id(value),
        Predicate::Pattern(pattern) if pattern.kind == PatternKind::Exact => is_store_id(&pattern.text),
        _ => false,
    }
}

pub fn validate_references(query: &Query) -> ValidationResult {
    for filter in query.filters() {
        let Some(code) = code_for(&filter.field) else {
            continue;
        };
        if !filter.predicates.iter().all(is_id_predicate) {
            return Err(ValidationFailure::new(
                code,
                INVALID_ID_MESSAGE,
                INVALID_ID_DESCRIPTION,
            ));
        }
    }
    Ok(())
}

fn is_protected(field: &str) -> bool {
    PROTECTED_FIELDS.iter().any(|protected| {
        field == *protected
            || field
                .strip_prefix(protected)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

fn protected_field_failure(field: &str) -> ValidationFailure {
    ValidationFailure::new(
        ValidationCode::FieldNotAllowed,
        format!("The field {} cannot be used in queries.", field),
        "Remove it from the filters, sort and fields parameters.",
    )
}

/// Rejects queries that filter, sort or project on a protected field.
pub fn validate_protected_fields(query: &Query) -> ValidationResult {
    let projected: &[String] = match query.projection() {
        Projection::All => &[],
        Projection::Include(fields) | Projection::Exclude(fields) => fields,
    };

    let offending = query
        .filters()
        .iter()
        .map(|filter| filter.field.as_str())
        .chain(query.ordination().iter().map(|key| key.field.as_str()))
        .chain(projected.iter().map(String::as_str))
        .find(|field| is_protected(field));

    match offending {
        Some(field) => Err(protected_field_failure(field)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::{translate, QueryDefaults};

    fn check(raw: &str) -> ValidationResult {
        validate_references(&translate(raw, &QueryDefaults::default()).unwrap())
    }

    #[test]
    fn test_valid_references() {
        assert!(check("institution=5a62be07de34500146d9c544&age=lt:9").is_ok());
        assert!(check("gender=female").is_ok());
    }

    #[test]
    fn test_invalid_references() {
        let err = check("institution=invalidId").unwrap_err();
        assert_eq!(err.code, ValidationCode::RefInvalid);
        assert_eq!(err.message, INVALID_ID_MESSAGE);

        assert_eq!(check("id=123").unwrap_err().code, ValidationCode::IdInvalid);
        assert_eq!(
            check("children=5a62be07de34500146d9c5*").unwrap_err().code,
            ValidationCode::ChildIdsInvalid
        );
    }

    #[test]
    fn test_case_insensitive_exact_ids_are_accepted() {
        let options = QueryDefaults {
            case_insensitive_patterns: true,
            ..QueryDefaults::default()
        };
        let query = translate("institution=5a62be07de34500146d9c544", &options).unwrap();
        assert!(validate_references(&query).is_ok());
    }

    #[test]
    fn test_password_cannot_be_queried() {
        let protected = |raw: &str| {
            validate_protected_fields(&translate(raw, &QueryDefaults::default()).unwrap())
        };

        for raw in [
            "password=child123",
            "password=c*",
            "password.hash=x",
            "sort=-password",
            "fields=username,password",
            "fields=-password",
        ] {
            let err = protected(raw).unwrap_err();
            assert_eq!(err.code, ValidationCode::FieldNotAllowed, "{raw}");
            assert!(err.message.contains("password"));
        }

        assert!(protected("username=child*&sort=username&fields=username").is_ok());
        assert!(protected("password_hint=x").is_ok());
    }
}
