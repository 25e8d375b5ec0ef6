//! Entity validators.
//!
//! Every validator is a pure function returning `Result<(), ValidationFailure>`.
//! Failures carry a type-agnostic [`ValidationCode`]; each entity owns a
//! [`MessageTable`] that turns those codes into the wording its callers see.

pub mod application;
pub mod child;
pub mod children_group;
pub mod family;
pub mod institution;
pub mod professional;
pub mod query;
pub mod update;

use crate::utils::error::{ValidationCode, ValidationFailure};
use crate::utils::validation::{is_store_id, parse_datetime};

pub type ValidationResult = std::result::Result<(), ValidationFailure>;

pub const INVALID_ID_MESSAGE: &str = "Some ID provided does not have a valid format!";
pub const INVALID_ID_DESCRIPTION: &str =
    "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.";

/// Code → (message, description) overrides for one entity type.
#[derive(Debug, Clone, Copy)]
pub struct MessageTable(pub &'static [(ValidationCode, &'static str, &'static str)]);

impl MessageTable {
    pub const EMPTY: MessageTable = MessageTable(&[]);

    /// Rewords `failure` when the table knows its code; otherwise returns it unchanged.
    pub fn remap(&self, failure: ValidationFailure) -> ValidationFailure {
        match self.0.iter().find(|(code, _, _)| *code == failure.code) {
            Some((_, message, description)) => failure.reworded(*message, *description),
            None => failure,
        }
    }
}

/// Checks a single store id, reporting `code` on mismatch.
pub fn validate_store_id(value: &str, code: ValidationCode) -> ValidationResult {
    if is_store_id(value) {
        Ok(())
    } else {
        Err(ValidationFailure::new(
            code,
            INVALID_ID_MESSAGE,
            INVALID_ID_DESCRIPTION,
        ))
    }
}

/// Accumulates every missing field into one failure.
pub fn require_fields(entity: &str, checks: &[(&str, bool)]) -> ValidationResult {
    let missing: Vec<&str> = checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(ValidationFailure::new(
        ValidationCode::MissingFields,
        "Required fields were not provided...",
        format!("{} validation: {} required!", entity, missing.join(", ")),
    ))
}

/// Checks every id of a collection, reporting all malformed ones together.
pub fn validate_id_collection(attribute: &str, ids: &[String], code: ValidationCode) -> ValidationResult {
    let invalid: Vec<&str> = ids
        .iter()
        .filter(|id| !is_store_id(id))
        .map(String::as_str)
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    Err(ValidationFailure::new(
        code,
        format!(
            "The following IDs from {} attribute are not in valid format: {}",
            attribute,
            invalid.join(", ")
        ),
        INVALID_ID_DESCRIPTION,
    ))
}

pub fn validate_enum(attribute: &str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ValidationFailure::new(
        ValidationCode::EnumInvalid,
        format!("Value not mapped for {}: {}", attribute, value),
        format!("The mapped values are: {}.", allowed.join(", ")),
    ))
}

pub fn validate_date(attribute: &str, value: &str) -> ValidationResult {
    if parse_datetime(value).is_some() {
        return Ok(());
    }
    Err(ValidationFailure::new(
        ValidationCode::DateInvalid,
        format!(
            "Datetime: {}, for the parameter {}, is not in valid ISO 8601 format.",
            value, attribute
        ),
        "Date must be in the format: yyyy-MM-dd",
    ))
}

pub(crate) fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_fields_lists_all_missing() {
        let err = require_fields("Child", &[("username", false), ("password", true), ("age", false)])
            .unwrap_err();
        assert_eq!(err.code, ValidationCode::MissingFields);
        assert_eq!(err.description, "Child validation: username, age required!");
    }

    #[test]
    fn test_id_collection_reports_every_bad_id() {
        let ids = vec![
            "5a62be07de34500146d9c544".to_string(),
            "bad1".to_string(),
            "bad2".to_string(),
        ];
        let err = validate_id_collection("children", &ids, ValidationCode::ChildIdsInvalid).unwrap_err();
        assert_eq!(
            err.message,
            "The following IDs from children attribute are not in valid format: bad1, bad2"
        );
    }

    #[test]
    fn test_message_table_remaps_known_codes_only() {
        const TABLE: MessageTable = MessageTable(&[(ValidationCode::IdInvalid, "Child ID is invalid!", "desc")]);
        let remapped = TABLE.remap(validate_store_id("x", ValidationCode::IdInvalid).unwrap_err());
        assert_eq!(remapped.message, "Child ID is invalid!");
        assert_eq!(remapped.code, ValidationCode::IdInvalid);

        let untouched = TABLE.remap(validate_store_id("x", ValidationCode::RefInvalid).unwrap_err());
        assert_eq!(untouched.message, INVALID_ID_MESSAGE);
    }
}
