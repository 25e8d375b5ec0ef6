use super::update::{self, UserUpdate};
use super::{present, require_fields, validate_id_collection, validate_store_id, MessageTable, ValidationResult};
use crate::domain::model::Family;
use crate::utils::error::ValidationCode;

pub const MESSAGES: MessageTable = MessageTable(&[
    (
        ValidationCode::IdInvalid,
        "Family ID does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::RefInvalid,
        "Institution ID of the family does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::PasswordNotAllowed,
        "The family password cannot be updated through this operation.",
        "A specific route to update family password already exists. Use PATCH /v1/users/{family_id}/password.",
    ),
]);

pub fn validate_create(family: &Family) -> ValidationResult {
    require_fields(
        "Family",
        &[
            ("username", present(&family.username)),
            ("password", present(&family.password)),
            ("institution", present(&family.institution)),
            ("Collection with children IDs", !family.children.is_empty()),
        ],
    )?;
    if let Some(institution) = family.institution.as_deref() {
        validate_store_id(institution, ValidationCode::RefInvalid).map_err(|e| MESSAGES.remap(e))?;
    }
    validate_id_collection("children", &family.children, ValidationCode::ChildIdsInvalid)
}

pub fn validate_update(family: &Family) -> ValidationResult {
    update::validate(UserUpdate {
        id: family.id.as_deref(),
        institution: family.institution.as_deref(),
        password: family.password.as_deref(),
    })
    .map_err(|e| MESSAGES.remap(e))?;
    validate_id_collection("children", &family.children, ValidationCode::ChildIdsInvalid)
}

pub fn validate_id(id: &str) -> ValidationResult {
    validate_store_id(id, ValidationCode::IdInvalid).map_err(|e| MESSAGES.remap(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "5a62be07de34500146d9c544";

    #[test]
    fn test_create_requires_children() {
        let family = Family {
            username: Some("family_1".into()),
            password: Some("family123".into()),
            institution: Some(ID.into()),
            ..Default::default()
        };
        let err = validate_create(&family).unwrap_err();
        assert_eq!(err.code, ValidationCode::MissingFields);
        assert!(err.description.contains("Collection with children IDs"));
    }

    #[test]
    fn test_children_ids_reported_together() {
        let family = Family {
            id: Some(ID.into()),
            children: vec![ID.into(), "123".into(), "xyz".into()],
            ..Default::default()
        };
        let err = validate_update(&family).unwrap_err();
        assert_eq!(err.code, ValidationCode::ChildIdsInvalid);
        assert!(err.message.ends_with("123, xyz"));
    }

    #[test]
    fn test_id_uses_family_wording() {
        let err = validate_id("invalidId").unwrap_err();
        assert_eq!(err.message, "Family ID does not have a valid format!");
        assert!(validate_id(ID).is_ok());
    }
}
