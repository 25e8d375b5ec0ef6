//! Educators and health professionals share one rule set and differ only in
//! their wording.

use super::update::{self, UserUpdate};
use super::{present, require_fields, validate_store_id, MessageTable, ValidationResult};
use crate::domain::model::{Educator, HealthProfessional};
use crate::utils::error::ValidationCode;

pub const EDUCATOR_MESSAGES: MessageTable = MessageTable(&[
    (
        ValidationCode::IdInvalid,
        "Educator ID does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::RefInvalid,
        "Institution ID of the educator does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::PasswordNotAllowed,
        "The educator password cannot be updated through this operation.",
        "A specific route to update educator password already exists. Use PATCH /v1/users/{educator_id}/password.",
    ),
]);

pub const HEALTH_PROFESSIONAL_MESSAGES: MessageTable = MessageTable(&[
    (
        ValidationCode::IdInvalid,
        "Health Professional ID does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::RefInvalid,
        "Institution ID of the health professional does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::PasswordNotAllowed,
        "The health professional password cannot be updated through this operation.",
        "A specific route to update health professional password already exists. Use PATCH /v1/users/{healthprofessional_id}/password.",
    ),
]);

struct Professional<'a> {
    kind: &'static str,
    id: Option<&'a str>,
    username: &'a Option<String>,
    password: &'a Option<String>,
    institution: &'a Option<String>,
    messages: MessageTable,
}

impl<'a> From<&'a Educator> for Professional<'a> {
    fn from(educator: &'a Educator) -> Self {
        Self {
            kind: "Educator",
            id: educator.id.as_deref(),
            username: &educator.username,
            password: &educator.password,
            institution: &educator.institution,
            messages: EDUCATOR_MESSAGES,
        }
    }
}

impl<'a> From<&'a HealthProfessional> for Professional<'a> {
    fn from(professional: &'a HealthProfessional) -> Self {
        Self {
            kind: "Health Professional",
            id: professional.id.as_deref(),
            username: &professional.username,
            password: &professional.password,
            institution: &professional.institution,
            messages: HEALTH_PROFESSIONAL_MESSAGES,
        }
    }
}

fn validate_create(p: Professional<'_>) -> ValidationResult {
    require_fields(
        p.kind,
        &[
            ("username", present(p.username)),
            ("password", present(p.password)),
            ("institution", present(p.institution)),
        ],
    )?;
    if let Some(institution) = p.institution.as_deref() {
        validate_store_id(institution, ValidationCode::RefInvalid).map_err(|e| p.messages.remap(e))?;
    }
    Ok(())
}

fn validate_update(p: Professional<'_>) -> ValidationResult {
    update::validate(UserUpdate {
        id: p.id,
        institution: p.institution.as_deref(),
        password: p.password.as_deref(),
    })
    .map_err(|e| p.messages.remap(e))
}

pub fn validate_educator_create(educator: &Educator) -> ValidationResult {
    validate_create(educator.into())
}

pub fn validate_educator_update(educator: &Educator) -> ValidationResult {
    validate_update(educator.into())
}

pub fn validate_educator_id(id: &str) -> ValidationResult {
    validate_store_id(id, ValidationCode::IdInvalid).map_err(|e| EDUCATOR_MESSAGES.remap(e))
}

pub fn validate_health_professional_create(professional: &HealthProfessional) -> ValidationResult {
    validate_create(professional.into())
}

pub fn validate_health_professional_update(professional: &HealthProfessional) -> ValidationResult {
    validate_update(professional.into())
}

pub fn validate_health_professional_id(id: &str) -> ValidationResult {
    validate_store_id(id, ValidationCode::IdInvalid)
        .map_err(|e| HEALTH_PROFESSIONAL_MESSAGES.remap(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rules_different_wording() {
        let educator = Educator {
            id: Some("nope".into()),
            ..Default::default()
        };
        let professional = HealthProfessional {
            id: Some("nope".into()),
            ..Default::default()
        };
        let a = validate_educator_update(&educator).unwrap_err();
        let b = validate_health_professional_update(&professional).unwrap_err();
        assert_eq!(a.code, b.code);
        assert_eq!(a.message, "Educator ID does not have a valid format!");
        assert_eq!(b.message, "Health Professional ID does not have a valid format!");
    }

    #[test]
    fn test_create_lists_missing_fields() {
        let err = validate_health_professional_create(&HealthProfessional::default()).unwrap_err();
        assert_eq!(
            err.description,
            "Health Professional validation: username, password, institution required!"
        );
    }
}
