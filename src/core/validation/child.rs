use super::update::{self, UserUpdate};
use super::{present, require_fields, validate_date, validate_enum, validate_store_id, MessageTable, ValidationResult};
use crate::domain::model::{Age, Child};
use crate::utils::error::{ValidationCode, ValidationFailure};

pub const GENDERS: [&str; 2] = ["male", "female"];

pub const MESSAGES: MessageTable = MessageTable(&[
    (
        ValidationCode::IdInvalid,
        "Child ID does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::RefInvalid,
        "Institution ID of the child does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::PasswordNotAllowed,
        "The child password cannot be updated through this operation.",
        "A specific route to update child password already exists. Use PATCH /v1/users/{child_id}/password.",
    ),
]);

pub fn validate_create(child: &mut Child) -> ValidationResult {
    require_fields(
        "Child",
        &[
            ("username", present(&child.username)),
            ("password", present(&child.password)),
            ("gender", present(&child.gender)),
            ("age", child.age.is_some()),
            ("institution", present(&child.institution)),
        ],
    )?;
    if let Some(institution) = child.institution.as_deref() {
        validate_store_id(institution, ValidationCode::RefInvalid).map_err(|e| MESSAGES.remap(e))?;
    }
    validate_attributes(child)
}

pub fn validate_update(child: &mut Child) -> ValidationResult {
    update::validate(UserUpdate {
        id: child.id.as_deref(),
        institution: child.institution.as_deref(),
        password: child.password.as_deref(),
    })
    .map_err(|e| MESSAGES.remap(e))?;
    validate_attributes(child)
}

pub fn validate_id(id: &str) -> ValidationResult {
    validate_store_id(id, ValidationCode::IdInvalid).map_err(|e| MESSAGES.remap(e))
}

fn validate_attributes(child: &mut Child) -> ValidationResult {
    if let Some(gender) = child.gender.as_deref() {
        validate_enum("gender", gender, &GENDERS)?;
    }
    // the requirement depends on how the age arrived, so check before normalizing
    match (&child.age, child.age_calc_date.as_deref()) {
        (Some(Age::Years(_)), None) => {
            return Err(ValidationFailure::new(
                ValidationCode::MutualRequirement,
                "Required fields were not provided...",
                "Child validation: age_calc_date is required when age is provided as a number!",
            ))
        }
        (None, Some(_)) => {
            return Err(ValidationFailure::new(
                ValidationCode::MutualRequirement,
                "Required fields were not provided...",
                "Child validation: age is required when age_calc_date is provided!",
            ))
        }
        (_, Some(date)) => validate_date("age_calc_date", date)?,
        (_, None) => {}
    }
    normalize_age(child)
}

/// Coerces a textual age into years.
fn normalize_age(child: &mut Child) -> ValidationResult {
    if let Some(Age::Text(text)) = &child.age {
        let years = text.trim().parse::<u32>().map_err(|_| {
            ValidationFailure::new(
                ValidationCode::ValueInvalid,
                format!("Age: {} is not a valid number of years.", text),
                "Age must be a non-negative integer.",
            )
        })?;
        child.age = Some(Age::Years(years));
    }
    Ok(())
}
