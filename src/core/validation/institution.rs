use super::{
    present, require_fields, validate_store_id, MessageTable, ValidationResult, INVALID_ID_MESSAGE,
};
use crate::domain::model::Institution;
use crate::utils::error::{ValidationCode, ValidationFailure};

pub const MESSAGES: MessageTable = MessageTable(&[(
    ValidationCode::IdInvalid,
    "Institution ID does not have a valid format!",
    "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
)]);

pub fn validate_create(institution: &Institution) -> ValidationResult {
    require_fields(
        "Institution",
        &[
            ("type", present(&institution.institution_type)),
            ("name", present(&institution.name)),
        ],
    )?;
    validate_coordinates(institution)
}

pub fn validate_update(institution: &Institution) -> ValidationResult {
    match institution.id.as_deref() {
        Some(id) => validate_id(id)?,
        None => {
            return Err(MESSAGES.remap(ValidationFailure::new(
                ValidationCode::IdInvalid,
                INVALID_ID_MESSAGE,
                "An id is required to update an institution.",
            )))
        }
    }
    validate_coordinates(institution)
}

pub fn validate_id(id: &str) -> ValidationResult {
    validate_store_id(id, ValidationCode::IdInvalid).map_err(|e| MESSAGES.remap(e))
}

fn validate_coordinates(institution: &Institution) -> ValidationResult {
    let checks = [
        ("latitude", institution.latitude, 90.0),
        ("longitude", institution.longitude, 180.0),
    ];
    for (name, value, bound) in checks {
        if let Some(value) = value {
            if !value.is_finite() || value.abs() > bound {
                return Err(ValidationFailure::new(
                    ValidationCode::ValueInvalid,
                    format!("The {} value is out of range: {}", name, value),
                    format!("{} must be between -{} and {}.", name, bound, bound),
                ));
            }
        }
    }
    Ok(())
}
