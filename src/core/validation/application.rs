use super::update::{self, UserUpdate};
use super::{present, require_fields, validate_store_id, MessageTable, ValidationResult};
use crate::domain::model::Application;
use crate::utils::error::ValidationCode;

pub const MESSAGES: MessageTable = MessageTable(&[
    (
        ValidationCode::IdInvalid,
        "Application ID does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::RefInvalid,
        "Institution ID of the application does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::PasswordNotAllowed,
        "The application password cannot be updated through this operation.",
        "A specific route to update application password already exists. Use PATCH /v1/users/{application_id}/password.",
    ),
]);

/// Applications may exist outside an institution.
pub fn validate_create(application: &Application) -> ValidationResult {
    require_fields(
        "Application",
        &[
            ("username", present(&application.username)),
            ("password", present(&application.password)),
            ("application_name", present(&application.application_name)),
        ],
    )?;
    if let Some(institution) = application.institution.as_deref() {
        validate_store_id(institution, ValidationCode::RefInvalid).map_err(|e| MESSAGES.remap(e))?;
    }
    Ok(())
}

pub fn validate_update(application: &Application) -> ValidationResult {
    update::validate(UserUpdate {
        id: application.id.as_deref(),
        institution: application.institution.as_deref(),
        password: application.password.as_deref(),
    })
    .map_err(|e| MESSAGES.remap(e))
}
