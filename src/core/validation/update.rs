//! Checks shared by every updatable user-like entity.
//!
//! Raises generic codes only (`ID_INVALID`, `REF_INVALID`,
//! `PASSWORD_NOT_ALLOWED`); entity validators remap them.

use super::{validate_store_id, ValidationResult};
use crate::utils::error::{ValidationCode, ValidationFailure};

#[derive(Debug, Clone, Copy, Default)]
pub struct UserUpdate<'a> {
    pub id: Option<&'a str>,
    pub institution: Option<&'a str>,
    pub password: Option<&'a str>,
}

pub fn validate(update: UserUpdate<'_>) -> ValidationResult {
    match update.id {
        Some(id) => validate_store_id(id, ValidationCode::IdInvalid)?,
        None => {
            return Err(ValidationFailure::new(
                ValidationCode::IdInvalid,
                super::INVALID_ID_MESSAGE,
                "An id is required to update a user.",
            ))
        }
    }
    if let Some(institution) = update.institution {
        validate_store_id(institution, ValidationCode::RefInvalid)?;
    }
    if update.password.is_some() {
        return Err(ValidationFailure::new(
            ValidationCode::PasswordNotAllowed,
            "This parameter could not be updated.",
            "A specific route to update user password already exists. Use PATCH /v1/users/{user_id}/password.",
        ));
    }
    Ok(())
}
