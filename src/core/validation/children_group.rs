use super::{present, require_fields, validate_id_collection, validate_store_id, MessageTable, ValidationResult};
use crate::domain::model::ChildrenGroup;
use crate::utils::error::ValidationCode;

pub const MESSAGES: MessageTable = MessageTable(&[
    (
        ValidationCode::IdInvalid,
        "Children Group ID does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
    (
        ValidationCode::RefInvalid,
        "User ID of the children group owner does not have a valid format!",
        "A 24-byte hex ID similar to this: 507f191e810c19729de860ea is expected.",
    ),
]);

pub fn validate_create(group: &ChildrenGroup) -> ValidationResult {
    require_fields(
        "Children Group",
        &[
            ("name", present(&group.name)),
            ("Collection with children IDs", !group.children.is_empty()),
        ],
    )?;
    validate_id_collection("children", &group.children, ValidationCode::ChildIdsInvalid)?;
    if let Some(owner) = group.user.as_deref() {
        validate_store_id(owner, ValidationCode::RefInvalid).map_err(|e| MESSAGES.remap(e))?;
    }
    Ok(())
}

pub fn validate_update(group: &ChildrenGroup) -> ValidationResult {
    validate_store_id(group.id.as_deref().unwrap_or_default(), ValidationCode::IdInvalid)
        .map_err(|e| MESSAGES.remap(e))?;
    validate_id_collection("children", &group.children, ValidationCode::ChildIdsInvalid)
}
