use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Machine-readable reason attached to every [`ValidationFailure`].
///
/// Codes are type-agnostic; entity validators translate them into
/// entity-specific wording through their message tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    IdInvalid,
    RefInvalid,
    ChildIdsInvalid,
    DateInvalid,
    EnumInvalid,
    MissingFields,
    PasswordNotAllowed,
    MutualRequirement,
    PaginationInvalid,
    OperatorInvalid,
    PeriodInvalid,
    ProjectionInvalid,
    ValueInvalid,
    FieldNotAllowed,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::IdInvalid => "ID_INVALID",
            ValidationCode::RefInvalid => "REF_INVALID",
            ValidationCode::ChildIdsInvalid => "CHILD_IDS_INVALID",
            ValidationCode::DateInvalid => "DATE_INVALID",
            ValidationCode::EnumInvalid => "ENUM_INVALID",
            ValidationCode::MissingFields => "MISSING_FIELDS",
            ValidationCode::PasswordNotAllowed => "PASSWORD_NOT_ALLOWED",
            ValidationCode::MutualRequirement => "MUTUAL_REQUIREMENT",
            ValidationCode::PaginationInvalid => "PAGINATION_INVALID",
            ValidationCode::OperatorInvalid => "OPERATOR_INVALID",
            ValidationCode::PeriodInvalid => "PERIOD_INVALID",
            ValidationCode::ProjectionInvalid => "PROJECTION_INVALID",
            ValidationCode::ValueInvalid => "VALUE_INVALID",
            ValidationCode::FieldNotAllowed => "FIELD_NOT_ALLOWED",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed input detected before anything reaches a repository.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationFailure {
    pub code: ValidationCode,
    pub message: String,
    pub description: String,
}

impl ValidationFailure {
    pub fn new(
        code: ValidationCode,
        message: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            description: description.into(),
        }
    }

    /// Rewrites message and description while keeping the code.
    pub fn reworded(mut self, message: impl Into<String>, description: impl Into<String>) -> Self {
        self.message = message.into();
        self.description = description.into();
        self
    }
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Conflict: {message}")]
    Conflict { message: String, description: String },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },

    #[error("Broker error: {message}")]
    Broker { message: String },

    #[error("RPC request to '{resource}' timed out after {timeout_ms}ms")]
    RpcTimeout { resource: String, timeout_ms: u64 },

    #[error("RPC request to '{resource}' failed: {message}")]
    Rpc { resource: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub const RPC_ERROR_MARKER: &str = "Error: ";

impl AccountError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        AccountError::Unexpected {
            message: message.into(),
        }
    }

    pub fn broker(message: impl Into<String>) -> Self {
        AccountError::Broker {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AccountError::RpcTimeout { .. })
    }

    /// Message carried inside an RPC error reply.
    ///
    /// Repository internals never cross the wire: anything that is not a
    /// validation or conflict failure is reported with a generic message.
    pub fn rpc_message(&self) -> String {
        let message = match self {
            AccountError::Validation(failure) => failure.message.clone(),
            AccountError::Conflict { message, .. } => message.clone(),
            _ => "An internal error has occurred in the database!".to_string(),
        };
        format!("{}{}", RPC_ERROR_MARKER, message)
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AccountError::Validation(failure) => {
                format!("{} {}", failure.message, failure.description)
            }
            AccountError::RpcTimeout { resource, .. } => format!(
                "The service providing '{}' did not answer in time.",
                resource
            ),
            AccountError::ConfigError { .. }
            | AccountError::InvalidConfigValueError { .. } => {
                format!("Please check your configuration file. {}", self)
            }
            AccountError::Broker { .. } => {
                format!("Message broker is unavailable. {}", self)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_message_wraps_validation_failure() {
        let err = AccountError::from(ValidationFailure::new(
            ValidationCode::IdInvalid,
            "Some ID provided does not have a valid format!",
            "details",
        ));
        assert_eq!(
            err.rpc_message(),
            "Error: Some ID provided does not have a valid format!"
        );
    }

    #[test]
    fn test_rpc_message_hides_internal_errors() {
        let err = AccountError::unexpected("connection reset by peer at 10.0.0.3");
        assert!(!err.rpc_message().contains("10.0.0.3"));
        assert!(err.rpc_message().starts_with(RPC_ERROR_MARKER));
    }

    #[test]
    fn test_validation_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ValidationCode::ChildIdsInvalid).unwrap();
        assert_eq!(json, "\"CHILD_IDS_INVALID\"");
    }
}
