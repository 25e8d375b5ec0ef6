use crate::utils::error::{AccountError, RPC_ERROR_MARKER};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body of an RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RpcPayload {
    /// Raw query string for list resources.
    Query(String),
    /// Single parent/entity id for relationship resources.
    Id(String),
}

impl RpcPayload {
    pub fn query(raw: impl Into<String>) -> Self {
        RpcPayload::Query(raw.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        RpcPayload::Id(id.into())
    }
}

/// Reply body. Errors carry the `"Error: "` marker so callers can tell them
/// apart from application payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum RpcReply {
    Success(Value),
    Error(String),
}

impl RpcReply {
    pub fn from_result(result: crate::utils::error::Result<Value>) -> Self {
        match result {
            Ok(value) => RpcReply::Success(value),
            Err(err) => RpcReply::Error(err.rpc_message()),
        }
    }

    /// Converts the reply into the caller-side result.
    pub fn into_result(self, resource: &str) -> crate::utils::error::Result<Value> {
        match self {
            RpcReply::Success(value) => Ok(value),
            RpcReply::Error(message) => Err(AccountError::Rpc {
                resource: resource.to_string(),
                message,
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            RpcReply::Success(_) => false,
            RpcReply::Error(message) => message.starts_with(RPC_ERROR_MARKER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{ValidationCode, ValidationFailure};

    #[test]
    fn test_reply_wire_format() {
        let reply = RpcReply::Success(serde_json::json!([]));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({"status": "success", "body": []})
        );

        let payload = RpcPayload::id("5a62be07de34500146d9c544");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"kind": "id", "value": "5a62be07de34500146d9c544"})
        );
    }

    #[test]
    fn test_error_reply_carries_marker() {
        let failure = ValidationFailure::new(ValidationCode::IdInvalid, "bad id", "details");
        let reply = RpcReply::from_result(Err(failure.into()));
        assert!(reply.is_error());
        assert_eq!(reply, RpcReply::Error("Error: bad id".to_string()));
    }
}
