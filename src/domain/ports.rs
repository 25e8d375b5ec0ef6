use crate::core::query::Query;
use crate::domain::model::Entity;
use crate::domain::rpc::{RpcPayload, RpcReply};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Persistence interface consumed by the resource providers.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn find(&self, query: &Query) -> Result<Vec<E>>;
    async fn find_one(&self, query: &Query) -> Result<Option<E>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<E>>;
    async fn count(&self, query: &Query) -> Result<usize>;
    /// Stores a new entity; uniqueness violations surface as `AccountError::Conflict`.
    async fn create(&self, entity: E) -> Result<E>;
}

/// Every connection gets a fresh `session`, so an observer that missed a
/// drop still sees that the connection it knew is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected { session: u64 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    pub fn session(&self) -> Option<u64> {
        match self {
            ConnectionState::Connected { session } => Some(*session),
            ConnectionState::Disconnected => None,
        }
    }
}

/// Server side of one RPC resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn handle(&self, payload: RpcPayload) -> RpcReply;
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Starts serving `resource` with `handler`.
    async fn provide(&self, resource: &str, handler: Arc<dyn ResourceHandler>) -> Result<()>;

    /// Calls a remote resource and waits at most the configured RPC timeout.
    async fn request(&self, resource: &str, payload: RpcPayload) -> Result<Value>;

    async fn publish(&self, topic: &str, event: Value) -> Result<()>;
    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Value>>;

    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    fn is_connected(&self) -> bool {
        let state = *self.connection_state().borrow();
        state.is_connected()
    }

    async fn dispose(&self) -> Result<()>;
}
