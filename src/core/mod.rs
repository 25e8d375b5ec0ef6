pub mod provider;
pub mod query;
pub mod resources;
pub mod validation;

pub use crate::domain::ports::{ConnectionState, MessageBroker, Repository, ResourceHandler};
pub use crate::utils::error::Result;
pub use provider::{ProviderRegistry, RegistrationPolicy, RegistrationState};
pub use resources::{Repositories, Resource, ResourceProvider};
