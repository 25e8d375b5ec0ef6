pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::ServiceConfig;

pub use adapters::{BrokerHub, BrokerOptions, InMemoryBroker, InMemoryStore, SeedData};
pub use core::{ProviderRegistry, RegistrationPolicy, Repositories, Resource};
pub use utils::error::{AccountError, Result};
