// Adapters layer: concrete implementations of the domain ports.

pub mod broker;
pub mod repository;

pub use broker::{BrokerHub, BrokerOptions, InMemoryBroker};
pub use repository::{InMemoryRepository, InMemoryStore, SeedData};
