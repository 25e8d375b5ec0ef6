//! Registers the resource providers on the message broker and tracks their
//! registration state across connection loss.

use crate::core::query::QueryDefaults;
use crate::core::resources::{Repositories, Resource, ResourceProvider};
use crate::domain::ports::{ConnectionState, MessageBroker};
use crate::utils::error::{AccountError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// What happens to the providers after the broker connection comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Providers stay unregistered until `register_all` is called again.
    #[default]
    Manual,
    /// Every provider is registered again once the connection is restored.
    OnReconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
}

/// Registration state of one resource and the connection session it was
/// registered under.
#[derive(Debug, Clone, Copy)]
struct Slot {
    state: RegistrationState,
    session: Option<u64>,
}

impl Slot {
    fn unregistered() -> Self {
        Self {
            state: RegistrationState::Unregistered,
            session: None,
        }
    }
}

struct RegistryInner {
    broker: Arc<dyn MessageBroker>,
    repositories: Repositories,
    defaults: QueryDefaults,
    states: RwLock<HashMap<Resource, Slot>>,
}

impl RegistryInner {
    async fn set_state(&self, resource: Resource, state: RegistrationState, session: Option<u64>) {
        self.states.write().await.insert(resource, Slot { state, session });
    }

    async fn register(&self, resource: Resource) -> Result<()> {
        self.set_state(resource, RegistrationState::Registering, None).await;
        // taken before binding: a session that ends mid-registration must
        // not count as the one this consumer belongs to
        let session = self.broker.connection_state().borrow().session();
        let handler = Arc::new(ResourceProvider::new(
            resource,
            self.repositories.clone(),
            self.defaults.clone(),
        ));

        match self.broker.provide(resource.name(), handler).await {
            Ok(()) => {
                self.set_state(resource, RegistrationState::Registered, session).await;
                tracing::info!(resource = %resource, "resource provider registered");
                Ok(())
            }
            Err(e) => {
                self.set_state(resource, RegistrationState::Unregistered, None).await;
                tracing::warn!(resource = %resource, error = %e, "resource provider registration failed");
                Err(e)
            }
        }
    }

    async fn register_all(&self) -> Result<()> {
        let mut failed = Vec::new();
        for resource in Resource::ALL {
            if self.register(resource).await.is_err() {
                failed.push(resource.name());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(AccountError::broker(format!(
                "{} resource(s) failed to register: {}",
                failed.len(),
                failed.join(", ")
            )))
        }
    }

    async fn mark_all_unregistered(&self) {
        let mut states = self.states.write().await;
        for slot in states.values_mut() {
            *slot = Slot::unregistered();
        }
    }

    /// Drops registrations made under any session other than `session`;
    /// their consumers went away with that connection.
    async fn forget_other_sessions(&self, session: u64) -> usize {
        let mut states = self.states.write().await;
        let mut forgotten = 0;
        for slot in states.values_mut() {
            if slot.state == RegistrationState::Registered && slot.session != Some(session) {
                *slot = Slot::unregistered();
                forgotten += 1;
            }
        }
        forgotten
    }
}

pub struct ProviderRegistry {
    inner: Arc<RegistryInner>,
    policy: RegistrationPolicy,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ProviderRegistry {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        repositories: Repositories,
        defaults: QueryDefaults,
        policy: RegistrationPolicy,
    ) -> Self {
        let states = Resource::ALL
            .into_iter()
            .map(|resource| (resource, Slot::unregistered()))
            .collect();

        Self {
            inner: Arc::new(RegistryInner {
                broker,
                repositories,
                defaults,
                states: RwLock::new(states),
            }),
            policy,
            watcher: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Registers a single provider. A failure leaves it unregistered; it is
    /// not retried.
    pub async fn register(&self, resource: Resource) -> Result<()> {
        self.inner.register(resource).await
    }

    /// Registers every provider and starts following the connection state.
    ///
    /// Each failure is logged and the remaining resources are still
    /// attempted; the returned error lists the ones that failed.
    pub async fn register_all(&self) -> Result<()> {
        self.watch_connection().await;
        tracing::info!(policy = ?self.policy, "registering resource providers");
        self.inner.register_all().await
    }

    pub async fn state(&self, resource: Resource) -> RegistrationState {
        self.inner
            .states
            .read()
            .await
            .get(&resource)
            .map(|slot| slot.state)
            .unwrap_or(RegistrationState::Unregistered)
    }

    pub async fn registered(&self) -> Vec<Resource> {
        let states = self.inner.states.read().await;
        Resource::ALL
            .into_iter()
            .filter(|r| states.get(r).map(|slot| slot.state) == Some(RegistrationState::Registered))
            .collect()
    }

    async fn watch_connection(&self) {
        let mut watcher = self.watcher.lock().await;
        if watcher.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let policy = self.policy;
        let mut connection = inner.broker.connection_state();
        let mut current = connection.borrow_and_update().session();

        *watcher = Some(tokio::spawn(async move {
            while connection.changed().await.is_ok() {
                let state = *connection.borrow_and_update();
                match state {
                    ConnectionState::Disconnected => {
                        tracing::warn!("broker connection lost; providers are no longer registered");
                        current = None;
                        inner.mark_all_unregistered().await;
                    }
                    ConnectionState::Connected { session } => {
                        if current == Some(session) {
                            continue;
                        }
                        if current.is_some() {
                            tracing::warn!(session, "broker connection was replaced without a reported loss");
                        }
                        current = Some(session);
                        let forgotten = inner.forget_other_sessions(session).await;
                        if forgotten > 0 {
                            tracing::warn!(forgotten, "providers from a previous connection are no longer registered");
                        }

                        match policy {
                            RegistrationPolicy::OnReconnect => {
                                tracing::info!(session, "broker connection restored; registering providers again");
                                if let Err(e) = inner.register_all().await {
                                    tracing::error!(error = %e, "re-registration after reconnect was incomplete");
                                }
                            }
                            RegistrationPolicy::Manual => {
                                tracing::info!(
                                    session,
                                    "broker connection restored; providers stay unregistered until registered explicitly"
                                );
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Stops following the connection state.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().await.take() {
            handle.abort();
        }
    }
}

impl Drop for ProviderRegistry {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.try_lock() {
            if let Some(handle) = watcher.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parses_from_config_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: RegistrationPolicy,
        }

        let manual: Wrapper = toml::from_str("policy = \"manual\"").unwrap();
        assert_eq!(manual.policy, RegistrationPolicy::Manual);

        let reconnect: Wrapper = toml::from_str("policy = \"on_reconnect\"").unwrap();
        assert_eq!(reconnect.policy, RegistrationPolicy::OnReconnect);

        assert_eq!(RegistrationPolicy::default(), RegistrationPolicy::Manual);
    }
}
