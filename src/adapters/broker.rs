//! In-process message broker.
//!
//! [`BrokerHub`] plays the broker server: it owns the RPC queues and the
//! pub/sub topics and can be taken offline. [`InMemoryBroker`] is one client
//! connection to a hub. Requests and replies cross the hub as serialized
//! JSON, the same shape they would have on a real bus.

use crate::domain::ports::{ConnectionState, MessageBroker, ResourceHandler};
use crate::domain::rpc::{RpcPayload, RpcReply};
use crate::utils::error::{AccountError, Result, RPC_ERROR_MARKER};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

pub const BROKER_SCHEMES: [&str; 3] = ["memory", "amqp", "amqps"];

const QUEUE_CAPACITY: usize = 256;
const TOPIC_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerOptions {
    pub retry_interval: Duration,
    /// Connection attempts made before giving up.
    pub max_retries: u32,
    pub rpc_timeout: Duration,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(1000),
            max_retries: 3,
            rpc_timeout: Duration::from_millis(5000),
        }
    }
}

/// Wire envelope of one RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestMessage {
    correlation_id: Uuid,
    resource: String,
    payload: RpcPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReplyMessage {
    correlation_id: Uuid,
    reply: RpcReply,
}

struct Delivery {
    body: String,
    reply_to: oneshot::Sender<String>,
}

struct QueueBinding {
    owner: Uuid,
    sender: mpsc::Sender<Delivery>,
}

/// Availability of the hub. `epoch` moves on every outage, so a client that
/// only sees the hub back online can still tell it went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HubStatus {
    online: bool,
    epoch: u64,
}

struct HubInner {
    status: watch::Sender<HubStatus>,
    queues: RwLock<HashMap<String, QueueBinding>>,
    topics: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

/// Simulated broker server shared by every client in the process.
#[derive(Clone)]
pub struct BrokerHub {
    inner: Arc<HubInner>,
}

impl Default for BrokerHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerHub {
    pub fn new() -> Self {
        let (status, _) = watch::channel(HubStatus {
            online: true,
            epoch: 0,
        });
        Self {
            inner: Arc::new(HubInner {
                status,
                queues: RwLock::new(HashMap::new()),
                topics: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.status.borrow().online
    }

    /// Number of outages so far.
    pub fn epoch(&self) -> u64 {
        self.inner.status.borrow().epoch
    }

    /// Takes the hub down or brings it back. Going offline drops every
    /// queue binding, like a broker restart drops non-durable consumers.
    pub async fn set_online(&self, online: bool) {
        if !online {
            self.inner.queues.write().await.clear();
        }
        self.inner.status.send_modify(|status| {
            if status.online && !online {
                status.epoch += 1;
            }
            status.online = online;
        });
        tracing::info!(online, "broker hub state changed");
    }

    /// Resources that currently have a consumer.
    pub async fn bound_resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.queues.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn status_watch(&self) -> watch::Receiver<HubStatus> {
        self.inner.status.subscribe()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(AccountError::broker("connection refused: broker is offline"))
        }
    }

    async fn bind(&self, resource: &str, owner: Uuid, sender: mpsc::Sender<Delivery>) -> Result<()> {
        self.ensure_online()?;
        let previous = self
            .inner
            .queues
            .write()
            .await
            .insert(resource.to_string(), QueueBinding { owner, sender });
        if previous.is_some() {
            tracing::debug!(resource, "replaced existing consumer");
        }
        Ok(())
    }

    async fn unbind_owner(&self, owner: Uuid) {
        self.inner
            .queues
            .write()
            .await
            .retain(|_, binding| binding.owner != owner);
    }

    /// Routes a request to its consumer. Without a consumer the message is
    /// dropped and the caller only learns about it through its timeout.
    async fn route(&self, resource: &str, delivery: Delivery) -> Result<()> {
        self.ensure_online()?;
        let sender = self
            .inner
            .queues
            .read()
            .await
            .get(resource)
            .map(|binding| binding.sender.clone());

        match sender {
            Some(sender) => {
                if sender.send(delivery).await.is_err() {
                    tracing::debug!(resource, "consumer went away; request dropped");
                }
            }
            None => tracing::debug!(resource, "no consumer bound; request dropped"),
        }
        Ok(())
    }

    async fn topic(&self, name: &str) -> broadcast::Sender<Value> {
        self.inner
            .topics
            .lock()
            .await
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

/// Client connection to a [`BrokerHub`].
pub struct InMemoryBroker {
    id: Uuid,
    hub: BrokerHub,
    address: String,
    options: BrokerOptions,
    state: Arc<watch::Sender<ConnectionState>>,
    session: Arc<AtomicU64>,
    hub_epoch: Arc<AtomicU64>,
    disposed: Arc<AtomicBool>,
    consumers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl InMemoryBroker {
    /// Connects to `hub`, retrying up to `options.max_retries` times with
    /// `options.retry_interval` between attempts.
    pub async fn initialize(hub: BrokerHub, address: &str, options: BrokerOptions) -> Result<Self> {
        validate_url("broker.address", address, &BROKER_SCHEMES)?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let broker = Self {
            id: Uuid::new_v4(),
            hub,
            address: address.to_string(),
            options,
            state: Arc::new(state),
            session: Arc::new(AtomicU64::new(0)),
            hub_epoch: Arc::new(AtomicU64::new(0)),
            disposed: Arc::new(AtomicBool::new(false)),
            consumers: Arc::new(Mutex::new(Vec::new())),
            monitor: Mutex::new(None),
        };
        broker.connect().await?;
        Ok(broker)
    }

    pub fn hub(&self) -> &BrokerHub {
        &self.hub
    }

    pub fn options(&self) -> BrokerOptions {
        self.options
    }

    /// Opens the connection again after `dispose`. Providers are not
    /// registered again here; that is up to the caller.
    pub async fn reconnect(&self) -> Result<()> {
        self.connect().await
    }

    async fn connect(&self) -> Result<()> {
        let attempts = self.options.max_retries.max(1);
        let mut attempt = 1;
        let (watch, epoch) = loop {
            // subscribe before reading so no later outage goes unseen
            let mut watch = self.hub.status_watch();
            let status = *watch.borrow_and_update();
            if status.online {
                break (watch, status.epoch);
            }
            if attempt < attempts {
                tracing::warn!(
                    address = %self.address,
                    attempt,
                    attempts,
                    "broker connection refused; retrying"
                );
                tokio::time::sleep(self.options.retry_interval).await;
                attempt += 1;
            } else {
                tracing::error!(address = %self.address, attempts, "could not connect to broker");
                return Err(AccountError::broker(format!(
                    "could not connect to {} after {} attempt(s): broker is offline",
                    self.address, attempts
                )));
            }
        };

        self.hub_epoch.store(epoch, Ordering::SeqCst);
        self.disposed.store(false, Ordering::SeqCst);
        let session = self.session.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(ConnectionState::Connected { session });
        self.spawn_monitor(watch).await;
        tracing::info!(address = %self.address, client = %self.id, session, "connected to broker");
        Ok(())
    }

    /// Follows the hub's availability. An outage flips this client to
    /// `Disconnected`; coming back, or a missed outage detected through the
    /// hub epoch, opens a new session whose consumers start empty.
    async fn spawn_monitor(&self, mut watch: watch::Receiver<HubStatus>) {
        let mut monitor = self.monitor.lock().await;
        if let Some(handle) = monitor.take() {
            handle.abort();
        }

        let state = Arc::clone(&self.state);
        let session = Arc::clone(&self.session);
        let hub_epoch = Arc::clone(&self.hub_epoch);
        let disposed = Arc::clone(&self.disposed);
        let consumers = Arc::clone(&self.consumers);

        *monitor = Some(tokio::spawn(async move {
            while watch.changed().await.is_ok() {
                if disposed.load(Ordering::SeqCst) {
                    break;
                }
                let status = *watch.borrow_and_update();
                if !status.online {
                    for consumer in consumers.lock().await.drain(..) {
                        consumer.abort();
                    }
                    state.send_replace(ConnectionState::Disconnected);
                    continue;
                }
                if hub_epoch.swap(status.epoch, Ordering::SeqCst) != status.epoch {
                    for consumer in consumers.lock().await.drain(..) {
                        consumer.abort();
                    }
                    let next = session.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!(session = next, "broker connection restored");
                    state.send_replace(ConnectionState::Connected { session: next });
                }
            }
        }));
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.state.borrow().is_connected() {
            Ok(())
        } else {
            Err(AccountError::broker("not connected to the message broker"))
        }
    }
}

async fn serve(handler: Arc<dyn ResourceHandler>, delivery: Delivery) {
    let (correlation_id, reply) = match serde_json::from_str::<RequestMessage>(&delivery.body) {
        Ok(request) => (request.correlation_id, handler.handle(request.payload).await),
        Err(e) => {
            tracing::warn!(error = %e, "malformed rpc request");
            (
                Uuid::nil(),
                RpcReply::Error(format!("{}Malformed request payload.", RPC_ERROR_MARKER)),
            )
        }
    };

    match serde_json::to_string(&ReplyMessage { correlation_id, reply }) {
        Ok(body) => {
            // the caller may have given up already
            let _ = delivery.reply_to.send(body);
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize rpc reply"),
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn provide(&self, resource: &str, handler: Arc<dyn ResourceHandler>) -> Result<()> {
        self.ensure_connected()?;
        let (sender, mut receiver) = mpsc::channel::<Delivery>(QUEUE_CAPACITY);
        self.hub.bind(resource, self.id, sender).await?;

        let consumer = tokio::spawn(async move {
            while let Some(delivery) = receiver.recv().await {
                tokio::spawn(serve(Arc::clone(&handler), delivery));
            }
        });
        self.consumers.lock().await.push(consumer);
        tracing::debug!(resource, "consumer bound");
        Ok(())
    }

    async fn request(&self, resource: &str, payload: RpcPayload) -> Result<Value> {
        self.ensure_connected()?;
        let correlation_id = Uuid::new_v4();
        let body = serde_json::to_string(&RequestMessage {
            correlation_id,
            resource: resource.to_string(),
            payload,
        })?;

        let deadline = Instant::now() + self.options.rpc_timeout;
        let timed_out = || AccountError::RpcTimeout {
            resource: resource.to_string(),
            timeout_ms: u64::try_from(self.options.rpc_timeout.as_millis()).unwrap_or(u64::MAX),
        };

        let (reply_to, reply) = oneshot::channel();
        self.hub.route(resource, Delivery { body, reply_to }).await?;

        match tokio::time::timeout_at(deadline, reply).await {
            Ok(Ok(body)) => {
                let message: ReplyMessage = serde_json::from_str(&body)?;
                if message.correlation_id != correlation_id {
                    return Err(AccountError::broker(format!(
                        "reply correlation mismatch for {}",
                        resource
                    )));
                }
                message.reply.into_result(resource)
            }
            Ok(Err(_)) => {
                // nobody will answer; the caller still only sees a timeout
                tokio::time::sleep_until(deadline).await;
                Err(timed_out())
            }
            Err(_) => {
                tracing::warn!(resource, %correlation_id, "rpc request timed out");
                Err(timed_out())
            }
        }
    }

    async fn publish(&self, topic: &str, event: Value) -> Result<()> {
        self.ensure_connected()?;
        let receivers = self.hub.topic(topic).await.send(event).unwrap_or(0);
        tracing::debug!(topic, receivers, "event published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Value>> {
        self.ensure_connected()?;
        Ok(self.hub.topic(topic).await.subscribe())
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn dispose(&self) -> Result<()> {
        self.disposed.store(true, Ordering::SeqCst);
        if let Some(monitor) = self.monitor.lock().await.take() {
            monitor.abort();
        }
        for consumer in self.consumers.lock().await.drain(..) {
            consumer.abort();
        }
        self.hub.unbind_owner(self.id).await;
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::info!(client = %self.id, "broker connection disposed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ResourceHandler for Echo {
        async fn handle(&self, payload: RpcPayload) -> RpcReply {
            match payload {
                RpcPayload::Query(raw) => RpcReply::Success(json!([raw])),
                RpcPayload::Id(id) => RpcReply::Error(format!("{}unknown id {}", RPC_ERROR_MARKER, id)),
            }
        }
    }

    fn options() -> BrokerOptions {
        BrokerOptions {
            retry_interval: Duration::from_millis(10),
            max_retries: 2,
            rpc_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_request_reply() {
        let broker = InMemoryBroker::initialize(BrokerHub::new(), "memory://local", options())
            .await
            .unwrap();
        broker.provide("echo", Arc::new(Echo)).await.unwrap();

        let value = broker.request("echo", RpcPayload::query("a=1")).await.unwrap();
        assert_eq!(value, json!(["a=1"]));

        let err = broker.request("echo", RpcPayload::id("x")).await.unwrap_err();
        match err {
            AccountError::Rpc { message, .. } => assert_eq!(message, "Error: unknown id x"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_unknown_scheme() {
        let result = InMemoryBroker::initialize(BrokerHub::new(), "http://localhost", options()).await;
        assert!(matches!(result, Err(AccountError::InvalidConfigValueError { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_without_consumer_times_out() {
        let broker = InMemoryBroker::initialize(BrokerHub::new(), "memory://local", options())
            .await
            .unwrap();
        let err = broker.request("nobody", RpcPayload::query("")).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
