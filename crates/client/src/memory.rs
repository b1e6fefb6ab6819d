//! In-process transport.
//!
//! [`InMemoryBroker`] keeps one unbounded channel per queue. Payloads
//! published before anyone subscribes wait in the channel, and each queue
//! hands its receiving half to at most one consumer task at a time. When a
//! consumer stops, the receiver goes back to the broker together with any
//! payloads it had not yet taken.

use std::collections::BTreeMap;
use std::sync::Arc;

use amq_protocol::Node;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::{DeliveryHandler, Transport, TransportProvider};

/// Registry name of the in-memory provider.
pub const MEMORY_PROVIDER: &str = "memory";

struct QueueSlot {
    sender: mpsc::UnboundedSender<Bytes>,
    receiver: Option<mpsc::UnboundedReceiver<Bytes>>,
}

impl QueueSlot {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

/// Shared queue store. Clones refer to the same queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<DashMap<String, QueueSlot>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transport for `node` backed by this broker.
    pub fn transport(&self, node: Node) -> InMemoryTransport {
        InMemoryTransport {
            node,
            broker: self.clone(),
            consumers: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Payloads waiting on `queue` while no consumer holds it.
    pub fn pending(&self, queue: &str) -> usize {
        self.queues
            .get(queue)
            .and_then(|slot| slot.receiver.as_ref().map(|rx| rx.len()))
            .unwrap_or(0)
    }

    fn publish(&self, queue: &str, payload: Bytes) -> Result<(), TransportError> {
        let slot = self
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);
        slot.sender
            .send(payload)
            .map_err(|_| TransportError::Provider(format!("queue {:?} lost its receiver", queue)))
    }

    fn take_receiver(&self, queue: &str) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        let mut slot = self
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);
        slot.receiver.take()
    }

    fn restore_receiver(&self, queue: &str, receiver: mpsc::UnboundedReceiver<Bytes>) {
        if let Some(mut slot) = self.queues.get_mut(queue) {
            slot.receiver = Some(receiver);
        }
    }
}

struct Consumer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Transport handle for one node on an [`InMemoryBroker`].
pub struct InMemoryTransport {
    node: Node,
    broker: InMemoryBroker,
    consumers: DashMap<String, Consumer>,
    shutdown: CancellationToken,
}

impl InMemoryTransport {
    /// Queues this transport currently consumes.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut queues: Vec<String> = self.consumers.iter().map(|e| e.key().clone()).collect();
        queues.sort();
        queues
    }

    async fn stop_consumer(&self, queue: &str) {
        if let Some((_, consumer)) = self.consumers.remove(queue) {
            consumer.token.cancel();
            if let Err(e) = consumer.task.await {
                warn!(node = %self.node, queue, "Consumer task ended abnormally: {}", e);
            }
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, queue: &str, payload: Bytes) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.broker.publish(queue, payload)
    }

    async fn subscribe_exclusive(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let receiver = self
            .broker
            .take_receiver(queue)
            .ok_or_else(|| TransportError::AlreadySubscribed(queue.to_string()))?;

        let token = self.shutdown.child_token();
        let task = tokio::spawn(consume(
            self.broker.clone(),
            queue.to_string(),
            receiver,
            handler,
            token.clone(),
        ));
        self.consumers.insert(queue.to_string(), Consumer { token, task });

        debug!(node = %self.node, queue, "Subscribed to queue");
        Ok(())
    }

    async fn unsubscribe(&self, queue: &str) -> Result<(), TransportError> {
        self.stop_consumer(queue).await;
        debug!(node = %self.node, queue, "Unsubscribed from queue");
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.shutdown.cancel();
        let queues: Vec<String> = self.consumers.iter().map(|e| e.key().clone()).collect();
        for queue in queues {
            self.stop_consumer(&queue).await;
        }
        debug!(node = %self.node, "In-memory transport closed");
        Ok(())
    }
}

async fn consume(
    broker: InMemoryBroker,
    queue: String,
    mut receiver: mpsc::UnboundedReceiver<Bytes>,
    handler: Arc<dyn DeliveryHandler>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            payload = receiver.recv() => match payload {
                Some(payload) => handler.deliver(&queue, payload).await,
                None => break,
            },
        }
    }
    broker.restore_receiver(&queue, receiver);
}

/// Provider that opens transports on a shared [`InMemoryBroker`].
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    broker: InMemoryBroker,
}

impl InMemoryProvider {
    /// Creates a provider over `broker`.
    pub fn new(broker: InMemoryBroker) -> Self {
        Self { broker }
    }

    /// The backing broker.
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }
}

impl TransportProvider for InMemoryProvider {
    fn create(
        &self,
        node: Node,
        _parameters: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(self.broker.transport(node)))
    }
}
