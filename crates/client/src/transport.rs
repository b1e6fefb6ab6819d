//! Transport capability consumed by the client.
//!
//! A transport moves opaque envelope bytes between named queues. It provides
//! at-least-once delivery to a single exclusive consumer per queue and has no
//! knowledge of envelopes or handshakes.

use std::collections::BTreeMap;
use std::sync::Arc;

use amq_protocol::Node;
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// Receives payloads delivered on a subscribed queue.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Called once per delivered payload, in queue order.
    async fn deliver(&self, queue: &str, payload: Bytes);
}

/// Broker connection for one node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueues `payload` on `queue`.
    async fn publish(&self, queue: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Becomes the exclusive consumer of `queue`.
    ///
    /// Fails with [`TransportError::AlreadySubscribed`] if another consumer
    /// holds the queue.
    async fn subscribe_exclusive(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<(), TransportError>;

    /// Stops consuming `queue`. Undelivered payloads stay queued.
    async fn unsubscribe(&self, queue: &str) -> Result<(), TransportError>;

    /// Stops every consumer and rejects further use.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds transports from configuration parameters.
pub trait TransportProvider: Send + Sync {
    /// Opens a transport for `node`.
    fn create(
        &self,
        node: Node,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}
