//! Per-node AMQ client.
//!
//! A [`Client`] owns one transport connection to one node. It listens on this
//! system's own queue (or queue partitions), feeds inbound envelopes through
//! the handshake engine to the registered [`Processor`]s, and publishes any
//! reply envelope to the queue its phase routes to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use amq_protocol::{
    resolve_send_queue, validate_system_id, Envelope, HandshakeEngine, Message, Node,
    ProtocolError, QueueName, Signer,
};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::error::{ClientError, Result};
use crate::processor::{Processor, ProcessorListener};
use crate::registry::ProviderRegistry;
use crate::transport::{DeliveryHandler, Transport};

/// Client bound to one node. Clones share the same connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    system_id: String,
    node: Node,
    config: NodeConfig,
    engine: HandshakeEngine,
    transport: Arc<dyn Transport>,
    processors: RwLock<HashMap<String, Arc<dyn Processor>>>,
    started: AtomicBool,
    subscriptions: Mutex<Vec<String>>,
}

impl Client {
    /// Opens a client for `node` with the provider named in `config`.
    pub fn new(
        system_id: &str,
        node: Node,
        config: NodeConfig,
        signer: Signer,
        registry: &ProviderRegistry,
    ) -> Result<Self> {
        validate_system_id(system_id)?;
        if config.partitions == 0 {
            return Err(ClientError::InvalidPartition {
                index: 0,
                partitions: 0,
            });
        }

        let provider = registry
            .get(&config.provider)?
            .ok_or_else(|| ClientError::UnknownProvider(config.provider.clone()))?;
        let transport = provider.create(node, &config.parameters)?;

        info!(
            node = %node,
            system_id,
            provider = %config.provider,
            partitions = config.partitions,
            "AMQ client initialized"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                system_id: system_id.to_string(),
                node,
                config,
                engine: HandshakeEngine::new(signer),
                transport,
                processors: RwLock::new(HashMap::new()),
                started: AtomicBool::new(false),
                subscriptions: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Node this client is connected to.
    pub fn node(&self) -> Node {
        self.inner.node
    }

    /// This system's id.
    pub fn system_id(&self) -> &str {
        &self.inner.system_id
    }

    /// Registers `processor` for its message type.
    ///
    /// Must be called before [`start`](Self::start). A later processor for
    /// the same type replaces the earlier one.
    pub fn add_processor(&self, processor: Arc<dyn Processor>) -> Result<()> {
        if self.inner.started.load(Ordering::Acquire) {
            warn!(node = %self.inner.node, "Client already started; processor rejected");
            return Err(ClientError::AlreadyStarted(self.inner.node));
        }

        let genre = processor.genre().to_string();
        let mut processors = self
            .inner
            .processors
            .write()
            .map_err(|_| ClientError::LockPoisoned {
                context: "processor table write".to_string(),
            })?;
        if processors.insert(genre.clone(), processor).is_some() {
            warn!(node = %self.inner.node, genre = %genre, "Replaced existing processor");
        }
        Ok(())
    }

    /// Queue name of `system_id` on this node.
    ///
    /// On a partitioned node use
    /// [`partitioned_queue_name`](Self::partitioned_queue_name) instead.
    pub fn queue_name(&self, system_id: &str) -> Result<String> {
        if self.is_multiple_partition() {
            info!(
                node = %self.inner.node,
                "Node is partitioned; build partitioned queue names instead"
            );
        }
        Ok(QueueName::new(system_id, self.inner.node)?.to_string())
    }

    /// Name of partition `index` of `system_id`'s queue on this node.
    pub fn partitioned_queue_name(&self, system_id: &str, index: u32) -> Result<String> {
        let partitions = self.inner.config.partitions;
        if !self.is_multiple_partition() || index >= partitions {
            return Err(ClientError::InvalidPartition { index, partitions });
        }
        Ok(QueueName::partitioned(system_id, self.inner.node, index)?.to_string())
    }

    /// Whether the node is configured with more than one partition.
    pub fn is_multiple_partition(&self) -> bool {
        self.inner.config.is_partitioned()
    }

    /// Starts consuming this system's queues and returns their names.
    ///
    /// Unpartitioned nodes consume the single queue. Partitioned nodes
    /// consume the configured `listen_partitions`, or every partition when
    /// none are listed. A client starts at most once; if any subscription
    /// fails, the ones already made are undone and the client can be started
    /// again.
    pub async fn start(&self) -> Result<Vec<String>> {
        let queues = self.own_queues()?;

        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::AlreadyStarted(self.inner.node));
        }

        if let Err(e) = self.subscribe_all(&queues).await {
            warn!(node = %self.inner.node, "Failed to start client: {}", e);
            self.unsubscribe_all().await?;
            self.inner.started.store(false, Ordering::Release);
            return Err(e);
        }

        Ok(queues)
    }

    async fn subscribe_all(&self, queues: &[String]) -> Result<()> {
        let handler: Arc<dyn DeliveryHandler> = self.inner.clone();
        for queue in queues {
            self.inner
                .transport
                .subscribe_exclusive(queue, Arc::clone(&handler))
                .await?;
            self.inner
                .subscriptions
                .lock()
                .map_err(|_| ClientError::LockPoisoned {
                    context: "subscription list".to_string(),
                })?
                .push(queue.clone());
            info!(node = %self.inner.node, queue = %queue, "Listening on AMQ queue");
        }
        Ok(())
    }

    async fn unsubscribe_all(&self) -> Result<()> {
        let queues: Vec<String> = self
            .inner
            .subscriptions
            .lock()
            .map_err(|_| ClientError::LockPoisoned {
                context: "subscription list".to_string(),
            })?
            .drain(..)
            .collect();
        for queue in &queues {
            self.inner.transport.unsubscribe(queue).await?;
        }
        Ok(())
    }

    /// Validates, wraps, signs and publishes a new message.
    ///
    /// Every queue name the message references must satisfy this node's
    /// partition layout. Returns the published envelope.
    pub async fn send(&self, message: Message) -> Result<Envelope> {
        let partitions = self.inner.config.partitions;
        for name in message.queue_names() {
            QueueName::validate(name, partitions)?;
        }

        let envelope = Envelope::from_message(&message, self.inner.engine.signer());
        let queue = resolve_send_queue(&envelope);
        self.inner
            .transport
            .publish(queue, Bytes::from(envelope.to_bytes()?))
            .await?;

        debug!(
            node = %self.inner.node,
            queue,
            msg_id = %envelope.msg_id(),
            category = %envelope.category(),
            genre = envelope.genre(),
            "Message sent"
        );
        Ok(envelope)
    }

    /// Stops consuming and closes the transport.
    pub async fn close(&self) -> Result<()> {
        self.unsubscribe_all().await?;
        self.inner.transport.close().await?;
        info!(node = %self.inner.node, "AMQ client closed");
        Ok(())
    }

    fn own_queues(&self) -> Result<Vec<String>> {
        let config = &self.inner.config;
        if !config.is_partitioned() {
            return Ok(vec![self.queue_name(&self.inner.system_id)?]);
        }
        config
            .effective_listen_partitions()
            .into_iter()
            .map(|index| self.partitioned_queue_name(&self.inner.system_id, index))
            .collect()
    }
}

impl ClientInner {
    fn processor(&self, genre: &str) -> Result<Option<Arc<dyn Processor>>> {
        let processors = self
            .processors
            .read()
            .map_err(|_| ClientError::LockPoisoned {
                context: "processor table read".to_string(),
            })?;
        Ok(processors.get(genre).cloned())
    }

    async fn handle_inbound(&self, payload: &[u8]) -> Result<()> {
        let envelope = Envelope::from_slice(payload)?;
        self.engine.validate(&envelope)?;
        let processor = self.processor(envelope.genre())?.ok_or_else(|| {
            ProtocolError::NoProcessorRegistered {
                genre: envelope.genre().to_string(),
            }
        })?;

        debug!(
            node = %self.node,
            msg_id = %envelope.msg_id(),
            category = %envelope.category(),
            phase = %envelope.phase(),
            "Dispatching inbound envelope"
        );

        let listener = ProcessorListener(processor);
        if let Some(reply) = self.engine.dispatch(&envelope, &listener)? {
            let queue = resolve_send_queue(&reply);
            self.transport
                .publish(queue, Bytes::from(reply.to_bytes()?))
                .await?;
            debug!(
                node = %self.node,
                queue,
                msg_id = %reply.msg_id(),
                phase = %reply.phase(),
                "Reply sent"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryHandler for ClientInner {
    async fn deliver(&self, queue: &str, payload: Bytes) {
        match self.handle_inbound(&payload).await {
            Ok(()) => {}
            Err(ClientError::Protocol(ProtocolError::NoProcessorRegistered { genre })) => {
                error!(
                    node = %self.node,
                    queue,
                    genre = %genre,
                    "No processor for message type; message dropped"
                );
            }
            Err(e) => {
                warn!(node = %self.node, queue, "Failed to handle inbound message: {}", e);
            }
        }
    }
}
