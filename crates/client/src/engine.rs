//! Per-process hub that hands out one [`Client`] per node.

use std::sync::Arc;

use amq_protocol::{Node, Signer};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::client::Client;
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::registry::ProviderRegistry;

/// Builds clients lazily from configuration and caches them by node.
pub struct Engine {
    config: Config,
    signer: Signer,
    registry: Arc<ProviderRegistry>,
    clients: DashMap<Node, Client>,
}

impl Engine {
    /// Validates `config` and creates an engine over `registry`.
    pub fn new(config: Config, registry: Arc<ProviderRegistry>) -> Result<Self> {
        config.validate()?;
        let signer = Signer::new(config.security.signing_secret.clone());
        info!(system_id = %config.client.system_id, "AMQ engine created");
        Ok(Self {
            config,
            signer,
            registry,
            clients: DashMap::new(),
        })
    }

    /// This system's id.
    pub fn system_id(&self) -> &str {
        &self.config.client.system_id
    }

    /// The engine's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Client for `node`, created on first use.
    pub fn client(&self, node: Node) -> Result<Client> {
        match self.clients.entry(node) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let node_config = self
                    .config
                    .node(node)
                    .cloned()
                    .ok_or(ClientError::NodeNotConfigured(node))?;
                let client = Client::new(
                    self.system_id(),
                    node,
                    node_config,
                    self.signer.clone(),
                    &self.registry,
                )?;
                entry.insert(client.clone());
                Ok(client)
            }
        }
    }

    /// Closes every client created so far.
    ///
    /// All clients are closed even if some fail; the first failure is
    /// returned.
    pub async fn shutdown(&self) -> Result<()> {
        let nodes: Vec<Node> = self.clients.iter().map(|e| *e.key()).collect();
        let mut first_error = None;
        for node in nodes {
            if let Some((_, client)) = self.clients.remove(&node) {
                if let Err(e) = client.close().await {
                    warn!(node = %node, "Failed to close client: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
