//! # AMQ Client Library
//!
//! Runtime side of AMQ: connects a system to broker nodes, listens on its
//! own queues and drives the handshake for every inbound envelope.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Engine                             │
//! │        (config, signer, provider registry, client cache)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐        │
//! │  │ Client (biz) │  │ Client (fund)│  │ Client (opt) │        │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘        │
//! │         │  processors + HandshakeEngine     │                │
//! │  ┌──────┴─────────────────┴─────────────────┴─────────────┐  │
//! │  │                Transport (per node)                    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use amq_client::{Config, Engine, ProviderRegistry};
//! use amq_protocol::{Node, NoticeMessage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load_default()?;
//!     config.apply_env_overrides();
//!
//!     let engine = Engine::new(config, Arc::new(ProviderRegistry::with_defaults()))?;
//!     let client = engine.client(Node::Biz)?;
//!     client.start().await?;
//!
//!     let destination = client.queue_name("0002")?;
//!     client.send(NoticeMessage::new("hello", destination).into()).await?;
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod processor;
pub mod registry;
pub mod transport;

pub use client::Client;
pub use config::{Config, ConfigError, NodeConfig};
pub use engine::Engine;
pub use error::{ClientError, RegistryError, Result, TransportError};
pub use memory::{InMemoryBroker, InMemoryProvider, InMemoryTransport, MEMORY_PROVIDER};
pub use processor::Processor;
pub use registry::ProviderRegistry;
pub use transport::{DeliveryHandler, Transport, TransportProvider};
