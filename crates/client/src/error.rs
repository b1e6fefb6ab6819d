//! Error types for the client runtime.

use amq_protocol::{Node, ProtocolError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by transports and their providers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A consumer already holds the queue.
    #[error("queue {0:?} already has an exclusive consumer")]
    AlreadySubscribed(String),

    /// The transport was closed.
    #[error("transport is closed")]
    Closed,

    /// Provider specific failure.
    #[error("transport provider failed: {0}")]
    Provider(String),
}

/// Errors raised by the provider registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A provider is already registered under the name.
    #[error("transport provider {0:?} is already registered")]
    Duplicate(String),

    /// Lock poisoned during operation.
    #[error("lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `start` was called twice, or `add_processor` after `start`.
    #[error("client for node {0} is already started")]
    AlreadyStarted(Node),

    /// Partition index outside the node's layout.
    #[error("partition {index} is out of range for a node with {partitions} partition(s)")]
    InvalidPartition { index: u32, partitions: u32 },

    /// No `[nodes.<node>]` section for the requested node.
    #[error("node {0} is not configured")]
    NodeNotConfigured(Node),

    /// No provider registered under the configured name.
    #[error("unknown transport provider {0:?}")]
    UnknownProvider(String),

    /// Lock poisoned during operation.
    #[error("lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_is_transparent() {
        let err: ClientError = ProtocolError::UnknownNode("x".to_string()).into();
        assert_eq!(err.to_string(), "unknown node \"x\"");
    }

    #[test]
    fn test_invalid_partition_display() {
        let err = ClientError::InvalidPartition {
            index: 4,
            partitions: 2,
        };
        assert_eq!(
            err.to_string(),
            "partition 4 is out of range for a node with 2 partition(s)"
        );
    }

    #[test]
    fn test_already_subscribed_display() {
        let err = TransportError::AlreadySubscribed("sys_amq_0001_biz".to_string());
        assert_eq!(
            err.to_string(),
            "queue \"sys_amq_0001_biz\" already has an exclusive consumer"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientError>();
    }
}
