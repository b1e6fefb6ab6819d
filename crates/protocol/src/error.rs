//! Error types for the protocol crate.

use thiserror::Error;

/// Boxed error returned by application listener callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // Handshake errors
    /// The phase is not legal for the envelope's category or entry point.
    #[error("invalid phase {phase} for {category} message")]
    InvalidPhase {
        /// Category name of the envelope.
        category: String,
        /// Phase name (or raw code if unrecognised).
        phase: String,
    },

    /// The envelope category does not match the requested conversion.
    #[error("category mismatch: expected {expected}, got {actual}")]
    CategoryMismatch {
        /// Category the conversion required.
        expected: String,
        /// Category (or raw code) the envelope carried.
        actual: String,
    },

    // Integrity errors
    /// Recomputed signature disagrees with the carried one.
    #[error("signature mismatch for message {msg_id}")]
    SignatureMismatch {
        /// Correlation id of the rejected envelope.
        msg_id: String,
    },

    // Addressing errors
    /// Queue name fails the naming pattern or references an unknown node.
    #[error("invalid queue name {name:?}: {reason}")]
    InvalidQueueName {
        /// The rejected queue name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The `{node}` segment does not name a known node.
    #[error("unknown node {0:?}")]
    UnknownNode(String),

    /// System ids are exactly four decimal digits.
    #[error("invalid system id {0:?}: expected four digits")]
    InvalidSystemId(String),

    // Application errors
    /// Error raised by application listener code.
    #[error("listener failed: {0}")]
    Listener(#[source] BoxError),

    /// No processor is registered for the inbound genre.
    #[error("no processor registered for message type {genre:?}")]
    NoProcessorRegistered {
        /// The unhandled genre.
        genre: String,
    },

    // Body errors
    /// The body has no entry under the requested key.
    #[error("body has no key {0:?}")]
    MissingBodyKey(String),

    /// The stored string cannot be parsed as the requested type.
    #[error("body value {value:?} under key {key:?} is not a valid {expected}")]
    InvalidBodyValue {
        /// Key that was read.
        key: String,
        /// Requested type name.
        expected: &'static str,
        /// Stored string.
        value: String,
    },

    // Serialization errors
    /// Failed to serialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ProtocolError {
    /// Wraps an application error raised inside a listener callback.
    pub fn listener<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        ProtocolError::Listener(err.into())
    }
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Deserialization(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_phase_display() {
        let err = ProtocolError::InvalidPhase {
            category: "NOTICE".to_string(),
            phase: "RECEIVER_ACK".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid phase RECEIVER_ACK for NOTICE message"
        );
    }

    #[test]
    fn test_category_mismatch_display() {
        let err = ProtocolError::CategoryMismatch {
            expected: "DUPLEX".to_string(),
            actual: "SIMPLEX".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "category mismatch: expected DUPLEX, got SIMPLEX"
        );
    }

    #[test]
    fn test_signature_mismatch_display() {
        let err = ProtocolError::SignatureMismatch {
            msg_id: "m-1".to_string(),
        };
        assert_eq!(err.to_string(), "signature mismatch for message m-1");
    }

    #[test]
    fn test_invalid_queue_name_display() {
        let err = ProtocolError::InvalidQueueName {
            name: "sys_amq_01_biz".to_string(),
            reason: "does not match naming pattern".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid queue name \"sys_amq_01_biz\": does not match naming pattern"
        );
    }

    #[test]
    fn test_invalid_body_value_display() {
        let err = ProtocolError::InvalidBodyValue {
            key: "amount".to_string(),
            expected: "i64",
            value: "ten".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "body value \"ten\" under key \"amount\" is not a valid i64"
        );
    }

    #[test]
    fn test_listener_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "ledger offline");
        let err = ProtocolError::listener(io);
        assert_eq!(err.to_string(), "listener failed: ledger offline");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "ledger offline");
    }

    #[test]
    fn test_listener_from_string() {
        let err = ProtocolError::listener("rejected");
        assert!(matches!(err, ProtocolError::Listener(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let protocol_err: ProtocolError = json_err.into();
        assert!(matches!(protocol_err, ProtocolError::Deserialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProtocolError>();
    }
}
