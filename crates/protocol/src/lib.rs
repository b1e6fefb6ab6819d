//! # AMQ Protocol Library
//!
//! Protocol core of the AMQ asynchronous messaging layer: the signed wire
//! envelope, the typed message variants applications work with, phase based
//! queue routing and the handshake state machine.
//!
//! ## Interaction patterns
//!
//! ```text
//! NOTICE    sender ──SENDER_REQ──▶ recipient
//!
//! SIMPLEX   sender ──SENDER_REQ──▶ recipient
//!           sender ◀─RECEIVER_ACK─ recipient
//!
//! DUPLEX    sender ──SENDER_REQ──▶ recipient
//!           sender ◀─RECEIVER_ACK─ recipient
//!           sender ──SENDER_ACK──▶ recipient
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use amq_protocol::{resolve_send_queue, Envelope, Message, MsgBody, Signer, SimplexMessage};
//!
//! let signer = Signer::new("shared-secret");
//! let message: Message = SimplexMessage::new("pay", "sys_amq_0001_biz", "sys_amq_0002_biz")
//!     .with_body(MsgBody::new().with("amount", 25))
//!     .into();
//!
//! let envelope = Envelope::from_message(&message, &signer);
//! assert_eq!(resolve_send_queue(&envelope), "sys_amq_0002_biz");
//! assert!(signer.verify(&envelope).is_ok());
//!
//! let wire = envelope.to_bytes().unwrap();
//! let decoded = Envelope::from_slice(&wire).unwrap();
//! assert_eq!(decoded, envelope);
//! ```
//!
//! ## Modules
//!
//! - [`body`]: message body and its canonical form
//! - [`message`]: categories, message ids and typed message variants
//! - [`envelope`]: phases and the signed wire envelope
//! - [`signing`]: signature computation and verification
//! - [`routing`]: outbound queue selection
//! - [`handshake`]: listener callbacks and the phase state machine
//! - [`queue`]: node identifiers and queue naming
//! - [`error`]: error types

pub mod body;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod message;
pub mod queue;
pub mod routing;
pub mod signing;

pub use body::MsgBody;
pub use envelope::{Envelope, Phase};
pub use error::{BoxError, ProtocolError, Result};
pub use handshake::{HandshakeEngine, Listener};
pub use message::{Category, DuplexMessage, Message, MsgId, NoticeMessage, SimplexMessage};
pub use queue::{validate_system_id, Node, QueueName, QUEUE_PREFIX};
pub use routing::resolve_send_queue;
pub use signing::Signer;
