//! Application-facing message variants.
//!
//! Applications build one of [`NoticeMessage`], [`SimplexMessage`] or
//! [`DuplexMessage`] and hand it to the client inside a [`Message`]. Inbound
//! envelopes are projected back into the same shapes before reaching
//! application callbacks.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::body::MsgBody;

/// Interaction pattern of a message.
///
/// Fixed for the lifetime of a message id. Encoded on the wire as a
/// single-character code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Fire-and-forget notification.
    Notice,
    /// One-way transaction: request plus recipient acknowledgment.
    Simplex,
    /// Two-way transaction: request, recipient ack, sender ack.
    Duplex,
}

impl Category {
    /// All categories in code order.
    pub const ALL: [Category; 3] = [Category::Notice, Category::Simplex, Category::Duplex];

    /// Wire code (`"1"`, `"2"`, `"3"`).
    pub fn code(self) -> &'static str {
        match self {
            Category::Notice => "1",
            Category::Simplex => "2",
            Category::Duplex => "3",
        }
    }

    /// Upper-case name used in the signature input.
    pub fn name(self) -> &'static str {
        match self {
            Category::Notice => "NOTICE",
            Category::Simplex => "SIMPLEX",
            Category::Duplex => "DUPLEX",
        }
    }

    /// Resolves a wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Category::Notice),
            "2" => Some(Category::Simplex),
            "3" => Some(Category::Duplex),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Correlation id shared by every envelope of one handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(String);

impl MsgId {
    /// Generates a fresh id.
    ///
    /// UUIDv7: time-ordered with 74 random bits, so concurrent generation in
    /// one process does not collide in practice. Uniqueness is still not
    /// enforced anywhere in this layer.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MsgId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MsgId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification delivered to a single queue, with no acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeMessage {
    /// Application message type.
    pub genre: String,
    /// Correlation id.
    pub msg_id: MsgId,
    /// Recipient's delivery queue.
    pub destination: String,
    /// Business payload.
    pub body: MsgBody,
}

impl NoticeMessage {
    /// Creates a notice with a freshly generated id and empty body.
    pub fn new(genre: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            genre: genre.into(),
            msg_id: MsgId::generate(),
            destination: destination.into(),
            body: MsgBody::new(),
        }
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: MsgBody) -> Self {
        self.body = body;
        self
    }
}

/// One-way transactional request answered by one recipient acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplexMessage {
    /// Application message type.
    pub genre: String,
    /// Correlation id.
    pub msg_id: MsgId,
    /// Sender's ack queue.
    pub source: String,
    /// Recipient's request queue.
    pub destination: String,
    /// Business payload.
    pub body: MsgBody,
}

impl SimplexMessage {
    /// Creates a simplex request with a freshly generated id and empty body.
    pub fn new(
        genre: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            genre: genre.into(),
            msg_id: MsgId::generate(),
            source: source.into(),
            destination: destination.into(),
            body: MsgBody::new(),
        }
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: MsgBody) -> Self {
        self.body = body;
        self
    }
}

/// Two-way transactional request acknowledged by both parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplexMessage {
    /// Application message type.
    pub genre: String,
    /// Correlation id.
    pub msg_id: MsgId,
    /// Sender's ack queue.
    pub source: String,
    /// Recipient's request queue.
    pub destination_new: String,
    /// Recipient's ack queue.
    pub destination_ack: String,
    /// Business payload.
    pub body: MsgBody,
}

impl DuplexMessage {
    /// Creates a duplex request with a freshly generated id and empty body.
    pub fn new(
        genre: impl Into<String>,
        source: impl Into<String>,
        destination_new: impl Into<String>,
        destination_ack: impl Into<String>,
    ) -> Self {
        Self {
            genre: genre.into(),
            msg_id: MsgId::generate(),
            source: source.into(),
            destination_new: destination_new.into(),
            destination_ack: destination_ack.into(),
            body: MsgBody::new(),
        }
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: MsgBody) -> Self {
        self.body = body;
        self
    }
}

/// A typed message, discriminated by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Notification.
    Notice(NoticeMessage),
    /// One-way transaction.
    Simplex(SimplexMessage),
    /// Two-way transaction.
    Duplex(DuplexMessage),
}

impl Message {
    /// Category discriminant.
    pub fn category(&self) -> Category {
        match self {
            Message::Notice(_) => Category::Notice,
            Message::Simplex(_) => Category::Simplex,
            Message::Duplex(_) => Category::Duplex,
        }
    }

    /// Application message type.
    pub fn genre(&self) -> &str {
        match self {
            Message::Notice(m) => &m.genre,
            Message::Simplex(m) => &m.genre,
            Message::Duplex(m) => &m.genre,
        }
    }

    /// Correlation id.
    pub fn msg_id(&self) -> &MsgId {
        match self {
            Message::Notice(m) => &m.msg_id,
            Message::Simplex(m) => &m.msg_id,
            Message::Duplex(m) => &m.msg_id,
        }
    }

    /// Business payload.
    pub fn body(&self) -> &MsgBody {
        match self {
            Message::Notice(m) => &m.body,
            Message::Simplex(m) => &m.body,
            Message::Duplex(m) => &m.body,
        }
    }

    /// Every queue name the message addresses.
    pub fn queue_names(&self) -> Vec<&str> {
        match self {
            Message::Notice(m) => vec![m.destination.as_str()],
            Message::Simplex(m) => vec![m.source.as_str(), m.destination.as_str()],
            Message::Duplex(m) => vec![
                m.source.as_str(),
                m.destination_new.as_str(),
                m.destination_ack.as_str(),
            ],
        }
    }
}

impl From<NoticeMessage> for Message {
    fn from(m: NoticeMessage) -> Self {
        Message::Notice(m)
    }
}

impl From<SimplexMessage> for Message {
    fn from(m: SimplexMessage) -> Self {
        Message::Simplex(m)
    }
}

impl From<DuplexMessage> for Message {
    fn from(m: DuplexMessage) -> Self {
        Message::Duplex(m)
    }
}
