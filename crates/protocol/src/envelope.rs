//! The signed wire envelope.
//!
//! An [`Envelope`] is built once per handshake step and never edited after
//! signing. Each phase transition derives a new envelope from the previous
//! one. Fields are read-only from outside the crate.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::body::{null_as_default, MsgBody};
use crate::error::{ProtocolError, Result};
use crate::message::{Category, DuplexMessage, Message, MsgId, NoticeMessage, SimplexMessage};
use crate::signing::Signer;

/// Step within a category's handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Sender has issued the request. Initial phase of every message.
    SenderReq,
    /// Recipient has acknowledged the request.
    ReceiverAck,
    /// Sender has acknowledged the recipient's ack (duplex only).
    SenderAck,
}

impl Phase {
    /// All phases in handshake order.
    pub const ALL: [Phase; 3] = [Phase::SenderReq, Phase::ReceiverAck, Phase::SenderAck];

    /// Wire code (`"1"`, `"2"`, `"3"`).
    pub fn code(self) -> &'static str {
        match self {
            Phase::SenderReq => "1",
            Phase::ReceiverAck => "2",
            Phase::SenderAck => "3",
        }
    }

    /// Upper-case name used in the signature input.
    pub fn name(self) -> &'static str {
        match self {
            Phase::SenderReq => "SENDER_REQ",
            Phase::ReceiverAck => "RECEIVER_ACK",
            Phase::SenderAck => "SENDER_ACK",
        }
    }

    /// Resolves a wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Phase::SenderReq),
            "2" => Some(Phase::ReceiverAck),
            "3" => Some(Phase::SenderAck),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signed wire record exchanged with the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireEnvelope", try_from = "WireEnvelope")]
pub struct Envelope {
    pub(crate) category: Category,
    pub(crate) genre: String,
    pub(crate) msg_id: MsgId,
    pub(crate) src_ack_queue: String,
    pub(crate) dst_new_queue: String,
    pub(crate) dst_ack_queue: String,
    pub(crate) body: MsgBody,
    pub(crate) send_time: i64,
    pub(crate) phase: Phase,
    pub(crate) signature: String,
}

impl Envelope {
    /// Wraps an outbound message at [`Phase::SenderReq`], stamped now and signed.
    pub fn from_message(message: &Message, signer: &Signer) -> Self {
        Self::from_message_at(message, unix_now(), signer)
    }

    /// Same as [`Envelope::from_message`] with an explicit send time.
    pub fn from_message_at(message: &Message, send_time: i64, signer: &Signer) -> Self {
        let (src_ack_queue, dst_new_queue, dst_ack_queue) = match message {
            Message::Notice(m) => (String::new(), m.destination.clone(), String::new()),
            Message::Simplex(m) => (m.source.clone(), m.destination.clone(), String::new()),
            Message::Duplex(m) => (
                m.source.clone(),
                m.destination_new.clone(),
                m.destination_ack.clone(),
            ),
        };
        let mut envelope = Self {
            category: message.category(),
            genre: message.genre().to_string(),
            msg_id: message.msg_id().clone(),
            src_ack_queue,
            dst_new_queue,
            dst_ack_queue,
            body: message.body().clone(),
            send_time,
            phase: Phase::SenderReq,
            signature: String::new(),
        };
        envelope.signature = signer.sign(&envelope);
        envelope
    }

    /// Derives the envelope for `phase`, keeping this envelope's body.
    pub fn for_phase(&self, phase: Phase, signer: &Signer) -> Self {
        self.derive(phase, self.body.clone(), unix_now(), signer)
    }

    /// Derives the envelope for `phase` carrying a reply body.
    pub fn reply(&self, phase: Phase, body: MsgBody, signer: &Signer) -> Self {
        self.derive(phase, body, unix_now(), signer)
    }

    /// Recomputes the signature with `signer`, leaving every other field as is.
    pub fn signed_with(&self, signer: &Signer) -> Self {
        let mut envelope = self.clone();
        envelope.signature = signer.sign(&envelope);
        envelope
    }

    fn derive(&self, phase: Phase, body: MsgBody, send_time: i64, signer: &Signer) -> Self {
        let mut envelope = Self {
            category: self.category,
            genre: self.genre.clone(),
            msg_id: self.msg_id.clone(),
            src_ack_queue: self.src_ack_queue.clone(),
            dst_new_queue: self.dst_new_queue.clone(),
            dst_ack_queue: self.dst_ack_queue.clone(),
            body,
            send_time,
            phase,
            signature: String::new(),
        };
        envelope.signature = signer.sign(&envelope);
        envelope
    }

    /// Message category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Application message type.
    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Correlation id.
    pub fn msg_id(&self) -> &MsgId {
        &self.msg_id
    }

    /// Sender's ack queue. Empty for notices.
    pub fn src_ack_queue(&self) -> &str {
        &self.src_ack_queue
    }

    /// Recipient's request queue.
    pub fn dst_new_queue(&self) -> &str {
        &self.dst_new_queue
    }

    /// Recipient's ack queue. Empty unless duplex.
    pub fn dst_ack_queue(&self) -> &str {
        &self.dst_ack_queue
    }

    /// Business payload.
    pub fn body(&self) -> &MsgBody {
        &self.body
    }

    /// Send time in unix seconds.
    pub fn send_time(&self) -> i64 {
        self.send_time
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Carried signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Projects the envelope onto its typed message variant.
    pub fn to_message(&self) -> Message {
        match self.category {
            Category::Notice => Message::Notice(self.notice_view()),
            Category::Simplex => Message::Simplex(self.simplex_view()),
            Category::Duplex => Message::Duplex(self.duplex_view()),
        }
    }

    fn notice_view(&self) -> NoticeMessage {
        NoticeMessage {
            genre: self.genre.clone(),
            msg_id: self.msg_id.clone(),
            destination: self.dst_new_queue.clone(),
            body: self.body.clone(),
        }
    }

    fn simplex_view(&self) -> SimplexMessage {
        SimplexMessage {
            genre: self.genre.clone(),
            msg_id: self.msg_id.clone(),
            source: self.src_ack_queue.clone(),
            destination: self.dst_new_queue.clone(),
            body: self.body.clone(),
        }
    }

    fn duplex_view(&self) -> DuplexMessage {
        DuplexMessage {
            genre: self.genre.clone(),
            msg_id: self.msg_id.clone(),
            source: self.src_ack_queue.clone(),
            destination_new: self.dst_new_queue.clone(),
            destination_ack: self.dst_ack_queue.clone(),
            body: self.body.clone(),
        }
    }

    fn expect_category(&self, expected: Category) -> Result<()> {
        if self.category == expected {
            Ok(())
        } else {
            Err(ProtocolError::CategoryMismatch {
                expected: expected.name().to_string(),
                actual: self.category.name().to_string(),
            })
        }
    }

    /// Encodes the envelope as JSON text.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::from)
    }

    /// Encodes the envelope as JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::from)
    }

    /// Decodes an envelope from JSON bytes.
    ///
    /// Unknown category codes fail with [`ProtocolError::CategoryMismatch`]
    /// and unknown phase codes with [`ProtocolError::InvalidPhase`]. The
    /// signature is not checked here.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        Self::try_from(wire)
    }

    /// Decodes an envelope from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_slice(text.as_bytes())
    }
}

impl TryFrom<&Envelope> for NoticeMessage {
    type Error = ProtocolError;

    fn try_from(envelope: &Envelope) -> Result<Self> {
        envelope.expect_category(Category::Notice)?;
        Ok(envelope.notice_view())
    }
}

impl TryFrom<&Envelope> for SimplexMessage {
    type Error = ProtocolError;

    fn try_from(envelope: &Envelope) -> Result<Self> {
        envelope.expect_category(Category::Simplex)?;
        Ok(envelope.simplex_view())
    }
}

impl TryFrom<&Envelope> for DuplexMessage {
    type Error = ProtocolError;

    fn try_from(envelope: &Envelope) -> Result<Self> {
        envelope.expect_category(Category::Duplex)?;
        Ok(envelope.duplex_view())
    }
}

/// JSON layout shared with deployed peers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    category: String,
    #[serde(rename = "type")]
    genre: String,
    msg_id: String,
    #[serde(default)]
    src_ack_queue: String,
    #[serde(default)]
    dst_new_queue: String,
    #[serde(default)]
    dst_ack_queue: String,
    #[serde(default, deserialize_with = "null_as_default")]
    body: MsgBody,
    send_time: i64,
    phase: String,
    sign: String,
}

impl From<Envelope> for WireEnvelope {
    fn from(e: Envelope) -> Self {
        Self {
            category: e.category.code().to_string(),
            genre: e.genre,
            msg_id: e.msg_id.as_str().to_string(),
            src_ack_queue: e.src_ack_queue,
            dst_new_queue: e.dst_new_queue,
            dst_ack_queue: e.dst_ack_queue,
            body: e.body,
            send_time: e.send_time,
            phase: e.phase.code().to_string(),
            sign: e.signature,
        }
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = ProtocolError;

    fn try_from(w: WireEnvelope) -> Result<Self> {
        let category =
            Category::from_code(&w.category).ok_or_else(|| ProtocolError::CategoryMismatch {
                expected: "NOTICE, SIMPLEX or DUPLEX".to_string(),
                actual: w.category.clone(),
            })?;
        let phase = Phase::from_code(&w.phase).ok_or_else(|| ProtocolError::InvalidPhase {
            category: category.name().to_string(),
            phase: w.phase.clone(),
        })?;
        Ok(Self {
            category,
            genre: w.genre,
            msg_id: MsgId::from(w.msg_id),
            src_ack_queue: w.src_ack_queue,
            dst_new_queue: w.dst_new_queue,
            dst_ack_queue: w.dst_ack_queue,
            body: w.body,
            send_time: w.send_time,
            phase,
            signature: w.sign,
        })
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Signer {
        Signer::new("unit-test-secret")
    }

    fn duplex() -> Message {
        let mut msg = DuplexMessage::new(
            "order.create",
            "sys_amq_0001_biz",
            "sys_amq_0002_biz",
            "sys_amq_0003_biz",
        )
        .with_body(MsgBody::new().with("orderId", "A-17"));
        msg.msg_id = MsgId::from("1700000000000000001");
        msg.into()
    }

    #[test]
    fn test_phase_codes() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_code(phase.code()), Some(phase));
        }
        assert_eq!(Phase::from_code("0"), None);
        assert_eq!(Phase::from_code("4"), None);
    }

    #[test]
    fn test_outbound_envelope_starts_at_sender_req() {
        let envelope = Envelope::from_message(&duplex(), &signer());
        assert_eq!(envelope.phase(), Phase::SenderReq);
        assert_eq!(envelope.category(), Category::Duplex);
        assert_eq!(envelope.src_ack_queue(), "sys_amq_0001_biz");
        assert_eq!(envelope.dst_new_queue(), "sys_amq_0002_biz");
        assert_eq!(envelope.dst_ack_queue(), "sys_amq_0003_biz");
        assert!(envelope.send_time() > 0);
        assert!(signer().verify(&envelope).is_ok());
    }

    #[test]
    fn test_notice_leaves_ack_queues_empty() {
        let msg: Message = NoticeMessage::new("ping", "sys_amq_0001_biz").into();
        let envelope = Envelope::from_message(&msg, &signer());
        assert_eq!(envelope.src_ack_queue(), "");
        assert_eq!(envelope.dst_ack_queue(), "");
        assert_eq!(envelope.dst_new_queue(), "sys_amq_0001_biz");
    }

    #[test]
    fn test_for_phase_keeps_identity_and_resigns() {
        let signer = signer();
        let request = Envelope::from_message_at(&duplex(), 100, &signer);
        let next = request.for_phase(Phase::ReceiverAck, &signer);

        assert_eq!(next.msg_id(), request.msg_id());
        assert_eq!(next.genre(), request.genre());
        assert_eq!(next.body(), request.body());
        assert_eq!(next.phase(), Phase::ReceiverAck);
        assert_ne!(next.signature(), request.signature());
        assert!(signer.verify(&next).is_ok());
    }

    #[test]
    fn test_reply_replaces_body() {
        let signer = signer();
        let request = Envelope::from_message(&duplex(), &signer);
        let reply = request.reply(
            Phase::ReceiverAck,
            MsgBody::new().with("accepted", true),
            &signer,
        );
        assert_eq!(reply.body().get("accepted"), Some("true"));
        assert!(!reply.body().has_key("orderId"));
        assert!(signer.verify(&reply).is_ok());
    }

    #[test]
    fn test_wire_field_names() {
        let envelope = Envelope::from_message_at(&duplex(), 1_700_000_000, &signer());
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["category"], "3");
        assert_eq!(value["type"], "order.create");
        assert_eq!(value["msgId"], "1700000000000000001");
        assert_eq!(value["srcAckQueue"], "sys_amq_0001_biz");
        assert_eq!(value["dstNewQueue"], "sys_amq_0002_biz");
        assert_eq!(value["dstAckQueue"], "sys_amq_0003_biz");
        assert_eq!(value["body"]["body"]["orderId"], "A-17");
        assert_eq!(value["sendTime"], 1_700_000_000);
        assert_eq!(value["phase"], "1");
        assert_eq!(value["sign"], envelope.signature());
    }

    #[test]
    fn test_decode_encoded_envelope() {
        let envelope = Envelope::from_message(&duplex(), &signer());
        let decoded = Envelope::from_slice(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_unknown_category_is_category_mismatch() {
        let json = r#"{"category":"9","type":"x","msgId":"1","srcAckQueue":"","dstNewQueue":"q","dstAckQueue":"","body":{"body":{}},"sendTime":1,"phase":"1","sign":""}"#;
        let err = Envelope::from_json(json).unwrap_err();
        assert!(matches!(err, ProtocolError::CategoryMismatch { ref actual, .. } if actual == "9"));
    }

    #[test]
    fn test_decode_unknown_phase_is_invalid_phase() {
        let json = r#"{"category":"2","type":"x","msgId":"1","dstNewQueue":"q","body":null,"sendTime":1,"phase":"7","sign":""}"#;
        let err = Envelope::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPhase { ref category, ref phase } if category == "SIMPLEX" && phase == "7"
        ));
    }

    #[test]
    fn test_decode_null_body() {
        let json = r#"{"category":"1","type":"ping","msgId":"1","dstNewQueue":"q","body":null,"sendTime":1,"phase":"1","sign":"s"}"#;
        let envelope = Envelope::from_json(json).unwrap();
        assert!(envelope.body().is_empty());
    }

    #[test]
    fn test_decode_garbage_is_deserialization_error() {
        let err = Envelope::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Deserialization(_)));
    }

    #[test]
    fn test_typed_views() {
        let envelope = Envelope::from_message(&duplex(), &signer());
        let view = DuplexMessage::try_from(&envelope).unwrap();
        assert_eq!(view.destination_new, "sys_amq_0002_biz");
        assert_eq!(view.destination_ack, "sys_amq_0003_biz");
        assert_eq!(view.source, "sys_amq_0001_biz");
        assert_eq!(envelope.to_message(), Message::Duplex(view));
    }

    #[test]
    fn test_wrong_view_is_category_mismatch() {
        let envelope = Envelope::from_message(&duplex(), &signer());
        let err = NoticeMessage::try_from(&envelope).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::CategoryMismatch { ref expected, ref actual }
                if expected == "NOTICE" && actual == "DUPLEX"
        ));
        assert!(SimplexMessage::try_from(&envelope).is_err());
    }

    #[test]
    fn test_signed_with_keeps_send_time() {
        let request = Envelope::from_message_at(&duplex(), 42, &signer());
        let other = Signer::new("rotated-secret");
        let resigned = request.signed_with(&other);

        assert_eq!(resigned.send_time(), 42);
        assert!(other.verify(&resigned).is_ok());
        assert!(signer().verify(&resigned).is_err());
    }
}
