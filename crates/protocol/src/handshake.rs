//! Handshake state machine.
//!
//! Legal transitions per category (terminal steps produce no envelope):
//!
//! ```text
//!            SENDER_REQ             RECEIVER_ACK            SENDER_ACK
//! NOTICE     on_received, end       illegal                 illegal
//! SIMPLEX    on_received -> ack?    on_recipient_ack, end   illegal
//! DUPLEX     on_received -> ack?    on_recipient_ack -> ack? on_sender_ack, end
//! ```
//!
//! The engine holds only the signer. Every call is a pure function of the
//! envelope and the listener's answer, so one engine can serve any number of
//! concurrent handshakes.

use crate::body::MsgBody;
use crate::envelope::{Envelope, Phase};
use crate::error::{BoxError, ProtocolError, Result};
use crate::message::{Category, Message, MsgId};
use crate::signing::Signer;

/// Application callbacks driven by the state machine.
///
/// Returning `Ok(Some(body))` from a callback that may reply makes the engine
/// emit the next envelope carrying `body`. `Ok(None)` ends the handshake at
/// this side.
pub trait Listener {
    /// A new request or notice arrived.
    fn on_received(&self, message: &Message) -> std::result::Result<Option<MsgBody>, BoxError>;

    /// The recipient acknowledged one of our simplex or duplex requests.
    fn on_recipient_ack_received(
        &self,
        genre: &str,
        msg_id: &MsgId,
        body: &MsgBody,
    ) -> std::result::Result<Option<MsgBody>, BoxError>;

    /// The sender acknowledged our ack of a duplex request.
    fn on_sender_ack_received(
        &self,
        genre: &str,
        msg_id: &MsgId,
        body: &MsgBody,
    ) -> std::result::Result<(), BoxError>;
}

/// Validates inbound envelopes and produces reply envelopes.
#[derive(Debug, Clone)]
pub struct HandshakeEngine {
    signer: Signer,
}

impl HandshakeEngine {
    /// Creates an engine that verifies and signs with `signer`.
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    /// The signer used for verification and replies.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Checks that the envelope's phase is legal for its category and that
    /// its signature verifies, without calling any listener.
    pub fn validate(&self, envelope: &Envelope) -> Result<()> {
        if envelope.phase() != Phase::SenderReq {
            ack_step(envelope)?;
        }
        self.signer.verify(envelope)
    }

    /// Routes an inbound envelope to [`handle_new`](Self::handle_new) or
    /// [`handle_ack`](Self::handle_ack) by phase.
    pub fn dispatch<L: Listener + ?Sized>(
        &self,
        envelope: &Envelope,
        listener: &L,
    ) -> Result<Option<Envelope>> {
        match envelope.phase() {
            Phase::SenderReq => self.handle_new(envelope, listener),
            Phase::ReceiverAck | Phase::SenderAck => self.handle_ack(envelope, listener),
        }
    }

    /// Handles a new notice or request.
    ///
    /// Fails with `InvalidPhase` unless the envelope is at `SENDER_REQ`, and
    /// with `SignatureMismatch` if it was tampered with. Both checks run
    /// before the listener is called. Notices never produce a reply.
    pub fn handle_new<L: Listener + ?Sized>(
        &self,
        envelope: &Envelope,
        listener: &L,
    ) -> Result<Option<Envelope>> {
        if envelope.phase() != Phase::SenderReq {
            return Err(invalid_phase(envelope));
        }
        self.signer.verify(envelope)?;

        let message = envelope.to_message();
        let reply = listener
            .on_received(&message)
            .map_err(ProtocolError::Listener)?;

        match envelope.category() {
            Category::Notice => Ok(None),
            Category::Simplex | Category::Duplex => {
                Ok(reply.map(|body| envelope.reply(Phase::ReceiverAck, body, &self.signer)))
            }
        }
    }

    /// Handles an acknowledgment.
    ///
    /// Legal pairs are `(SIMPLEX, RECEIVER_ACK)`, `(DUPLEX, RECEIVER_ACK)` and
    /// `(DUPLEX, SENDER_ACK)`; anything else fails with `InvalidPhase` before
    /// the signature is checked or the listener is called.
    pub fn handle_ack<L: Listener + ?Sized>(
        &self,
        envelope: &Envelope,
        listener: &L,
    ) -> Result<Option<Envelope>> {
        let step = ack_step(envelope)?;
        self.signer.verify(envelope)?;

        let genre = envelope.genre();
        let msg_id = envelope.msg_id();
        let body = envelope.body();
        match step {
            AckStep::SimplexRecipientAck => {
                listener
                    .on_recipient_ack_received(genre, msg_id, body)
                    .map_err(ProtocolError::Listener)?;
                Ok(None)
            }
            AckStep::DuplexRecipientAck => {
                let reply = listener
                    .on_recipient_ack_received(genre, msg_id, body)
                    .map_err(ProtocolError::Listener)?;
                Ok(reply.map(|body| envelope.reply(Phase::SenderAck, body, &self.signer)))
            }
            AckStep::DuplexSenderAck => {
                listener
                    .on_sender_ack_received(genre, msg_id, body)
                    .map_err(ProtocolError::Listener)?;
                Ok(None)
            }
        }
    }
}

enum AckStep {
    SimplexRecipientAck,
    DuplexRecipientAck,
    DuplexSenderAck,
}

fn ack_step(envelope: &Envelope) -> Result<AckStep> {
    match (envelope.category(), envelope.phase()) {
        (Category::Simplex, Phase::ReceiverAck) => Ok(AckStep::SimplexRecipientAck),
        (Category::Duplex, Phase::ReceiverAck) => Ok(AckStep::DuplexRecipientAck),
        (Category::Duplex, Phase::SenderAck) => Ok(AckStep::DuplexSenderAck),
        _ => Err(invalid_phase(envelope)),
    }
}

fn invalid_phase(envelope: &Envelope) -> ProtocolError {
    ProtocolError::InvalidPhase {
        category: envelope.category().name().to_string(),
        phase: envelope.phase().name().to_string(),
    }
}
