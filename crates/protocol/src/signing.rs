//! Envelope integrity signatures.
//!
//! The signature is a SHA-256 digest, lowercase hex, over a canonical
//! concatenation of every envelope field followed by a shared secret:
//!
//! ```text
//! "category=" NAME "type=" genre "msgId=" msgId
//! "queue=" srcAckQueue dstAckQueue dstNewQueue
//! "body=" canonical(body)
//! "@phase=" NAME "@sendTime=" decimal(sendTime)
//! secret
//! ```
//!
//! Category and phase contribute their upper-case names (`DUPLEX`,
//! `RECEIVER_ACK`), not their wire codes.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::envelope::Envelope;
use crate::error::{ProtocolError, Result};

/// Signs and verifies envelopes with a shared secret.
#[derive(Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    /// Creates a signer for `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Builds the exact string that is hashed for `envelope`.
    pub fn canonical_input(&self, envelope: &Envelope) -> String {
        let body = envelope.body().canonical_serialize();
        let send_time = envelope.send_time().to_string();
        let mut input = String::with_capacity(
            96 + envelope.genre().len()
                + envelope.msg_id().as_str().len()
                + envelope.src_ack_queue().len()
                + envelope.dst_ack_queue().len()
                + envelope.dst_new_queue().len()
                + body.len()
                + self.secret.len(),
        );
        input.push_str("category=");
        input.push_str(envelope.category().name());
        input.push_str("type=");
        input.push_str(envelope.genre());
        input.push_str("msgId=");
        input.push_str(envelope.msg_id().as_str());
        input.push_str("queue=");
        input.push_str(envelope.src_ack_queue());
        input.push_str(envelope.dst_ack_queue());
        input.push_str(envelope.dst_new_queue());
        input.push_str("body=");
        input.push_str(&body);
        input.push_str("@phase=");
        input.push_str(envelope.phase().name());
        input.push_str("@sendTime=");
        input.push_str(&send_time);
        input.push_str(&self.secret);
        input
    }

    /// Computes the signature of `envelope`, ignoring its carried signature.
    pub fn sign(&self, envelope: &Envelope) -> String {
        let digest = Sha256::digest(self.canonical_input(envelope).as_bytes());
        hex::encode(digest)
    }

    /// Recomputes the signature and compares it with the carried one in
    /// constant time.
    pub fn verify(&self, envelope: &Envelope) -> Result<()> {
        let expected = self.sign(envelope);
        if bool::from(expected.as_bytes().ct_eq(envelope.signature().as_bytes())) {
            Ok(())
        } else {
            Err(ProtocolError::SignatureMismatch {
                msg_id: envelope.msg_id().to_string(),
            })
        }
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
