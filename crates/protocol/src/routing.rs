//! Outbound queue selection by phase.

use crate::envelope::{Envelope, Phase};

/// Returns the queue an envelope must be published to.
///
/// | phase          | queue           |
/// |----------------|-----------------|
/// | `SENDER_REQ`   | `dstNewQueue`   |
/// | `RECEIVER_ACK` | `srcAckQueue`   |
/// | `SENDER_ACK`   | `dstAckQueue`   |
///
/// Unrecognised phase codes never reach this point: they are rejected with
/// `InvalidPhase` when the envelope is decoded.
pub fn resolve_send_queue(envelope: &Envelope) -> &str {
    match envelope.phase() {
        Phase::SenderReq => envelope.dst_new_queue(),
        Phase::ReceiverAck => envelope.src_ack_queue(),
        Phase::SenderAck => envelope.dst_ack_queue(),
    }
}
