//! Application message processors.

use std::sync::Arc;

use amq_protocol::{BoxError, Listener, Message, MsgBody, MsgId};

/// Handles every handshake step for one message type.
///
/// Register processors with [`Client::add_processor`](crate::Client::add_processor)
/// before the client starts. Inbound messages whose type has no processor are
/// logged and dropped.
pub trait Processor: Send + Sync {
    /// Message type handled by this processor.
    fn genre(&self) -> &str;

    /// A new notice or request arrived.
    ///
    /// For simplex and duplex requests, `Some(body)` is sent back to the
    /// sender as the recipient acknowledgment. Notices ignore the answer.
    fn on_received(&self, message: &Message) -> Result<Option<MsgBody>, BoxError>;

    /// The recipient acknowledged a request this system sent.
    ///
    /// For duplex messages, `Some(body)` is sent as the final sender
    /// acknowledgment.
    fn on_recipient_ack_received(
        &self,
        _msg_id: &MsgId,
        _body: &MsgBody,
    ) -> Result<Option<MsgBody>, BoxError> {
        Ok(None)
    }

    /// The sender acknowledged this system's ack of a duplex request.
    fn on_sender_ack_received(&self, _msg_id: &MsgId, _body: &MsgBody) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Adapts a [`Processor`] to the handshake engine's [`Listener`].
pub(crate) struct ProcessorListener(pub(crate) Arc<dyn Processor>);

impl Listener for ProcessorListener {
    fn on_received(&self, message: &Message) -> Result<Option<MsgBody>, BoxError> {
        self.0.on_received(message)
    }

    fn on_recipient_ack_received(
        &self,
        _genre: &str,
        msg_id: &MsgId,
        body: &MsgBody,
    ) -> Result<Option<MsgBody>, BoxError> {
        self.0.on_recipient_ack_received(msg_id, body)
    }

    fn on_sender_ack_received(
        &self,
        _genre: &str,
        msg_id: &MsgId,
        body: &MsgBody,
    ) -> Result<(), BoxError> {
        self.0.on_sender_ack_received(msg_id, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amq_protocol::NoticeMessage;

    struct Echo;

    impl Processor for Echo {
        fn genre(&self) -> &str {
            "echo"
        }

        fn on_received(&self, message: &Message) -> Result<Option<MsgBody>, BoxError> {
            Ok(Some(message.body().clone()))
        }
    }

    #[test]
    fn test_default_ack_callbacks() {
        let listener = ProcessorListener(Arc::new(Echo));
        let id = MsgId::from("m-1");
        let body = MsgBody::new().with("k", "v");

        assert!(listener
            .on_recipient_ack_received("echo", &id, &body)
            .unwrap()
            .is_none());
        assert!(listener.on_sender_ack_received("echo", &id, &body).is_ok());
    }

    #[test]
    fn test_listener_forwards_received() {
        let listener = ProcessorListener(Arc::new(Echo));
        let message: Message = NoticeMessage::new("echo", "sys_amq_0001_biz")
            .with_body(MsgBody::new().with("n", 1))
            .into();
        let reply = listener.on_received(&message).unwrap().unwrap();
        assert_eq!(reply.get("n"), Some("1"));
    }
}
