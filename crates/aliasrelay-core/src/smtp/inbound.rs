//! SMTP transaction as an inbound message

use super::Forwarder;
use crate::routing::InboundMessage;
use aliasrelay_common::Result;
use async_trait::async_trait;
use mail_parser::MessageParser;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One completed MAIL/RCPT/DATA transaction.
///
/// Forwarding goes through the configured [`Forwarder`]; a reject is held
/// until the session writes it back to the client.
pub struct SmtpInboundMessage {
    sender: Option<String>,
    from: String,
    recipient: String,
    message_id: String,
    raw: Vec<u8>,
    forwarder: Arc<dyn Forwarder>,
    rejection: Mutex<Option<(u16, String)>>,
}

impl SmtpInboundMessage {
    /// `sender` is `None` for the null reverse-path `<>`.
    pub fn new(
        sender: Option<String>,
        recipient: String,
        raw: Vec<u8>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let message_id = MessageParser::default()
            .parse(raw.as_slice())
            .and_then(|parsed| parsed.message_id().map(str::to_string))
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        Self {
            from: sender.clone().unwrap_or_default(),
            sender,
            recipient,
            message_id,
            raw,
            forwarder,
            rejection: Mutex::new(None),
        }
    }

    /// Take the reject recorded by the router, if any
    pub async fn take_rejection(&self) -> Option<(u16, String)> {
        self.rejection.lock().await.take()
    }
}

#[async_trait]
impl InboundMessage for SmtpInboundMessage {
    fn from(&self) -> &str {
        &self.from
    }

    fn to(&self) -> &str {
        &self.recipient
    }

    fn raw_size(&self) -> u64 {
        self.raw.len() as u64
    }

    fn message_id(&self) -> &str {
        &self.message_id
    }

    async fn forward(&self, destination: &str) -> Result<()> {
        self.forwarder
            .forward(self.sender.as_deref(), destination, &self.raw)
            .await
    }

    async fn reject(&self, code: u16, reason: &str) {
        *self.rejection.lock().await = Some((code, reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::testing::{RecordingForwarder, Relayed};
    use pretty_assertions::assert_eq;

    const RAW: &[u8] = b"Message-ID: <abc123@sender.example.org>\r\n\
From: sender@example.org\r\n\
Subject: hi\r\n\
\r\n\
Hello\r\n";

    #[tokio::test]
    async fn test_message_id_from_header() {
        let message = SmtpInboundMessage::new(
            Some("sender@example.org".to_string()),
            "hello@example.com".to_string(),
            RAW.to_vec(),
            Arc::new(RecordingForwarder::new()),
        );

        assert_eq!(message.message_id(), "abc123@sender.example.org");
        assert_eq!(message.raw_size(), RAW.len() as u64);
        assert_eq!(message.from(), "sender@example.org");
        assert_eq!(message.to(), "hello@example.com");
    }

    #[tokio::test]
    async fn test_message_id_generated_when_missing() {
        let message = SmtpInboundMessage::new(
            None,
            "hello@example.com".to_string(),
            b"Subject: no id\r\n\r\nbody\r\n".to_vec(),
            Arc::new(RecordingForwarder::new()),
        );

        assert!(Uuid::parse_str(message.message_id()).is_ok());
        assert_eq!(message.from(), "");
    }

    #[tokio::test]
    async fn test_forward_preserves_envelope_and_bytes() {
        let forwarder = Arc::new(RecordingForwarder::new());
        let message = SmtpInboundMessage::new(
            None,
            "hello@example.com".to_string(),
            RAW.to_vec(),
            forwarder.clone(),
        );

        message.forward("you@inbox.example.net").await.unwrap();

        assert_eq!(
            forwarder.relayed(),
            vec![Relayed {
                sender: None,
                destination: "you@inbox.example.net".to_string(),
                raw: RAW.to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn test_reject_is_held_once() {
        let message = SmtpInboundMessage::new(
            Some("sender@example.org".to_string()),
            "nobody@example.com".to_string(),
            RAW.to_vec(),
            Arc::new(RecordingForwarder::new()),
        );

        message.reject(550, "no matching alias or plus-base alias found").await;

        assert_eq!(
            message.take_rejection().await,
            Some((550, "no matching alias or plus-base alias found".to_string()))
        );
        assert_eq!(message.take_rejection().await, None);
    }
}
