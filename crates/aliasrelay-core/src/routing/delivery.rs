//! Delivery execution

use super::InboundMessage;
use tracing::{debug, warn};

/// Result of one forward attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Forwarded,
    Failed(String),
}

/// Ask the transport to forward `message` to `destination`, exactly once.
///
/// Any error from the transport is reported as `Failed`; nothing is retried
/// here.
pub async fn deliver(message: &dyn InboundMessage, destination: &str) -> DeliveryOutcome {
    match message.forward(destination).await {
        Ok(()) => {
            debug!(
                message_id = %message.message_id(),
                destination = %destination,
                "Message forwarded"
            );
            DeliveryOutcome::Forwarded
        }
        Err(e) => {
            warn!(
                message_id = %message.message_id(),
                destination = %destination,
                error = %e,
                "Forward failed"
            );
            DeliveryOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::testing::TestMessage;

    #[tokio::test]
    async fn test_deliver_forwards_once() {
        let message = TestMessage::new("sender@example.org", "hello@example.com");

        let outcome = deliver(&message, "you@inbox.example.net").await;
        assert_eq!(outcome, DeliveryOutcome::Forwarded);
        assert_eq!(message.forwarded(), vec!["you@inbox.example.net".to_string()]);
        assert!(message.rejected().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_classifies_transport_error() {
        let message = TestMessage::new("sender@example.org", "hello@example.com")
            .failing_forward("destination not verified");

        let outcome = deliver(&message, "you@inbox.example.net").await;
        match outcome {
            DeliveryOutcome::Failed(reason) => assert!(reason.contains("destination not verified")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(message.forwarded().is_empty());
    }
}
