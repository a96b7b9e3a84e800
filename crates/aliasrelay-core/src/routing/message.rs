//! Inbound message capability set

use aliasrelay_common::Result;
use async_trait::async_trait;

/// A message handed to the router by a transport.
///
/// Transport adapters implement this; the router only ever calls
/// `forward` at most once and `reject` at most once, never both after a
/// successful forward.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    /// Envelope sender, empty for the null reverse-path
    fn from(&self) -> &str;

    /// Envelope recipient
    fn to(&self) -> &str;

    /// Size of the raw message in bytes
    fn raw_size(&self) -> u64;

    fn message_id(&self) -> &str;

    /// Hand the message to the transport for delivery to `destination`
    async fn forward(&self, destination: &str) -> Result<()>;

    /// Refuse the message with an SMTP reply code and reason
    async fn reject(&self, code: u16, reason: &str);
}
