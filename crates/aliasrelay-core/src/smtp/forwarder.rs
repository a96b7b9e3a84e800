//! Outbound forwarding through an upstream relay

use aliasrelay_common::config::RelayConfig;
use aliasrelay_common::{Error, Result};
use async_trait::async_trait;
use lettre::address::{Address, Envelope};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info};

/// Sends a received message on to its resolved destination
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Relay `raw` unchanged. `sender` is `None` for the null reverse-path.
    async fn forward(&self, sender: Option<&str>, destination: &str, raw: &[u8]) -> Result<()>;
}

/// Forwarder backed by a lettre SMTP transport
pub struct RelayForwarder {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    verified_destinations: Vec<String>,
}

impl RelayForwarder {
    /// Build the relay transport. No connection is made until the first send.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let builder = match config.security.as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| Error::Config(format!("Invalid relay host: {}", e)))?,
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| Error::Config(format!("Invalid relay host: {}", e)))?,
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            other => {
                return Err(Error::Config(format!(
                    "Unsupported relay security mode: {}",
                    other
                )))
            }
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            security = %config.security,
            "Relay transport configured"
        );

        Ok(Self {
            transport: builder.build(),
            verified_destinations: config.verified_destinations.clone(),
        })
    }

    fn is_verified(&self, destination: &str) -> bool {
        self.verified_destinations.is_empty()
            || self
                .verified_destinations
                .iter()
                .any(|d| d.eq_ignore_ascii_case(destination.trim()))
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| Error::Delivery(format!("invalid address {}: {}", raw, e)))
}

#[async_trait]
impl Forwarder for RelayForwarder {
    async fn forward(&self, sender: Option<&str>, destination: &str, raw: &[u8]) -> Result<()> {
        if !self.is_verified(destination) {
            return Err(Error::Delivery(format!(
                "destination not verified: {}",
                destination
            )));
        }

        let from = sender.map(parse_address).transpose()?;
        let envelope = Envelope::new(from, vec![parse_address(destination)?])
            .map_err(|e| Error::Delivery(e.to_string()))?;

        self.transport
            .send_raw(&envelope, raw)
            .await
            .map_err(|e| Error::Delivery(e.to_string()))?;

        debug!(destination = %destination, size = raw.len(), "Relayed message");
        Ok(())
    }
}
