//! SMTP transport adapter
//!
//! Receives mail for the worker domain, hands each transaction to the
//! routing pipeline and relays accepted messages upstream.

mod forwarder;
mod handler;
mod inbound;
mod server;

pub use forwarder::{Forwarder, RelayForwarder};
pub use handler::SmtpHandler;
pub use inbound::SmtpInboundMessage;
pub use server::SmtpServer;
