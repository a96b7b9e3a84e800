//! AliasRelay Core - alias routing and SMTP transport
//!
//! This crate provides the routing decision pipeline that maps a recipient
//! on the worker domain to its forwarding destination, and the SMTP adapter
//! that feeds it.

pub mod routing;
pub mod smtp;

pub use routing::{DecisionPipeline, InboundMessage, RoutingError, RoutingOutcome};
pub use smtp::{Forwarder, RelayForwarder, SmtpServer};
