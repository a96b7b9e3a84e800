//! Alias routing
//!
//! Turns an inbound message into exactly one terminal outcome: forwarded to
//! the alias destination, or rejected with a fixed reason.

mod address;
mod audit;
mod delivery;
mod error;
mod loop_guard;
mod message;
mod pipeline;
mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use address::{normalize, NormalizedAddress};
pub use audit::{AuditLogger, AUDIT_TARGET};
pub use delivery::{deliver, DeliveryOutcome};
pub use error::RoutingError;
pub use loop_guard::check_loop;
pub use message::InboundMessage;
pub use pipeline::{DecisionPipeline, RoutingOutcome, Stage};
pub use resolver::{resolve, RoutingDecision};
