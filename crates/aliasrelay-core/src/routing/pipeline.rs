//! Decision pipeline
//!
//! Drives one inbound message through normalization, resolution, loop
//! checking and delivery, then records the decision. Every message ends in
//! exactly one successful `forward` or one `reject`, followed by exactly one
//! audit record. A panic inside any stage is caught and ends as an internal
//! error reject.

use super::address::normalize;
use super::audit::AuditLogger;
use super::delivery::{deliver, DeliveryOutcome};
use super::error::RoutingError;
use super::loop_guard::check_loop;
use super::resolver::{resolve, RoutingDecision};
use super::InboundMessage;
use aliasrelay_common::{RouteKind, RouteResult};
use aliasrelay_storage::{AliasRepository, RoutingLogEntry, RoutingLogRepository};
use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, trace};

/// Pipeline stages, in the order a message passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Normalizing,
    Resolving,
    LoopChecking,
    Delivering,
    Logging,
    Terminal,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Received => write!(f, "received"),
            Stage::Normalizing => write!(f, "normalizing"),
            Stage::Resolving => write!(f, "resolving"),
            Stage::LoopChecking => write!(f, "loop_checking"),
            Stage::Delivering => write!(f, "delivering"),
            Stage::Logging => write!(f, "logging"),
            Stage::Terminal => write!(f, "terminal"),
        }
    }
}

/// Terminal result of routing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingOutcome {
    pub result: RouteResult,
    /// Route kind, `None` when resolution never completed
    pub route: RouteKind,
    pub base_address: Option<String>,
    pub destination: Option<String>,
    /// Why the message was not forwarded
    pub error: Option<RoutingError>,
}

impl RoutingOutcome {
    fn new(decision: Option<&RoutingDecision>, error: Option<RoutingError>) -> Self {
        Self {
            result: error
                .as_ref()
                .map(RoutingError::result)
                .unwrap_or(RouteResult::Forwarded),
            route: decision
                .map(RoutingDecision::route_kind)
                .unwrap_or(RouteKind::None),
            base_address: decision.and_then(|d| d.base_address()).map(str::to_string),
            destination: decision.and_then(|d| d.destination()).map(str::to_string),
            error,
        }
    }

    pub fn is_forwarded(&self) -> bool {
        self.result == RouteResult::Forwarded
    }
}

/// Routes inbound messages for a single worker domain
pub struct DecisionPipeline {
    worker_domain: String,
    aliases: Arc<dyn AliasRepository>,
    audit: AuditLogger,
}

impl DecisionPipeline {
    pub fn new(
        worker_domain: &str,
        aliases: Arc<dyn AliasRepository>,
        logs: Arc<dyn RoutingLogRepository>,
    ) -> Self {
        Self {
            worker_domain: worker_domain.trim().to_lowercase(),
            aliases,
            audit: AuditLogger::new(logs),
        }
    }

    pub fn worker_domain(&self) -> &str {
        &self.worker_domain
    }

    /// Route one message to its terminal outcome.
    ///
    /// Never fails: lookup errors and panics become an `Internal` reject.
    /// The routing log write is detached, so a slow or failing log backend
    /// never delays the reply.
    pub async fn process(&self, message: &dyn InboundMessage) -> RoutingOutcome {
        enter(message, Stage::Received);

        let mut decision = None;
        let routed = AssertUnwindSafe(self.route(message, &mut decision))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let detail = panic_detail(payload.as_ref());
                error!(
                    message_id = %message.message_id(),
                    panic = %detail,
                    "Routing panicked"
                );
                Err(RoutingError::Internal { detail })
            });

        if let Err(err) = &routed {
            message.reject(err.code(), &err.reason()).await;
        }

        let outcome = RoutingOutcome::new(decision.as_ref(), routed.err());

        enter(message, Stage::Logging);
        self.audit.record(log_entry(message, &outcome));

        enter(message, Stage::Terminal);
        outcome
    }

    async fn route(
        &self,
        message: &dyn InboundMessage,
        decision: &mut Option<RoutingDecision>,
    ) -> Result<(), RoutingError> {
        enter(message, Stage::Normalizing);
        let recipient = normalize(message.to());

        enter(message, Stage::Resolving);
        let resolved = resolve(&recipient, &self.worker_domain, self.aliases.as_ref())
            .await
            .map_err(|e| RoutingError::Internal {
                detail: format!("{} failed: {}", Stage::Resolving, e),
            })?;

        let destination = match decision.insert(resolved) {
            RoutingDecision::InvalidDomain => return Err(RoutingError::InvalidDomain),
            RoutingDecision::None => return Err(RoutingError::NoMatch),
            RoutingDecision::Exact { destination }
            | RoutingDecision::BaseTag { destination, .. } => destination.clone(),
        };

        enter(message, Stage::LoopChecking);
        if check_loop(&destination, &self.worker_domain) {
            return Err(RoutingError::RoutingLoop);
        }

        enter(message, Stage::Delivering);
        match deliver(message, &destination).await {
            DeliveryOutcome::Forwarded => Ok(()),
            DeliveryOutcome::Failed(detail) => Err(RoutingError::DeliveryFailed { detail }),
        }
    }
}

fn enter(message: &dyn InboundMessage, stage: Stage) {
    trace!(message_id = %message.message_id(), stage = %stage, "Routing stage");
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("panicked: {}", text)
}

fn log_entry(message: &dyn InboundMessage, outcome: &RoutingOutcome) -> RoutingLogEntry {
    RoutingLogEntry {
        timestamp: Utc::now().timestamp(),
        message_id: message.message_id().to_string(),
        from_addr: normalize(message.from()).full,
        to_addr: normalize(message.to()).full,
        route: outcome.route,
        base_addr: outcome.base_address.clone(),
        dest_addr: outcome.destination.clone(),
        result: outcome.result,
        size_bytes: i64::try_from(message.raw_size()).unwrap_or(i64::MAX),
        error: outcome.error.as_ref().map(RoutingError::log_message),
    }
}
