//! Alias resolution
//!
//! Resolution order is fixed: an exact alias always wins, and only when no
//! exact alias exists is the plus-tag stripped to look for a base alias that
//! opted in with `allow_plus`.

use super::address::NormalizedAddress;
use aliasrelay_common::{Result, RouteKind};
use aliasrelay_storage::AliasRepository;
use tracing::debug;

/// Outcome of resolving one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// The recipient itself is an alias
    Exact { destination: String },
    /// `local+tag@domain` matched the base alias `local@domain`
    BaseTag {
        base_address: String,
        destination: String,
    },
    /// No alias applies
    None,
    /// The recipient is not in the worker's domain
    InvalidDomain,
}

impl RoutingDecision {
    pub fn route_kind(&self) -> RouteKind {
        match self {
            RoutingDecision::Exact { .. } => RouteKind::Exact,
            RoutingDecision::BaseTag { .. } => RouteKind::BaseTag,
            RoutingDecision::None => RouteKind::None,
            RoutingDecision::InvalidDomain => RouteKind::InvalidDomain,
        }
    }

    /// Forward target, for `Exact` and `BaseTag` only
    pub fn destination(&self) -> Option<&str> {
        match self {
            RoutingDecision::Exact { destination }
            | RoutingDecision::BaseTag { destination, .. } => Some(destination.as_str()),
            RoutingDecision::None | RoutingDecision::InvalidDomain => None,
        }
    }

    /// Matched base alias, for `BaseTag` only
    pub fn base_address(&self) -> Option<&str> {
        match self {
            RoutingDecision::BaseTag { base_address, .. } => Some(base_address.as_str()),
            _ => None,
        }
    }
}

/// Resolve a normalized recipient against the alias store.
///
/// A recipient outside `worker_domain` is classified without touching the
/// store. Otherwise at most two lookups are made: the full address, then the
/// base address formed by cutting the local part at its first `+`.
pub async fn resolve(
    recipient: &NormalizedAddress,
    worker_domain: &str,
    store: &dyn AliasRepository,
) -> Result<RoutingDecision> {
    if !recipient.is_valid() || recipient.domain != worker_domain {
        debug!(
            recipient = %recipient.full,
            worker_domain = %worker_domain,
            "Recipient outside worker domain"
        );
        return Ok(RoutingDecision::InvalidDomain);
    }

    if let Some(alias) = store.lookup_exact(&recipient.full).await? {
        return Ok(RoutingDecision::Exact {
            destination: alias.forward_to,
        });
    }

    // user+a+b@domain uses "user" as the base
    if let Some((base_local, _tag)) = recipient.local.split_once('+') {
        if base_local.is_empty() {
            return Ok(RoutingDecision::None);
        }

        let base_address = format!("{}@{}", base_local, recipient.domain);
        match store.lookup_exact(&base_address).await? {
            Some(alias) if alias.allow_plus => {
                return Ok(RoutingDecision::BaseTag {
                    base_address,
                    destination: alias.forward_to,
                });
            }
            Some(_) => {
                debug!(base = %base_address, "Base alias does not allow plus addressing");
            }
            None => {}
        }
    }

    Ok(RoutingDecision::None)
}
