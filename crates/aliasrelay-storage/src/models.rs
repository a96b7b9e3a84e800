//! Database models

use aliasrelay_common::types::UnixSeconds;
use aliasrelay_common::{RouteKind, RouteResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Alias model
///
/// Administered outside the router; read-only from the routing path.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Alias {
    /// Full alias address, unique under case-insensitive comparison
    pub address: String,
    /// Destination address, any domain
    pub forward_to: String,
    /// Whether `local+tag@domain` may match this alias
    pub allow_plus: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alias {
    /// Create an alias with no notes, timestamped now
    pub fn new(
        address: impl Into<String>,
        forward_to: impl Into<String>,
        allow_plus: bool,
    ) -> Self {
        Self {
            address: address.into(),
            forward_to: forward_to.into(),
            allow_plus,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

/// One routing decision, as written to the routing log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingLogEntry {
    pub timestamp: UnixSeconds,
    pub message_id: String,
    pub from_addr: String,
    pub to_addr: String,
    pub route: RouteKind,
    pub base_addr: Option<String>,
    pub dest_addr: Option<String>,
    pub result: RouteResult,
    pub size_bytes: i64,
    pub error: Option<String>,
}
