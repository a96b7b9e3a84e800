//! Common types for AliasRelay

use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds
pub type UnixSeconds = i64;

/// SMTP reply code used for every rejection produced by the router
pub const REJECT_CODE: u16 = 550;

/// How (or whether) a recipient was resolved to a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Exact,
    BaseTag,
    None,
    InvalidDomain,
}

impl RouteKind {
    /// Stable string form, as stored in the routing log
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Exact => "exact",
            RouteKind::BaseTag => "base_tag",
            RouteKind::None => "none",
            RouteKind::InvalidDomain => "invalid_domain",
        }
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RouteKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(RouteKind::Exact),
            "base_tag" => Ok(RouteKind::BaseTag),
            "none" => Ok(RouteKind::None),
            "invalid_domain" => Ok(RouteKind::InvalidDomain),
            other => Err(crate::Error::Validation(format!(
                "Unknown route kind: {}",
                other
            ))),
        }
    }
}

/// Terminal result of routing one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteResult {
    Forwarded,
    Rejected,
    Error,
}

impl RouteResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteResult::Forwarded => "forwarded",
            RouteResult::Rejected => "rejected",
            RouteResult::Error => "error",
        }
    }
}

impl std::fmt::Display for RouteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RouteResult {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forwarded" => Ok(RouteResult::Forwarded),
            "rejected" => Ok(RouteResult::Rejected),
            "error" => Ok(RouteResult::Error),
            other => Err(crate::Error::Validation(format!(
                "Unknown route result: {}",
                other
            ))),
        }
    }
}
