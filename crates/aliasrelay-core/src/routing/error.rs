//! Routing failure taxonomy

use aliasrelay_common::types::REJECT_CODE;
use aliasrelay_common::RouteResult;
use thiserror::Error;

/// Why a message was not forwarded.
///
/// Every variant is surfaced to the transport as a `550` reject carrying the
/// variant's fixed reason text. `detail` is only ever written to the logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("recipient domain does not match worker domain")]
    InvalidDomain,

    #[error("forward_to is within worker's own domain")]
    RoutingLoop,

    #[error("no matching alias or plus-base alias found")]
    NoMatch,

    #[error("destination not verified / transport failure")]
    DeliveryFailed { detail: String },

    #[error("internal error")]
    Internal { detail: String },
}

impl RoutingError {
    /// SMTP reply code sent with the reject
    pub fn code(&self) -> u16 {
        REJECT_CODE
    }

    /// RFC 3463 enhanced status code sent ahead of the reason
    pub fn enhanced_status(&self) -> &'static str {
        match self {
            RoutingError::InvalidDomain => "5.1.2",
            RoutingError::NoMatch => "5.1.1",
            RoutingError::RoutingLoop => "5.4.6",
            RoutingError::DeliveryFailed { .. } => "5.4.4",
            RoutingError::Internal { .. } => "5.3.0",
        }
    }

    /// Fixed, externally visible reason text
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Result recorded for this failure in the routing log
    pub fn result(&self) -> RouteResult {
        match self {
            RoutingError::InvalidDomain | RoutingError::RoutingLoop | RoutingError::NoMatch => {
                RouteResult::Rejected
            }
            RoutingError::DeliveryFailed { .. } | RoutingError::Internal { .. } => {
                RouteResult::Error
            }
        }
    }

    /// Text for the `error` column: the reason, plus the cause when there is one
    pub fn log_message(&self) -> String {
        match self {
            RoutingError::DeliveryFailed { detail } | RoutingError::Internal { detail }
                if !detail.is_empty() =>
            {
                format!("{}: {}", self, detail)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failures_use_reject_code() {
        let errors = [
            RoutingError::InvalidDomain,
            RoutingError::RoutingLoop,
            RoutingError::NoMatch,
            RoutingError::DeliveryFailed {
                detail: "x".to_string(),
            },
            RoutingError::Internal {
                detail: "y".to_string(),
            },
        ];

        for err in &errors {
            assert_eq!(err.code(), 550);
        }
    }

    #[test]
    fn test_result_classification() {
        assert_eq!(RoutingError::InvalidDomain.result(), RouteResult::Rejected);
        assert_eq!(RoutingError::RoutingLoop.result(), RouteResult::Rejected);
        assert_eq!(RoutingError::NoMatch.result(), RouteResult::Rejected);
        assert_eq!(
            RoutingError::DeliveryFailed {
                detail: String::new()
            }
            .result(),
            RouteResult::Error
        );
    }

    #[test]
    fn test_enhanced_status_per_failure_class() {
        let cases = [
            (RoutingError::InvalidDomain, "5.1.2"),
            (RoutingError::NoMatch, "5.1.1"),
            (RoutingError::RoutingLoop, "5.4.6"),
            (
                RoutingError::DeliveryFailed {
                    detail: String::new(),
                },
                "5.4.4",
            ),
            (
                RoutingError::Internal {
                    detail: String::new(),
                },
                "5.3.0",
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.enhanced_status(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_reason_hides_detail() {
        let err = RoutingError::Internal {
            detail: "Database error: connection reset".to_string(),
        };
        assert_eq!(err.reason(), "internal error");
        assert_eq!(
            err.log_message(),
            "internal error: Database error: connection reset"
        );
        assert_eq!(
            RoutingError::NoMatch.log_message(),
            "no matching alias or plus-base alias found"
        );
    }
}
