//! Routing audit trail
//!
//! Each routing decision is emitted as a structured event on
//! [`AUDIT_TARGET`] and written to the routing log by a detached task. The
//! caller never waits on the write and never sees its failure.

use aliasrelay_storage::{RoutingLogEntry, RoutingLogRepository};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Tracing target for routing audit events
pub const AUDIT_TARGET: &str = "aliasrelay::audit";

/// Best-effort recorder of routing decisions
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn RoutingLogRepository>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn RoutingLogRepository>) -> Self {
        Self { sink }
    }

    /// Emit the audit event, then hand the durable write to a background
    /// task. Must be called from within a tokio runtime.
    ///
    /// The returned handle may be dropped; the write still runs.
    pub fn record(&self, entry: RoutingLogEntry) -> JoinHandle<()> {
        info!(
            target: AUDIT_TARGET,
            timestamp = entry.timestamp,
            message_id = %entry.message_id,
            from = %entry.from_addr,
            to = %entry.to_addr,
            route = %entry.route,
            base = entry.base_addr.as_deref().unwrap_or(""),
            dest = entry.dest_addr.as_deref().unwrap_or(""),
            result = %entry.result,
            size_bytes = entry.size_bytes,
            error = entry.error.as_deref().unwrap_or(""),
            "routing decision"
        );

        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.append(&entry).await {
                warn!(
                    message_id = %entry.message_id,
                    error = %e,
                    "Failed to write routing log entry"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::testing::MemoryLogSink;
    use aliasrelay_common::{RouteKind, RouteResult};
    use std::time::Duration;

    fn entry() -> RoutingLogEntry {
        RoutingLogEntry {
            timestamp: 1_700_000_000,
            message_id: "<m1@example.org>".to_string(),
            from_addr: "sender@example.org".to_string(),
            to_addr: "hello@example.com".to_string(),
            route: RouteKind::Exact,
            base_addr: None,
            dest_addr: Some("you@inbox.example.net".to_string()),
            result: RouteResult::Forwarded,
            size_bytes: 512,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_record_appends_entry() {
        let sink = Arc::new(MemoryLogSink::new());
        let logger = AuditLogger::new(sink.clone());

        logger.record(entry()).await.unwrap();

        assert_eq!(sink.entries(), vec![entry()]);
    }

    #[tokio::test]
    async fn test_record_swallows_sink_failure() {
        let sink = Arc::new(MemoryLogSink::failing());
        let logger = AuditLogger::new(sink.clone());

        logger.record(entry()).await.unwrap();

        assert_eq!(sink.attempts(), 1);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_record_returns_before_write_completes() {
        let sink = Arc::new(MemoryLogSink::hanging());
        let logger = AuditLogger::new(sink.clone());

        let write = logger.record(entry());

        assert!(!write.is_finished());
        assert_eq!(sink.settled(1).await, Vec::new());
        write.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_write_does_not_block_caller() {
        let logger = AuditLogger::new(Arc::new(MemoryLogSink::hanging()));

        let recorded = tokio::time::timeout(Duration::from_secs(1), async {
            logger.record(entry());
        })
        .await;

        assert!(recorded.is_ok());
    }
}
