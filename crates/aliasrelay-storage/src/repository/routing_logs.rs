//! Routing log repository

use crate::db::DatabasePool;
use crate::models::RoutingLogEntry;
use async_trait::async_trait;
use aliasrelay_common::{Error, Result};

/// Append-only sink for routing decisions
#[async_trait]
pub trait RoutingLogRepository: Send + Sync {
    async fn append(&self, entry: &RoutingLogEntry) -> Result<()>;
}

/// Database routing log repository
pub struct DbRoutingLogRepository {
    pool: DatabasePool,
}

impl DbRoutingLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoutingLogRepository for DbRoutingLogRepository {
    async fn append(&self, entry: &RoutingLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO routing_logs
                (timestamp, message_id, from_addr, to_addr, route,
                 base_addr, dest_addr, result, size_bytes, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.timestamp)
        .bind(&entry.message_id)
        .bind(&entry.from_addr)
        .bind(&entry.to_addr)
        .bind(entry.route.as_str())
        .bind(&entry.base_addr)
        .bind(&entry.dest_addr)
        .bind(entry.result.as_str())
        .bind(entry.size_bytes)
        .bind(&entry.error)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}
