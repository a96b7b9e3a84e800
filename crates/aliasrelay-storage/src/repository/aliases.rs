//! Alias repository

use crate::db::DatabasePool;
use crate::models::Alias;
use async_trait::async_trait;
use aliasrelay_common::{Error, Result};
use tracing::debug;

/// Alias store consumed by the router
#[async_trait]
pub trait AliasRepository: Send + Sync {
    /// Look up an alias by its full address, ignoring case
    async fn lookup_exact(&self, address: &str) -> Result<Option<Alias>>;
}

/// Database alias repository
pub struct DbAliasRepository {
    pool: DatabasePool,
}

impl DbAliasRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AliasRepository for DbAliasRepository {
    async fn lookup_exact(&self, address: &str) -> Result<Option<Alias>> {
        debug!(address = %address, "Looking up alias");

        sqlx::query_as::<_, Alias>(
            r#"
            SELECT address, forward_to, allow_plus, notes, created_at
            FROM aliases
            WHERE lower(address) = lower($1)
            "#,
        )
        .bind(address)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
