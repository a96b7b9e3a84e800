//! AliasRelay - alias forwarding server entry point

use aliasrelay_common::config::{Config, LoggingConfig};
use aliasrelay_core::{DecisionPipeline, RelayForwarder, SmtpServer};
use aliasrelay_storage::{DatabasePool, DbAliasRepository, DbRoutingLogRepository};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config path as the only argument
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_from(Some(path.as_path()))?,
        None => Config::load()?,
    };

    init_logging(&config.logging);

    info!(
        worker_domain = %config.routing.worker_domain,
        "Starting AliasRelay..."
    );

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    let aliases = Arc::new(DbAliasRepository::new(db_pool.clone()));
    let routing_logs = Arc::new(DbRoutingLogRepository::new(db_pool.clone()));
    let pipeline = Arc::new(DecisionPipeline::new(
        &config.routing.worker_domain,
        aliases,
        routing_logs,
    ));

    let forwarder = Arc::new(RelayForwarder::new(&config.relay)?);
    if config.relay.verified_destinations.is_empty() {
        info!("No verified destination list, forwarding to any destination");
    }

    let smtp_server = Arc::new(SmtpServer::new(&config, pipeline, forwarder));

    let smtp_handle = {
        let smtp_server = smtp_server.clone();
        tokio::spawn(async move {
            if let Err(e) = smtp_server.run().await {
                error!("SMTP server error: {}", e);
            }
        })
    };

    info!("AliasRelay started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    smtp_handle.abort();

    info!("AliasRelay shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
