//! SMTP server implementation

use super::{Forwarder, SmtpHandler};
use crate::routing::DecisionPipeline;
use aliasrelay_common::config::{Config, SmtpConfig};
use anyhow::Result;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

const TOO_MANY_CONNECTIONS: &[u8] = b"421 4.3.2 Too many connections, try again later\r\n";

/// SMTP Server
pub struct SmtpServer {
    hostname: String,
    config: SmtpConfig,
    pipeline: Arc<DecisionPipeline>,
    forwarder: Arc<dyn Forwarder>,
    connection_semaphore: Arc<Semaphore>,
}

impl SmtpServer {
    /// Create a new SMTP server
    pub fn new(
        config: &Config,
        pipeline: Arc<DecisionPipeline>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            hostname: config.server.hostname.clone(),
            config: config.smtp.clone(),
            pipeline,
            forwarder,
            connection_semaphore: Arc::new(Semaphore::new(config.smtp.max_connections)),
        }
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(
            "SMTP server listening on {} (worker domain {})",
            addr,
            self.pipeline.worker_domain()
        );
        Ok(listener)
    }

    /// Bind and serve until the task is cancelled
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept sessions on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((mut stream, peer_addr)) => {
                    let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!("Max connections reached, rejecting {}", peer_addr);
                            tokio::spawn(async move {
                                let _ = stream.write_all(TOO_MANY_CONNECTIONS).await;
                            });
                            continue;
                        }
                    };

                    let handler = SmtpHandler::new(
                        self.hostname.clone(),
                        self.config.clone(),
                        self.pipeline.clone(),
                        self.forwarder.clone(),
                        peer_addr,
                    );

                    tokio::spawn(async move {
                        if let Err(e) = handler.handle(stream).await {
                            error!("SMTP session error from {}: {}", peer_addr, e);
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
