use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use crate::config::Config;
use crate::firewall::RuleTable;
use crate::handler::{ConnectionHandler, DiscardHandler};
use crate::listener::Gate;

use super::shutdown::Shutdown;

/// Main tcpgated server
///
/// Components:
/// - Rule table: built once from config, immutable afterwards
/// - Gate: accept loop dispatching admitted connections to tasks
/// - Shutdown: graceful drain with configurable timeout
pub struct Server {
    /// Configuration
    config: Arc<Config>,

    /// Shutdown handle
    shutdown: Arc<Shutdown>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: Shutdown::new(),
        }
    }

    /// Run the server until shutdown
    pub async fn run(self) -> Result<()> {
        let table = Arc::new(
            RuleTable::from_config(&self.config.firewall)
                .context("invalid firewall configuration")?,
        );

        let handler: Arc<dyn ConnectionHandler> = Arc::new(DiscardHandler);

        // Bind failure is fatal; the gate never enters the accept loop
        let gate = Arc::new(
            Gate::bind(
                &self.config.listener,
                table.clone(),
                handler,
                self.shutdown.clone(),
            )
            .await
            .with_context(|| {
                format!(
                    "failed to bind listener on {}",
                    self.config.listener.address
                )
            })?,
        );

        info!(
            listener = %gate.name(),
            address = %gate.local_addr(),
            rules = table.len(),
            max_connections = self.config.listener.limits.max_connections,
            drain_timeout_secs = self.config.settings.shutdown.drain_timeout.as_secs(),
            "tcpgated server started"
        );

        let gate_handle = tokio::spawn(gate.clone().run());

        // Wait for shutdown signal
        self.wait_for_shutdown().await;

        info!("shutdown signal received, starting graceful shutdown");

        self.shutdown.start_drain();

        // Wait for drain or timeout
        let drain_timeout = self.config.settings.shutdown.drain_timeout;
        let drained = tokio::time::timeout(drain_timeout, self.shutdown.terminated()).await;

        if drained.is_err() {
            warn!(
                active_connections = self.shutdown.active_connections(),
                "drain timeout reached, forcing shutdown"
            );
        }

        self.shutdown.terminate();

        gate_handle.await??;

        let stats = table.stats();
        info!(
            admitted = gate.admitted(),
            denied = gate.denied(),
            default_denials = stats.default_denials,
            "connection summary"
        );

        info!("tcpgated server stopped");

        Ok(())
    }

    /// Wait for shutdown signal (SIGINT or SIGTERM)
    async fn wait_for_shutdown(&self) {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("received SIGTERM");
            }
        }
    }

    /// Get shutdown handle
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }
}
