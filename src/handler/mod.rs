//! Downstream handoff for admitted connections.
//!
//! The gate itself never reads or writes application data; every admitted
//! connection is handed to a [`ConnectionHandler`]. Relaying, proxying,
//! and application protocols live behind this trait.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::listener::Connection;

/// Handler an admitted connection is dispatched to.
///
/// Runs on its own task; a slow handler never blocks the accept loop.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    async fn handle(&self, conn: Arc<Connection>) -> io::Result<()>;
}

/// Default handler: holds the connection open and discards inbound bytes
/// until the peer closes.
#[derive(Debug, Default)]
pub struct DiscardHandler;

#[async_trait]
impl ConnectionHandler for DiscardHandler {
    async fn handle(&self, conn: Arc<Connection>) -> io::Result<()> {
        let Some(mut stream) = conn.take_stream().await else {
            return Ok(());
        };

        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    debug!(id = %conn.id(), "peer closed connection");
                    return Ok(());
                }
                Ok(n) => {
                    debug!(id = %conn.id(), bytes = n, "discarded");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
