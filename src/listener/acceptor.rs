//! TCP acceptor for inbound connections.
//!
//! The accept loop does only cheap work: accept, evaluate the peer
//! against the rule table, then either drop the socket (deny) or spawn
//! a handler task (admit). Downstream handling never blocks the loop.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::bootstrap::Shutdown;
use crate::config::ListenerConfig;
use crate::firewall::RuleTable;
use crate::handler::ConnectionHandler;

use super::connection::{Connection, ConnectionId};

/// Listener that gates inbound connections on the rule table.
pub struct Gate {
    /// Listener name (for logging)
    name: String,

    /// Bound local address
    local_addr: SocketAddr,

    /// Listening socket (taken by the accept loop)
    listener: Mutex<Option<TcpListener>>,

    /// Admission rules
    table: Arc<RuleTable>,

    /// Downstream handler for admitted connections
    handler: Arc<dyn ConnectionHandler>,

    /// Connection semaphore (limits concurrent admitted connections)
    connection_limit: Arc<Semaphore>,

    /// Connection ID generator
    next_connection_id: AtomicU64,

    /// Active admitted connections
    connections: Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>,

    /// Shutdown handle
    shutdown: Arc<Shutdown>,

    /// Admitted connection count
    admitted: AtomicU64,

    /// Denied connection count
    denied: AtomicU64,
}

impl Gate {
    /// Bind the listening socket.
    ///
    /// Bind failure is the one fatal error in the gate's lifecycle; it
    /// surfaces here, before the accept loop ever starts.
    pub async fn bind(
        config: &ListenerConfig,
        table: Arc<RuleTable>,
        handler: Arc<dyn ConnectionHandler>,
        shutdown: Arc<Shutdown>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            name: config.name.clone(),
            local_addr,
            listener: Mutex::new(Some(listener)),
            table,
            handler,
            connection_limit: Arc::new(Semaphore::new(config.limits.max_connections)),
            next_connection_id: AtomicU64::new(1),
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
            admitted: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        })
    }

    /// Get listener name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Total admitted connections.
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Total denied connections.
    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    /// Run the accept loop until shutdown.
    pub async fn run(self: Arc<Self>) -> io::Result<()> {
        let listener = match self.listener.lock().await.take() {
            Some(listener) => listener,
            None => return Ok(()),
        };

        info!(
            listener = %self.name,
            address = %self.local_addr,
            rules = self.table.len(),
            max_connections = self.connection_limit.available_permits(),
            "listener started"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            // Re-checked every iteration; covers a drain that started
            // before this loop subscribed
            if !self.shutdown.is_accepting() {
                info!(listener = %self.name, "listener shutting down");
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            self.clone().handle_accept(stream, peer_addr).await;
                        }
                        Err(e) => {
                            error!(
                                listener = %self.name,
                                error = %e,
                                "accept error"
                            );
                        }
                    }
                }
            }
        }

        // Release the bound port before draining
        drop(listener);

        self.drain_connections().await;

        info!(listener = %self.name, "listener stopped");
        Ok(())
    }

    /// Handle an accepted connection.
    async fn handle_accept(self: Arc<Self>, stream: TcpStream, peer_addr: SocketAddr) {
        // Evaluate before anything else; a denied peer never holds a permit
        let verdict = self.table.verdict_for(peer_addr);

        if !verdict.is_allow() {
            info!(
                listener = %self.name,
                peer = %peer_addr,
                verdict = "deny",
                "connection denied"
            );
            self.denied.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let permit = match self.connection_limit.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    listener = %self.name,
                    peer = %peer_addr,
                    "connection limit reached, rejecting"
                );
                return;
            }
        };

        if !self.shutdown.connection_opened() {
            debug!(
                listener = %self.name,
                peer = %peer_addr,
                "draining, rejecting connection"
            );
            return;
        }

        let conn_id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::SeqCst));

        let span = span!(
            Level::INFO,
            "conn",
            listener = %self.name,
            id = %conn_id,
            peer = %peer_addr
        );

        if let Err(e) = configure_socket(&stream) {
            error!(parent: &span, error = %e, "socket configuration failed");
            self.shutdown.connection_closed();
            return;
        }

        info!(
            listener = %self.name,
            id = %conn_id,
            peer = %peer_addr,
            verdict = "allow",
            "connection admitted"
        );
        self.admitted.fetch_add(1, Ordering::Relaxed);

        let connection = Arc::new(Connection::new(
            conn_id,
            self.name.clone(),
            peer_addr,
            stream,
            permit,
        ));

        {
            let mut connections = self.connections.write().await;
            connections.insert(conn_id, connection.clone());
        }

        // Dispatch to an independent task; the accept loop never waits on
        // downstream handling
        let gate = self.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = gate.shutdown.terminated() => {
                        debug!("connection released at termination");
                    }
                    result = gate.handler.handle(connection.clone()) => {
                        if let Err(e) = result {
                            debug!(error = %e, "handler ended with error");
                        }
                    }
                }

                connection.initiate_close().await;

                {
                    let mut connections = gate.connections.write().await;
                    connections.remove(&conn_id);
                }

                gate.shutdown.connection_closed();
            }
            .instrument(span),
        );
    }

    /// Ask all active connections to close.
    async fn drain_connections(&self) {
        let connections: Vec<Arc<Connection>> = {
            let conns = self.connections.read().await;
            conns.values().cloned().collect()
        };

        if connections.is_empty() {
            return;
        }

        info!(
            listener = %self.name,
            count = connections.len(),
            "draining connections"
        );

        for conn in connections {
            conn.initiate_close().await;
        }
    }
}

/// Configure TCP socket options.
fn configure_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    Ok(())
}
