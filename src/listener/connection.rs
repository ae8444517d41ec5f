//! Admitted connection handling.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedSemaphorePermit};

/// Unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An admitted connection.
///
/// Only connections the rule table admitted become a `Connection`;
/// denied sockets are dropped inside the evaluation step.
pub struct Connection {
    /// Connection ID
    id: ConnectionId,

    /// Listener name this connection came in on
    listener: String,

    /// Peer address
    peer_addr: SocketAddr,

    /// Underlying stream (taken by the handler)
    stream: Mutex<Option<TcpStream>>,

    /// Close flag
    closing: AtomicBool,

    /// Connection permit (released on drop)
    _permit: OwnedSemaphorePermit,

    /// Creation timestamp
    created_at: Instant,
}

impl Connection {
    /// Create a new connection.
    pub fn new(
        id: ConnectionId,
        listener: String,
        peer_addr: SocketAddr,
        stream: TcpStream,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            id,
            listener,
            peer_addr,
            stream: Mutex::new(Some(stream)),
            closing: AtomicBool::new(false),
            _permit: permit,
            created_at: Instant::now(),
        }
    }

    /// Get connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get listener name.
    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Get peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Take the underlying stream (for the handler to use).
    ///
    /// Returns `None` on the second and later calls.
    pub async fn take_stream(&self) -> Option<TcpStream> {
        self.stream.lock().await.take()
    }

    /// Check if connection is closing.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Relaxed)
    }

    /// Mark the connection as closing and drop a still-untaken stream.
    pub async fn initiate_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.stream.lock().await.take();
    }

    /// Get connection uptime.
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("listener", &self.listener)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
