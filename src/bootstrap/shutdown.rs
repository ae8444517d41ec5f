use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shutdown states:
/// 1. Running - normal operation
/// 2. Draining - stop accepting new connections, drain existing
/// 3. Terminated - all connections closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Draining,
    Terminated,
}

/// Manages graceful shutdown with a drain period.
pub struct Shutdown {
    /// Current state
    state: watch::Sender<State>,

    /// Active admitted connection count
    active_connections: AtomicU64,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        let (state, _) = watch::channel(State::Running);

        Arc::new(Self {
            state,
            active_connections: AtomicU64::new(0),
        })
    }

    /// Get current state
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Start draining (called on SIGTERM/SIGINT)
    pub fn start_drain(&self) {
        if self.state() != State::Running {
            return;
        }

        let active = self.active_connections.load(Ordering::SeqCst);
        info!(active_connections = active, "starting graceful shutdown drain");

        let _ = self.state.send(State::Draining);

        // Nothing in flight, nothing to wait for
        if active == 0 {
            self.terminate();
        }
    }

    /// Complete shutdown
    pub fn terminate(&self) {
        if self.state() == State::Terminated {
            return;
        }

        let active = self.active_connections.load(Ordering::SeqCst);
        if active > 0 {
            warn!(
                active_connections = active,
                "terminating with active connections"
            );
        }

        let _ = self.state.send(State::Terminated);
    }

    /// Wait until the Terminated state is reached.
    pub async fn terminated(&self) {
        let mut rx = self.subscribe();
        loop {
            if *rx.borrow() == State::Terminated {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Register a new connection; refused during drain
    pub fn connection_opened(&self) -> bool {
        if self.state() != State::Running {
            return false;
        }

        self.active_connections.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Unregister a connection
    pub fn connection_closed(&self) {
        let prev = self.active_connections.fetch_sub(1, Ordering::SeqCst);

        // Last in-flight connection while draining completes the shutdown
        if self.state() == State::Draining && prev == 1 {
            self.terminate();
        }
    }

    /// Get active connection count
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Check if accepting new connections
    pub fn is_accepting(&self) -> bool {
        self.state() == State::Running
    }
}
