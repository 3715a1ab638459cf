//! Shutdown coordination for the server.
//!
//! A [`ServerHandle`] is the coordinator's side of a running server: it moves
//! the server through `Serving → Draining → Closed` and waits for the serving
//! side to catch up. The serving side only ever holds a [`ShutdownWatch`],
//! which observes the phase and reports listener state back.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::net::ConnectionTracker;

/// Where the server is in its shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting and serving connections.
    Serving,
    /// No new connections; in-flight requests are finishing.
    Draining,
    /// Listener and every connection are closed.
    Closed,
}

/// State of the listening socket, as reported by the serving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not bound yet.
    Pending,
    /// Bound and accepting.
    Listening(SocketAddr),
    /// Socket released (or never bound).
    Stopped,
}

/// Graceful shutdown did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrainError {
    #[error("drain deadline of {deadline:?} elapsed with {active} connection(s) still active")]
    DeadlineElapsed { deadline: Duration, active: u64 },

    #[error("graceful shutdown requested while server is {0:?}")]
    NotServing(Phase),
}

/// Forced close did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseError {
    #[error("server is already closed")]
    AlreadyClosed,
}

struct Shared {
    phase: watch::Sender<Phase>,
    listener: watch::Sender<ListenerState>,
    connections: ConnectionTracker,
    drain_requests: AtomicUsize,
}

/// Owner-side handle that shuts a server down.
///
/// Not clonable: exactly one owner drives shutdown.
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl ServerHandle {
    /// Create a handle together with the watch given to the serving side.
    pub fn new() -> (Self, ShutdownWatch) {
        let (phase, _) = watch::channel(Phase::Serving);
        let (listener, _) = watch::channel(ListenerState::Pending);
        let shared = Arc::new(Shared {
            phase,
            listener,
            connections: ConnectionTracker::new(),
            drain_requests: AtomicUsize::new(0),
        });

        let watch = ShutdownWatch {
            phase: shared.phase.subscribe(),
            shared: Arc::clone(&shared),
        };
        (Self { shared }, watch)
    }

    /// Read-only view for observers (tests, status reporting).
    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop accepting and wait up to `deadline` for active connections to finish.
    ///
    /// Only valid from [`Phase::Serving`]. On success the server is
    /// [`Phase::Closed`]; on a deadline miss it stays [`Phase::Draining`] so
    /// the caller can fall back to [`ServerHandle::force_close`].
    pub async fn graceful_shutdown(&self, deadline: Duration) -> Result<(), DrainError> {
        self.shared.drain_requests.fetch_add(1, Ordering::SeqCst);

        let mut previous = Phase::Serving;
        let started = self.shared.phase.send_if_modified(|phase| {
            previous = *phase;
            if *phase == Phase::Serving {
                *phase = Phase::Draining;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(DrainError::NotServing(previous));
        }

        match tokio::time::timeout(deadline, self.wait_released()).await {
            Ok(()) => {
                self.shared.phase.send_replace(Phase::Closed);
                Ok(())
            }
            Err(_) => Err(DrainError::DeadlineElapsed {
                deadline,
                active: self.shared.connections.active_count(),
            }),
        }
    }

    /// Close the listener and drop every connection without waiting for requests.
    pub async fn force_close(&self) -> Result<(), CloseError> {
        let previous = self.shared.phase.send_replace(Phase::Closed);
        if previous == Phase::Closed {
            return Err(CloseError::AlreadyClosed);
        }

        // Connection tasks react to `Closed` by dropping their socket, so
        // this resolves without waiting on peers.
        self.wait_released().await;
        Ok(())
    }

    /// Wait until the listener socket is gone and no connection is active.
    async fn wait_released(&self) {
        let mut listener = self.shared.listener.subscribe();
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = listener
            .wait_for(|state| *state == ListenerState::Stopped)
            .await;
        self.shared.connections.wait_idle().await;
    }
}

/// Serving-side view of shutdown state.
#[derive(Clone)]
pub struct ShutdownWatch {
    phase: watch::Receiver<Phase>,
    shared: Arc<Shared>,
}

impl ShutdownWatch {
    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Resolves once the server has left [`Phase::Serving`].
    pub async fn draining(&mut self) {
        let _ = self.phase.wait_for(|phase| *phase != Phase::Serving).await;
    }

    /// Resolves once the server is [`Phase::Closed`].
    pub async fn closed(&mut self) {
        let _ = self.phase.wait_for(|phase| *phase == Phase::Closed).await;
    }

    /// Connection tracker shared with the handle.
    pub fn connections(&self) -> &ConnectionTracker {
        &self.shared.connections
    }

    /// Report that the listener is bound at `addr`.
    pub fn mark_listening(&self, addr: SocketAddr) {
        self.shared.listener.send_replace(ListenerState::Listening(addr));
    }

    /// Report that the listener socket has been released.
    pub fn mark_stopped(&self) {
        self.shared.listener.send_replace(ListenerState::Stopped);
    }
}

/// Read-only view of a server's shutdown state.
#[derive(Clone)]
pub struct ServerStatus {
    shared: Arc<Shared>,
}

impl ServerStatus {
    pub fn phase(&self) -> Phase {
        *self.shared.phase.borrow()
    }

    pub fn listener(&self) -> ListenerState {
        *self.shared.listener.borrow()
    }

    pub fn active_connections(&self) -> u64 {
        self.shared.connections.active_count()
    }

    /// Number of times graceful shutdown was requested, accepted or not.
    pub fn drain_requests(&self) -> usize {
        self.shared.drain_requests.load(Ordering::SeqCst)
    }

    /// Wait until the listener is bound, returning its address.
    ///
    /// Returns `None` if the listener stopped without ever binding.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.shared.listener.subscribe();
        let state = rx
            .wait_for(|state| *state != ListenerState::Pending)
            .await
            .ok()
            .map(|state| *state)?;
        match state {
            ListenerState::Listening(addr) => Some(addr),
            _ => None,
        }
    }
}
