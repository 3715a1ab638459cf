//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGINT and SIGTERM handlers (Ctrl-C elsewhere)
//! - Forward the first termination signal into a single-slot channel
//! - Log and drop every later signal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered before `listen` returns, so a signal sent right
//!   after startup is never lost
//! - Repeated signals do not escalate; shutdown runs exactly once
//! - The forwarding task ends as soon as the receiver is dropped
//! - Other signals keep their default OS behaviour

use tokio::sync::mpsc;

/// A termination request from the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Create a single-slot termination channel.
pub fn channel() -> (SignalSlot, mpsc::Receiver<TerminationSignal>) {
    let (tx, rx) = mpsc::channel(1);
    (SignalSlot { tx, delivered: false }, rx)
}

/// Producer side of the termination channel: delivers at most one signal.
#[derive(Debug)]
pub struct SignalSlot {
    tx: mpsc::Sender<TerminationSignal>,
    delivered: bool,
}

impl SignalSlot {
    /// Deliver `signal` if none has been delivered yet. Never blocks.
    ///
    /// Returns `true` if this call delivered the signal.
    pub fn deliver(&mut self, signal: TerminationSignal) -> bool {
        if self.delivered {
            tracing::warn!(%signal, "Shutdown already in progress, ignoring signal");
            return false;
        }

        match self.tx.try_send(signal) {
            Ok(()) => {
                self.delivered = true;
                tracing::info!(%signal, "Termination signal received");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.delivered = true;
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(%signal, "Signal receiver gone, dropping signal");
                false
            }
        }
    }

    /// Resolves once the receiving end has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Install termination handlers and return the receiving end of the slot.
#[cfg(unix)]
pub fn listen() -> std::io::Result<mpsc::Receiver<TerminationSignal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let (mut slot, rx) = channel();

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = slot.closed() => break,
                Some(()) = sigint.recv() => TerminationSignal::Interrupt,
                Some(()) = sigterm.recv() => TerminationSignal::Terminate,
                else => break,
            };
            slot.deliver(received);
        }
    });

    Ok(rx)
}

/// Install termination handlers and return the receiving end of the slot.
#[cfg(not(unix))]
pub fn listen() -> std::io::Result<mpsc::Receiver<TerminationSignal>> {
    let (mut slot, rx) = channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = slot.closed() => break,
                result = tokio::signal::ctrl_c() => {
                    if result.is_err() {
                        break;
                    }
                }
            }
            slot.deliver(TerminationSignal::Interrupt);
        }
    });

    Ok(rx)
}
