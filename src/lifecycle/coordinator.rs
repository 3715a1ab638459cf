//! Process lifecycle coordination.
//!
//! ```text
//! Starting ──spawn runner──▶ Running
//! Running  ──runner exit──▶ FatalExit
//! Running  ──termination──▶ Draining ──drained──▶ CleanExit
//!                                    └─deadline/error─▶ ForceClose
//! ```
//!
//! The runner's exit and the termination signal travel over single-slot
//! channels and are raced exactly once; the first to arrive picks the path.

use std::time::Duration;

use axum::Router;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::http::server::{HttpServer, ServeError};
use crate::lifecycle::shutdown::{CloseError, DrainError, ServerHandle, ServerStatus, ShutdownWatch};
use crate::lifecycle::signals::TerminationSignal;

/// How the serving task ended.
#[derive(Debug)]
pub enum RunnerExit {
    /// Stopped because shutdown was requested.
    Stopped,
    /// Could not bind, or stopped on its own.
    Failed(ServeError),
}

/// Terminal state of the lifecycle.
#[derive(Debug)]
pub enum Outcome {
    /// Drained within the deadline.
    Clean,
    /// The listener failed before any shutdown was requested.
    ListenerFailed(ServeError),
    /// The drain failed or timed out and connections were dropped.
    ForcedClose {
        drain: DrainError,
        close: Option<CloseError>,
    },
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Clean => 0,
            Outcome::ListenerFailed(_) => 1,
            Outcome::ForcedClose { .. } => 2,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Outcome::Clean)
    }
}

/// Drives a server from startup to one terminal [`Outcome`].
pub struct Coordinator {
    server: HttpServer,
    handle: ServerHandle,
    watch: ShutdownWatch,
    shutdown_timeout: Duration,
}

impl Coordinator {
    /// Prepare a coordinator serving `app`. Nothing is bound until [`Coordinator::run`].
    pub fn new(config: &AppConfig, app: Router) -> Self {
        let (handle, watch) = ServerHandle::new();
        Self {
            server: HttpServer::new(config, app),
            handle,
            watch,
            shutdown_timeout: config.timeouts.shutdown(),
        }
    }

    /// Observer for the server this coordinator owns.
    pub fn status(&self) -> ServerStatus {
        self.handle.status()
    }

    /// Run until the listener fails or a termination signal arrives.
    pub async fn run(self, mut signals: mpsc::Receiver<TerminationSignal>) -> Outcome {
        let Coordinator {
            server,
            handle,
            watch,
            shutdown_timeout,
        } = self;

        // Starting
        let (exit_tx, mut exit_rx) = mpsc::channel(1);
        let runner = tokio::spawn(async move {
            let exit = match server.run(watch).await {
                Ok(()) => RunnerExit::Stopped,
                Err(error) => RunnerExit::Failed(error),
            };
            // Nobody reads a shutdown-induced stop; dropping it is fine.
            let _ = exit_tx.try_send(exit);
        });

        // Running
        // A runner exit that is already queued wins over a signal.
        let signal = tokio::select! {
            biased;
            exit = exit_rx.recv() => {
                let error = match exit {
                    Some(RunnerExit::Failed(error)) => error,
                    Some(RunnerExit::Stopped) => ServeError::UnexpectedStop,
                    None => match runner.await {
                        Err(join) => ServeError::Aborted(join.to_string()),
                        Ok(()) => ServeError::UnexpectedStop,
                    },
                };
                tracing::error!(error = %error, "Listen and serve failed");
                return Outcome::ListenerFailed(error);
            }
            Some(signal) = signals.recv() => signal,
        };

        // Draining
        tracing::info!(
            %signal,
            deadline = ?shutdown_timeout,
            active_connections = handle.status().active_connections(),
            "Starting graceful shutdown"
        );

        let drain = match handle.graceful_shutdown(shutdown_timeout).await {
            Ok(()) => {
                tracing::info!("Graceful shutdown complete");
                return Outcome::Clean;
            }
            Err(error) => error,
        };
        tracing::warn!(error = %drain, "Graceful shutdown did not complete, forcing close");

        // ForceClose
        let close = handle.force_close().await.err();
        if let Some(error) = &close {
            tracing::error!(error = %error, "Could not force-close server");
        } else {
            tracing::warn!("Server force-closed");
        }
        Outcome::ForcedClose { drain, close }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::{ListenerState, Phase};
    use crate::lifecycle::signals;
    use axum::routing::get;

    fn test_config(address: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.listener.bind_address = address.to_string();
        config.timeouts.shutdown_ms = 500;
        config
    }

    fn hello() -> Router {
        Router::new().route("/", get(|| async { "hello" }))
    }

    #[test]
    fn exit_codes_are_distinct() {
        let forced = Outcome::ForcedClose {
            drain: DrainError::DeadlineElapsed {
                deadline: Duration::from_secs(5),
                active: 1,
            },
            close: None,
        };
        assert_eq!(Outcome::Clean.exit_code(), 0);
        assert_eq!(Outcome::ListenerFailed(ServeError::UnexpectedStop).exit_code(), 1);
        assert_eq!(forced.exit_code(), 2);
        assert!(Outcome::Clean.is_clean());
        assert!(!forced.is_clean());
    }

    #[tokio::test]
    async fn signal_drives_clean_exit() {
        let coordinator = Coordinator::new(&test_config("127.0.0.1:0"), hello());
        let status = coordinator.status();
        let (mut slot, rx) = signals::channel();

        let run = tokio::spawn(coordinator.run(rx));
        assert!(status.local_addr().await.is_some());
        slot.deliver(TerminationSignal::Terminate);

        let outcome = run.await.unwrap();
        assert!(outcome.is_clean(), "unexpected outcome: {outcome:?}");
        assert_eq!(status.phase(), Phase::Closed);
        assert_eq!(status.listener(), ListenerState::Stopped);
        assert_eq!(status.drain_requests(), 1);
    }

    #[tokio::test]
    async fn bind_failure_skips_shutdown() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = occupied.local_addr().unwrap().to_string();

        let coordinator = Coordinator::new(&test_config(&address), hello());
        let status = coordinator.status();
        let (_slot, rx) = signals::channel();

        let outcome = coordinator.run(rx).await;
        assert!(matches!(outcome, Outcome::ListenerFailed(ServeError::Listener(_))));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(status.drain_requests(), 0);
        assert_eq!(status.phase(), Phase::Serving);
    }
}
