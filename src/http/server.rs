//! HTTP server setup and the serving loop.
//!
//! # Responsibilities
//! - Wrap the injected Axum Router with middleware (tracing, request ID, write timeout)
//! - Configure HTTP/1.1 and HTTP/2 support with a header read timeout
//! - Bind the listener and run the accept loop
//! - Hand each connection its own task, tracked for shutdown
//! - Stop accepting on drain; drop connections on forced close
//!
//! The server never shuts itself down. It follows the phase published through
//! its [`ShutdownWatch`].

use std::io;
use std::time::Duration;

use axum::http::HeaderName;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::TcpStream;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::{AppConfig, ListenerConfig};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::shutdown::ShutdownWatch;
use crate::net::connection::ConnectionGuard;
use crate::net::listener::{classify_accept_error, AcceptAction, ConnectionPermit, Listener, ListenerError};

/// The listener could not start, or stopped without being asked to.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] io::Error),

    #[error("accept failed {attempts} times in a row: {source}")]
    Accept {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("listener stopped without a shutdown request")]
    UnexpectedStop,

    #[error("serving task terminated abnormally: {0}")]
    Aborted(String),
}

/// HTTP server for a single listener.
pub struct HttpServer {
    app: Router,
    listener: ListenerConfig,
    read_timeout: Duration,
}

impl HttpServer {
    /// Create a server that runs `app` with the given configuration.
    pub fn new(config: &AppConfig, app: Router) -> Self {
        Self {
            app: Self::build_router(app, config.timeouts.write()),
            listener: config.listener.clone(),
            read_timeout: config.timeouts.read(),
        }
    }

    /// Wrap the handler with all middleware layers.
    #[allow(deprecated)]
    fn build_router(app: Router, write_timeout: Duration) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        app.layer(TimeoutLayer::new(write_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetRequestIdLayer::new(request_id, UuidRequestId))
    }

    /// Bind and serve until the shutdown watch leaves `Serving`.
    ///
    /// Returns `Ok(())` only for a requested stop. The listener socket is
    /// released, and reported as stopped, before this returns.
    pub async fn run(self, shutdown: ShutdownWatch) -> Result<(), ServeError> {
        let result = self.serve(shutdown.clone()).await;
        shutdown.mark_stopped();
        result
    }

    async fn serve(&self, mut shutdown: ShutdownWatch) -> Result<(), ServeError> {
        let listener = Listener::bind(&self.listener).await?;
        let addr = listener.local_addr().map_err(ServeError::LocalAddr)?;
        shutdown.mark_listening(addr);

        tracing::info!(
            address = %addr,
            read_timeout = ?self.read_timeout,
            "HTTP server listening"
        );

        let mut builder = Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_timeout);

        let mut failures = 0u32;
        loop {
            let accepted = tokio::select! {
                _ = shutdown.draining() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer, permit)) => {
                    failures = 0;
                    let guard = shutdown.connections().track();
                    let span = tracing::debug_span!("connection", id = %guard.id(), peer = %peer);
                    let connection = serve_connection(
                        builder.clone(),
                        self.app.clone(),
                        stream,
                        shutdown.clone(),
                        guard,
                        permit,
                    );
                    tokio::spawn(connection.instrument(span));
                }
                Err(ListenerError::Accept(error)) => {
                    match classify_accept_error(&error, failures + 1) {
                        AcceptAction::Skip => {
                            tracing::debug!(error = %error, "Accept failed for one peer, continuing");
                        }
                        AcceptAction::Backoff(delay) => {
                            failures += 1;
                            tracing::warn!(error = %error, attempt = failures, ?delay, "Accept failed, backing off");
                            tokio::select! {
                                _ = shutdown.draining() => break,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        AcceptAction::GiveUp => {
                            return Err(ServeError::Accept {
                                attempts: failures + 1,
                                source: error,
                            });
                        }
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }

        tracing::info!(
            address = %addr,
            active_connections = shutdown.connections().active_count(),
            available_permits = listener.available_permits(),
            "Stopped accepting connections"
        );
        Ok(())
    }
}

/// Serve one connection until it ends, draining or dropping it on shutdown.
async fn serve_connection(
    builder: Builder<TokioExecutor>,
    app: Router,
    stream: TcpStream,
    mut shutdown: ShutdownWatch,
    guard: ConnectionGuard,
    permit: ConnectionPermit,
) {
    // Released after the connection below is dropped.
    let _guard = guard;
    let _permit = permit;

    let service = TowerToHyperService::new(app);
    let connection = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.draining() => {
            // Finish in-flight requests, refuse further keep-alive requests.
            connection.as_mut().graceful_shutdown();
            tokio::select! {
                result = connection.as_mut() => result,
                _ = shutdown.closed() => {
                    tracing::debug!("Connection force-closed");
                    return;
                }
            }
        }
    };

    if let Err(error) = result {
        tracing::debug!(error = %error, "Connection ended with error");
    }
}
