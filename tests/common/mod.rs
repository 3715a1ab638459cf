//! Shared utilities for lifecycle integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::Request, middleware::Next, response::Response, Router};
use product_api::catalog::{self, Catalog, Product};
use product_api::config::AppConfig;
use product_api::lifecycle::{signals::{self, SignalSlot}, Coordinator, Outcome, ServerStatus};
use tokio::task::JoinHandle;

/// A coordinator running in the background.
#[allow(dead_code)]
pub struct RunningServer {
    pub addr: SocketAddr,
    pub status: ServerStatus,
    pub signals: SignalSlot,
    pub outcome: JoinHandle<Outcome>,
}

/// Config bound to an ephemeral localhost port.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.shutdown_ms = 2_000;
    config
}

#[allow(dead_code)]
pub fn sample_catalog() -> Catalog {
    Catalog::new(vec![
        Product::new("Comic Books", 75, 50),
        Product::new("McDonand Toys", 25, 120),
    ])
}

/// The product listing, with every response delayed by `delay`.
#[allow(dead_code)]
pub fn slow_catalog(delay: Duration) -> Router {
    catalog::router(sample_catalog()).layer(axum::middleware::from_fn(
        move |request: Request, next: Next| async move {
            tokio::time::sleep(delay).await;
            let response: Response = next.run(request).await;
            response
        },
    ))
}

/// Start a coordinator and wait until its listener is bound.
#[allow(dead_code)]
pub async fn start(config: AppConfig, app: Router) -> RunningServer {
    let coordinator = Coordinator::new(&config, app);
    let status = coordinator.status();
    let (slot, rx) = signals::channel();

    let outcome = tokio::spawn(coordinator.run(rx));
    let addr = tokio::time::timeout(Duration::from_secs(5), status.local_addr())
        .await
        .expect("server did not bind in time")
        .expect("server failed to bind");

    RunningServer {
        addr,
        status,
        signals: slot,
        outcome,
    }
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
