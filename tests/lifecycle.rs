//! End-to-end lifecycle tests: real sockets, real HTTP, injected signals.

use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use product_api::http::server::ServeError;
use product_api::lifecycle::{
    signals, Coordinator, DrainError, ListenerState, Outcome, Phase, TerminationSignal,
};
use product_api::net::ListenerError;
use product_api::Product;
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn concurrent_requests_complete_before_clean_exit() {
    let mut server = common::start(
        common::test_config(),
        common::slow_catalog(Duration::from_millis(200)),
    )
    .await;
    let client = common::client();
    let url = format!("http://{}/products", server.addr);

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                let response = client.get(&url).send().await?;
                let status = response.status();
                let products: Vec<Product> = response.json().await?;
                Ok::<_, reqwest::Error>((status, products))
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.signals.deliver(TerminationSignal::Terminate));

    for request in requests {
        let (status, products) = request.await.unwrap().expect("request should complete");
        assert!(status.is_success());
        assert_eq!(products, common::sample_catalog().products());
    }

    let outcome = server.outcome.await.unwrap();
    assert!(outcome.is_clean(), "unexpected outcome: {outcome:?}");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(server.status.phase(), Phase::Closed);
    assert_eq!(server.status.active_connections(), 0);

    assert!(
        TcpStream::connect(server.addr).await.is_err(),
        "listener should be closed after shutdown"
    );
}

#[tokio::test]
async fn immediate_signal_exits_cleanly_and_releases_port() {
    let mut server = common::start(common::test_config(), common::slow_catalog(Duration::ZERO)).await;

    assert!(server.signals.deliver(TerminationSignal::Interrupt));
    let outcome = server.outcome.await.unwrap();

    assert!(outcome.is_clean(), "unexpected outcome: {outcome:?}");
    assert_eq!(server.status.listener(), ListenerState::Stopped);
    assert!(TcpStream::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn idle_keep_alive_connections_do_not_hold_up_drain() {
    let mut server = common::start(common::test_config(), common::slow_catalog(Duration::ZERO)).await;
    let client = common::client();

    let response = client
        .get(format!("http://{}/products", server.addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let _ = response.bytes().await.unwrap();

    let started = Instant::now();
    server.signals.deliver(TerminationSignal::Terminate);
    let outcome = server.outcome.await.unwrap();

    assert!(outcome.is_clean(), "unexpected outcome: {outcome:?}");
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn address_in_use_is_fatal_without_shutdown() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = common::test_config();
    config.listener.bind_address = occupied.local_addr().unwrap().to_string();

    let coordinator = Coordinator::new(&config, common::slow_catalog(Duration::ZERO));
    let status = coordinator.status();
    let (_slot, rx) = signals::channel();

    let outcome = coordinator.run(rx).await;

    match &outcome {
        Outcome::ListenerFailed(ServeError::Listener(ListenerError::Bind { source, .. })) => {
            assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(status.drain_requests(), 0);
    assert_eq!(status.phase(), Phase::Serving);
    assert_eq!(status.local_addr().await, None);
}

#[tokio::test]
async fn stuck_handler_is_force_closed_after_deadline() {
    let mut config = common::test_config();
    config.timeouts.write_ms = 60_000;
    config.timeouts.shutdown_ms = 300;

    let stuck = Router::new().route(
        "/stuck",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "too late"
        }),
    );
    let mut server = common::start(config, stuck).await;

    let client = common::client();
    let url = format!("http://{}/stuck", server.addr);
    let request = tokio::spawn(async move { client.get(&url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.status.active_connections(), 1);

    let started = Instant::now();
    server.signals.deliver(TerminationSignal::Terminate);
    let outcome = server.outcome.await.unwrap();
    let elapsed = started.elapsed();

    match &outcome {
        Outcome::ForcedClose { drain, close } => {
            assert_eq!(
                drain,
                &DrainError::DeadlineElapsed {
                    deadline: Duration::from_millis(300),
                    active: 1,
                }
            );
            assert!(close.is_none());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 2);
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(1_300), "took {elapsed:?}");

    assert!(request.await.unwrap().is_err(), "stuck request should be cut off");
    assert_eq!(server.status.active_connections(), 0);
    assert!(TcpStream::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn repeated_signals_run_one_shutdown() {
    let mut server = common::start(common::test_config(), common::slow_catalog(Duration::ZERO)).await;

    assert!(server.signals.deliver(TerminationSignal::Terminate));
    assert!(!server.signals.deliver(TerminationSignal::Interrupt));
    assert!(!server.signals.deliver(TerminationSignal::Terminate));

    let outcome = server.outcome.await.unwrap();
    assert!(outcome.is_clean(), "unexpected outcome: {outcome:?}");
    assert_eq!(server.status.drain_requests(), 1);
}
