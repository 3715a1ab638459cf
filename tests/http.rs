//! Middleware behaviour observed over a live listener.

use std::time::Duration;

use product_api::http::X_REQUEST_ID;
use product_api::lifecycle::TerminationSignal;
use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn responses_carry_a_request_id() {
    let mut server = common::start(common::test_config(), common::slow_catalog(Duration::ZERO)).await;
    let client = common::client();
    let url = format!("http://{}/products", server.addr);

    let generated = client.get(&url).send().await.unwrap();
    assert_eq!(generated.status(), StatusCode::OK);
    let id = generated.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok(), "not a uuid: {id}");

    let echoed = client
        .get(&url)
        .header(X_REQUEST_ID, "client-chosen-id")
        .send()
        .await
        .unwrap();
    assert_eq!(echoed.headers()[X_REQUEST_ID], "client-chosen-id");

    server.signals.deliver(TerminationSignal::Terminate);
    assert!(server.outcome.await.unwrap().is_clean());
}

#[tokio::test]
async fn slow_handler_hits_write_timeout() {
    let mut config = common::test_config();
    config.timeouts.write_ms = 100;

    let mut server = common::start(config, common::slow_catalog(Duration::from_secs(2))).await;
    let response = common::client()
        .get(format!("http://{}/products", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    server.signals.deliver(TerminationSignal::Terminate);
    assert!(server.outcome.await.unwrap().is_clean());
}
