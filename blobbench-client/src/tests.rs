use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::{Router, routing};
use blobbench_test::server::TestServer;
use tokio::task::JoinSet;

use super::*;

fn client_for(server: &TestServer, flavor: StoreFlavor) -> Client {
    ClientBuilder::new(server.url("/"), flavor).build().unwrap()
}

#[tokio::test]
async fn creates_and_fetches() {
    let server = TestServer::ambry();
    let client = client_for(&server, StoreFlavor::Ambry);

    let locator = client.create(r#"{"field0":"oh hai!"}"#).await.unwrap();
    assert!(locator.starts_with('/'));

    let body = client.fetch(&locator).await.unwrap();
    assert_eq!(body.as_ref(), br#"{"field0":"oh hai!"}"#);
    assert_eq!(server.creates(), 1);
}

#[tokio::test]
async fn stored_flavor_uses_blob_endpoint() {
    let server = TestServer::stored();
    let client = client_for(&server, StoreFlavor::Stored);

    client.health_check().await.unwrap();
    let locator = client.create("{}").await.unwrap();
    assert!(locator.starts_with("/blob/"));
    assert!(server.object(&locator).is_some());
}

#[tokio::test]
async fn deletes_stored_stuff() {
    for (server, flavor) in [
        (TestServer::ambry(), StoreFlavor::Ambry),
        (TestServer::stored(), StoreFlavor::Stored),
    ] {
        let client = client_for(&server, flavor);
        let locator = client.create("{}").await.unwrap();

        client.delete(&locator).await.unwrap();

        let err = client.fetch(&locator).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(server.object_count(), 0);
    }
}

#[tokio::test]
async fn missing_objects_are_not_found() {
    let server = TestServer::ambry();
    let client = client_for(&server, StoreFlavor::Ambry);

    let err = client.fetch("/does-not-exist").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { status } if status == StatusCode::NOT_FOUND));

    let err = client.delete("/does-not-exist").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn classifies_error_statuses() {
    let router = Router::new()
        .route(
            "/",
            routing::post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        )
        .route(
            "/malformed",
            routing::get(|| async { StatusCode::UNPROCESSABLE_ENTITY })
                .delete(|| async { StatusCode::METHOD_NOT_ALLOWED }),
        )
        .route(
            "/broken",
            routing::get(|| async { StatusCode::BAD_GATEWAY })
                .delete(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
    let server = TestServer::with_router(router);
    let client = client_for(&server, StoreFlavor::Ambry);

    let err = client.create("{}").await.unwrap_err();
    assert!(matches!(&err, Error::Server { message, .. } if message == "boom"));
    assert_eq!(err.kind(), ErrorKind::Server);

    let err = client.fetch("/malformed").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    let err = client.delete("/malformed").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = client.fetch("/broken").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    let err = client.delete("/broken").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn create_requires_location() {
    let router = Router::new()
        .route("/", routing::post(|| async { StatusCode::CREATED }))
        .route("/blob", routing::post(|| async { StatusCode::OK }));
    let server = TestServer::with_router(router);

    let client = client_for(&server, StoreFlavor::Ambry);
    let err = client.create("{}").await.unwrap_err();
    assert!(matches!(err, Error::MissingLocation));

    // Anything but `201 Created` is outside of the protocol.
    let client = client_for(&server, StoreFlavor::Stored);
    let err = client.create("{}").await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedStatus { status } if status == StatusCode::OK));
}

#[tokio::test]
async fn sends_flavor_headers() {
    let router = Router::new().route(
        "/",
        routing::post(|headers: axum::http::HeaderMap| async move {
            let service_id = headers.get("x-ambry-service-id").unwrap();
            let user_agent = headers.get(header::USER_AGENT).unwrap();
            assert_eq!(service_id, "blobbench/ambry");
            assert_eq!(user_agent, "blobbench/ambry");
            (StatusCode::CREATED, [(header::LOCATION, "/abc123")])
        }),
    );
    let server = TestServer::with_router(router);
    let client = client_for(&server, StoreFlavor::Ambry);

    assert_eq!(client.create("{}").await.unwrap(), "/abc123");
}

#[tokio::test]
async fn health_check_requires_ok() {
    let server = TestServer::ambry();
    client_for(&server, StoreFlavor::Ambry)
        .health_check()
        .await
        .unwrap();

    // The stored health endpoint does not exist on an ambry server.
    let err = client_for(&server, StoreFlavor::Stored)
        .health_check()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unhealthy { status } if status == StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn unreachable_store_is_a_transport_error() {
    // Bind and immediately drop a listener to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = ClientBuilder::new(format!("http://127.0.0.1:{port}"), StoreFlavor::Ambry)
        .build()
        .unwrap();

    let err = client.fetch("/anything").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn closed_client_rejects_requests() {
    let server = TestServer::ambry();
    let client = client_for(&server, StoreFlavor::Ambry);
    let clone = client.clone();

    client.close();

    let err = clone.create("{}").await.unwrap_err();
    assert!(matches!(err, Error::Closed));
    assert_eq!(server.requests(), 0);
}

/// Serves `GET /slow` and tracks the peak number of requests in flight.
fn slow_server() -> (TestServer, Arc<AtomicUsize>) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handler = {
        let peak = Arc::clone(&peak);
        move || {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                "slow"
            }
        }
    };

    let server = TestServer::with_router(Router::new().route("/slow", routing::get(handler)));
    (server, peak)
}

async fn fetch_concurrently(client: &Client, requests: usize) {
    let mut tasks = JoinSet::new();
    for _ in 0..requests {
        let client = client.clone();
        tasks.spawn(async move { client.fetch("/slow").await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap().unwrap().as_ref(), b"slow");
    }
}

#[tokio::test]
async fn limits_requests_per_host() {
    let (server, peak) = slow_server();
    let client = ClientBuilder::new(server.url("/"), StoreFlavor::Ambry)
        .max_connections_per_host(2)
        .build()
        .unwrap();

    fetch_concurrently(&client, 10).await;

    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "{peak} requests in flight");
}

#[tokio::test]
async fn limits_total_requests() {
    let (server, peak) = slow_server();
    let client = ClientBuilder::new(server.url("/"), StoreFlavor::Ambry)
        .max_connections(3)
        .build()
        .unwrap();

    fetch_concurrently(&client, 10).await;

    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "{peak} requests in flight");
}

#[test]
fn resolves_locators() {
    let client = ClientBuilder::new("http://localhost:1174/", StoreFlavor::Ambry)
        .build()
        .unwrap();

    assert_eq!(client.base_url(), "http://localhost:1174");
    assert_eq!(client.locator_url("/abc"), "http://localhost:1174/abc");
    assert_eq!(client.locator_url("abc"), "http://localhost:1174/abc");
    assert_eq!(
        client.locator_url("http://elsewhere/abc"),
        "http://elsewhere/abc"
    );
}

#[test]
fn rejects_invalid_base_url() {
    let err = ClientBuilder::new("localhost:1174", StoreFlavor::Ambry)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidUrl { .. }));
}

#[test]
fn parses_flavors() {
    assert_eq!("Ambry".parse::<StoreFlavor>().unwrap(), StoreFlavor::Ambry);
    assert_eq!("stored".parse::<StoreFlavor>().unwrap(), StoreFlavor::Stored);
    assert!("etcd".parse::<StoreFlavor>().is_err());
}
