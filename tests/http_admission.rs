//! Per-route admission over a live HTTP server.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use mesh_runtime::admission::ManualClock;
use mesh_runtime::context::keys;
use mesh_runtime::http::server::OVERFLOW_BODY;
use mesh_runtime::http::{handler, Route};
use mesh_runtime::lifecycle::Shutdown;

mod common;

#[tokio::test]
async fn fourth_request_in_a_second_is_shed() {
    let shutdown = Shutdown::new();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let mut server = common::http_server_with_clock("shop", clock.clone());
    server
        .route(Route::new(Method::GET, "/orders", handler(|_ctx, _req| async { "ok" })).max_qps(3))
        .unwrap();
    let addr = common::start_http(server, &shutdown).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/orders", addr);

    let mut statuses = Vec::new();
    for _ in 0..4 {
        statuses.push(client.get(&url).send().await.unwrap().status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 200, 503]);

    let shed = client
        .get(&url)
        .header(keys::TRACE_ID, "shed-1")
        .send()
        .await
        .unwrap();
    assert_eq!(shed.status(), StatusCode::SERVICE_UNAVAILABLE.as_u16());
    assert_eq!(shed.headers()[keys::TRACE_ID], "shed-1");
    assert_eq!(shed.text().await.unwrap(), OVERFLOW_BODY);

    // The next second opens a fresh window.
    clock.advance(1);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn routes_are_admitted_independently() {
    let shutdown = Shutdown::new();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let mut server = common::http_server_with_clock("shop", clock);
    server
        .route(Route::new(Method::GET, "/orders", handler(|_ctx, _req| async { "list" })).max_qps(1))
        .unwrap();
    server
        .route(Route::new(Method::POST, "/orders", handler(|_ctx, _req| async { "create" })).max_qps(1))
        .unwrap();
    let addr = common::start_http(server, &shutdown).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/orders", addr);

    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 503);
    assert_eq!(client.post(&url).send().await.unwrap().status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn overflow_handler_answers_shed_requests() {
    let shutdown = Shutdown::new();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let mut server = common::http_server_with_clock("shop", clock);
    server
        .route(
            Route::new(Method::GET, "/quote", handler(|_ctx, _req| async { "fresh" }))
                .max_qps(1)
                .on_overflow(handler(|_ctx, _req| async { "cached" })),
        )
        .unwrap();
    let addr = common::start_http(server, &shutdown).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/quote", addr);

    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "fresh");
    let shed = client.get(&url).send().await.unwrap();
    assert_eq!(shed.status(), 200);
    assert_eq!(shed.text().await.unwrap(), "cached");

    shutdown.trigger();
}

#[tokio::test]
async fn preflight_and_unknown_routes() {
    let shutdown = Shutdown::new();
    let mut server = common::http_server_with_clock("shop", Arc::new(ManualClock::new(1_700_000_000)));
    server.get("/orders", |_ctx, _req| async { "ok" }).unwrap();
    let addr = common::start_http(server, &shutdown).await;
    let client = reqwest::Client::new();

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("http://{}/anything", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 200);

    let missing = client.get(format!("http://{}/missing", addr)).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    assert!(missing.headers().contains_key(keys::TRACE_ID));

    shutdown.trigger();
}

#[tokio::test]
async fn panicking_handler_keeps_the_connection_answering() {
    let shutdown = Shutdown::new();
    let mut server = common::http_server_with_clock("shop", Arc::new(ManualClock::new(1_700_000_000)));
    server
        .get("/boom", |_ctx, _req| async move {
            let stock: Option<u32> = None;
            stock.map(|n| n.to_string()).unwrap_or_else(|| panic!("no stock"))
        })
        .unwrap();
    server.get("/orders", |_ctx, _req| async { "ok" }).unwrap();
    let addr = common::start_http(server, &shutdown).await;
    let client = reqwest::Client::new();

    let boom = client
        .get(format!("http://{}/boom", addr))
        .header(keys::TRACE_ID, "trace-panic")
        .send()
        .await
        .unwrap();
    assert_eq!(boom.status(), 500);
    assert_eq!(boom.headers()[keys::TRACE_ID], "trace-panic");

    let after = client.get(format!("http://{}/orders", addr)).send().await.unwrap();
    assert_eq!(after.status(), 200);

    shutdown.trigger();
}
