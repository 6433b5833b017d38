//! Context propagation across real HTTP and RPC hops.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mesh_runtime::admission::ManualClock;
use mesh_runtime::context::{keys, CallContext, Metadata};
use mesh_runtime::http::ApiResponse;
use mesh_runtime::interceptor::ClientTraceLayer;
use mesh_runtime::lifecycle::Shutdown;
use mesh_runtime::rpc::{Code, RpcClient, RpcServer, RpcStatus};
use serde::{Deserialize, Serialize};

mod common;

#[derive(Debug, Serialize, Deserialize)]
struct Charge {
    cents: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Receipt {
    cents: u64,
}

type Seen = Arc<Mutex<Option<Metadata>>>;

/// Billing service recording the metadata of the last call it served.
async fn start_billing(shutdown: &Shutdown) -> (RpcClient, Seen) {
    let seen: Seen = Arc::default();
    let recorder = seen.clone();

    let mut server = RpcServer::new("billing");
    server
        .unary("/billing/Charge", move |ctx: CallContext, req: Charge| {
            let recorder = recorder.clone();
            async move {
                *recorder.lock().unwrap() = Some(ctx.metadata());
                if req.cents == 0 {
                    return Err(RpcStatus::invalid_argument("nothing to charge"));
                }
                Ok(Receipt { cents: req.cents })
            }
        })
        .unwrap();

    let addr = common::start_rpc(server, shutdown).await;
    let client = RpcClient::new("billing", addr, Duration::from_secs(5));
    (client, seen)
}

#[tokio::test]
async fn caller_identity_becomes_callee_upstream() {
    let shutdown = Shutdown::new();
    let (billing, seen) = start_billing(&shutdown).await;

    let after_call: Seen = Arc::default();
    let after = after_call.clone();
    let mut orders = RpcServer::new("orders");
    orders
        .unary("/orders/CreateOrder", move |ctx: CallContext, req: Charge| {
            let billing = billing.clone();
            let after = after.clone();
            async move {
                let receipt: Receipt = billing.call(&ctx, "/billing/Charge", req).await?;
                *after.lock().unwrap() = Some(ctx.metadata());
                Ok::<_, RpcStatus>(receipt)
            }
        })
        .unwrap();
    let orders_addr = common::start_rpc(orders, &shutdown).await;
    let orders_client = RpcClient::new("orders", orders_addr, Duration::from_secs(5));

    let root = CallContext::new();
    let receipt: Receipt = orders_client
        .call(&root, "/orders/CreateOrder", Charge { cents: 250 })
        .await
        .unwrap();
    assert_eq!(receipt.cents, 250);

    let callee = seen.lock().unwrap().clone().unwrap();
    assert_eq!(callee.get(keys::TRACE_ID), Some(root.trace_id().as_str()));
    assert_eq!(callee.get(keys::UPSTREAM_METHOD), Some("CreateOrder"));
    assert_eq!(callee.get(keys::UPSTREAM_SERVICE), Some("orders"));
    assert_eq!(callee.get(keys::CURRENT_METHOD), Some("Charge"));
    assert_eq!(callee.get(keys::CURRENT_SERVICE), Some("billing"));
    assert!(callee
        .get(keys::UPSTREAM_ADDRESS)
        .is_some_and(|addr| addr.starts_with("127.0.0.1:")));

    // The outbound call ran on a copy: the caller's identity is intact.
    let caller = after_call.lock().unwrap().clone().unwrap();
    assert_eq!(caller.get(keys::CURRENT_METHOD), Some("CreateOrder"));
    assert_eq!(caller.get(keys::CURRENT_SERVICE), Some("orders"));

    shutdown.trigger();
}

#[tokio::test]
async fn nested_call_body_is_independent_of_inbound_body() {
    let shutdown = Shutdown::new();
    let (billing, seen) = start_billing(&shutdown).await;

    let mut orders = RpcServer::new("orders");
    orders
        .unary("/orders/CreateOrder", move |ctx: CallContext, req: Charge| {
            let billing = billing.clone();
            async move {
                assert!(ctx.get("content-length").is_none());
                let nested = Charge { cents: req.cents * 123_456_789 };
                billing.call::<_, Receipt>(&ctx, "/billing/Charge", nested).await
            }
        })
        .unwrap();
    let orders_addr = common::start_rpc(orders, &shutdown).await;
    let orders_client = RpcClient::new("orders", orders_addr, Duration::from_secs(5));

    let receipt: Receipt = orders_client
        .call(&CallContext::new(), "/orders/CreateOrder", Charge { cents: 1 })
        .await
        .unwrap();
    assert_eq!(receipt.cents, 123_456_789);

    let callee = seen.lock().unwrap().clone().unwrap();
    for header in ["content-length", "content-type", "host"] {
        assert_eq!(callee.get(header), None, "{header} leaked into the bag");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn call_outside_any_served_call_is_labelled_locally() {
    let shutdown = Shutdown::new();
    let (billing, seen) = start_billing(&shutdown).await;
    let billing = billing.with_trace_layer(ClientTraceLayer::with_process_label("<process>-<e2e>"));

    let _: Receipt = billing
        .call(&CallContext::new(), "/billing/Charge", Charge { cents: 1 })
        .await
        .unwrap();

    let callee = seen.lock().unwrap().clone().unwrap();
    assert_eq!(callee.get(keys::UPSTREAM_SERVICE), Some("<process>-<e2e>"));
    let method = callee.get(keys::UPSTREAM_METHOD).unwrap();
    assert!(method.starts_with("<local>-<"), "{method}");
    assert!(method.contains("end_to_end.rs"), "{method}");

    shutdown.trigger();
}

#[tokio::test]
async fn handler_status_reaches_caller_unchanged() {
    let shutdown = Shutdown::new();
    let (billing, _seen) = start_billing(&shutdown).await;

    let err = billing
        .call::<_, Receipt>(&CallContext::new(), "/billing/Charge", Charge { cents: 0 })
        .await
        .unwrap_err();
    assert_eq!(err, RpcStatus::invalid_argument("nothing to charge"));

    let err = billing
        .call::<_, Receipt>(&CallContext::new(), "/billing/Refund", Charge { cents: 1 })
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::NotFound);

    shutdown.trigger();
}

#[tokio::test]
async fn http_entry_feeds_rpc_context() {
    let shutdown = Shutdown::new();
    let (billing, seen) = start_billing(&shutdown).await;
    let billing = Arc::new(billing);

    let mut web = common::http_server_with_clock("shop", Arc::new(ManualClock::new(1_000)));
    web.post("/orders", move |ctx: CallContext, _req| {
        let billing = billing.clone();
        async move {
            match billing.call::<_, Receipt>(&ctx, "/billing/Charge", Charge { cents: 5 }).await {
                Ok(receipt) => ApiResponse::ok(receipt.cents.into()),
                Err(status) => ApiResponse::error(502, status.to_string()),
            }
        }
    })
    .unwrap();
    let web_addr = common::start_http(web, &shutdown).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/orders", web_addr))
        .header(keys::TRACE_ID, "trace-http-1")
        .header("temp_tenant", "acme")
        .header("cookie", "session=secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[keys::TRACE_ID], "trace-http-1");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["result"], 0);
    assert_eq!(body["data"], 5);

    let callee = seen.lock().unwrap().clone().unwrap();
    assert_eq!(callee.get(keys::TRACE_ID), Some("trace-http-1"));
    assert_eq!(callee.get(keys::UPSTREAM_SERVICE), Some("web.shop"));
    assert_eq!(callee.get(keys::UPSTREAM_METHOD), Some("/orders_POST"));
    assert_eq!(callee.get("temp_tenant"), Some("acme"));
    assert_eq!(callee.get("cookie"), None);

    shutdown.trigger();
}
