//! Unary RPC client.
//!
//! # Data Flow
//! ```text
//! RpcClient::call ──▶ ClientTrace ──▶ JsonTransport ──▶ HttpTransport ──▶ callee
//!  (UnaryCall)        (copy ctx,       (encode req,      (POST, timeout,
//!                      upstream keys)   decode resp)      status mapping)
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use futures_util::future::BoxFuture;
use http::{header, HeaderMap, HeaderValue, Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{de::DeserializeOwned, Serialize};
use tower::{Layer, Service, ServiceExt};

use crate::config::RpcConfig;
use crate::context::CallContext;
use crate::interceptor::ClientTraceLayer;
use crate::rpc::call::{Code, Outgoing, RpcStatus, UnaryCall};
use crate::rpc::discovery::{DiscoveryError, Resolver};

/// Largest accepted response body.
const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Headers owned by the connection or the body of a single hop.
const HOP_HEADERS: [&str; 10] = [
    "host",
    "content-length",
    "content-type",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "upgrade",
    "proxy-connection",
];

/// Copy call metadata onto an outbound request, leaving hop headers to the transport.
fn copy_metadata(target: &mut HeaderMap, metadata: &HeaderMap) {
    for (name, value) in metadata {
        if HOP_HEADERS.contains(&name.as_str()) {
            tracing::debug!(header = %name, "Hop header left out of outbound metadata");
            continue;
        }
        target.append(name.clone(), value.clone());
    }
}

/// Byte-level transport: one HTTP POST per call.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    addr: SocketAddr,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            addr,
            timeout,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Service<Outgoing<Bytes>> for HttpTransport {
    type Response = Bytes;
    type Error = RpcStatus;
    type Future = BoxFuture<'static, Result<Bytes, RpcStatus>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, out: Outgoing<Bytes>) -> Self::Future {
        let client = self.client.clone();
        let addr = self.addr;
        let timeout = self.timeout;

        Box::pin(async move {
            let mut request = Request::builder()
                .method(Method::POST)
                .uri(format!("http://{}{}", addr, out.route))
                .body(Body::from(out.message))
                .map_err(|e| RpcStatus::invalid_argument(format!("bad route {}: {}", out.route, e)))?;
            copy_metadata(request.headers_mut(), &out.headers);
            request
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

            let response = match tokio::time::timeout(timeout, client.request(request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::warn!(addr = %addr, error = %e, "RPC transport error");
                    return Err(RpcStatus::unavailable(format!("{}: {}", addr, e)));
                }
                Err(_) => {
                    return Err(RpcStatus::new(
                        Code::DeadlineExceeded,
                        format!("no response from {} within {:?}", addr, timeout),
                    ));
                }
            };

            let status = response.status();
            let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES)
                .await
                .map_err(|e| RpcStatus::unavailable(format!("unreadable response: {}", e)))?;

            if status.is_success() {
                return Ok(body);
            }
            Err(serde_json::from_slice::<RpcStatus>(&body).unwrap_or_else(|_| {
                RpcStatus::new(
                    Code::from_http_status(status),
                    String::from_utf8_lossy(&body).into_owned(),
                )
            }))
        })
    }
}

/// Typed adapter encoding requests and decoding `Resp` responses as JSON.
pub struct JsonTransport<Resp> {
    inner: HttpTransport,
    _response: PhantomData<fn() -> Resp>,
}

impl<Resp> JsonTransport<Resp> {
    pub fn new(inner: HttpTransport) -> Self {
        Self {
            inner,
            _response: PhantomData,
        }
    }
}

impl<Resp> Clone for JsonTransport<Resp> {
    fn clone(&self) -> Self {
        Self::new(self.inner.clone())
    }
}

impl<Req, Resp> Service<Outgoing<Req>> for JsonTransport<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned + Send + 'static,
{
    type Response = Resp;
    type Error = RpcStatus;
    type Future = BoxFuture<'static, Result<Resp, RpcStatus>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, out: Outgoing<Req>) -> Self::Future {
        let message = match serde_json::to_vec(&out.message) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                let status = RpcStatus::invalid_argument(format!("unencodable request: {}", e));
                return Box::pin(async move { Err(status) });
            }
        };
        let fut = self.inner.call(Outgoing {
            route: out.route,
            headers: out.headers,
            message,
        });

        Box::pin(async move {
            let body = fut.await?;
            serde_json::from_slice(&body)
                .map_err(|e| RpcStatus::internal(format!("undecodable response: {}", e)))
        })
    }
}

/// Client for one downstream service.
#[derive(Clone)]
pub struct RpcClient {
    service: String,
    transport: HttpTransport,
    trace: ClientTraceLayer,
}

impl RpcClient {
    pub fn new(service: impl Into<String>, addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            service: service.into(),
            transport: HttpTransport::new(addr, timeout),
            trace: ClientTraceLayer::new(),
        }
    }

    /// Resolve `service` and build a client for it.
    pub fn connect(service: &str, resolver: &dyn Resolver, config: &RpcConfig) -> Result<Self, DiscoveryError> {
        let addr = resolver.resolve(service)?;
        tracing::info!(service = %service, address = %addr, "RPC client connected");
        Ok(Self::new(
            service,
            addr,
            Duration::from_secs(config.client_timeout_secs),
        ))
    }

    /// Replace the trace layer, e.g. to pin the process label.
    pub fn with_trace_layer(mut self, trace: ClientTraceLayer) -> Self {
        self.trace = trace;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn addr(&self) -> SocketAddr {
        self.transport.addr()
    }

    /// Issue a unary call on `route` carrying `ctx`'s metadata.
    ///
    /// The caller's location labels the call when `ctx` has no current method.
    #[track_caller]
    pub fn call<Req, Resp>(
        &self,
        ctx: &CallContext,
        route: &str,
        req: Req,
    ) -> impl Future<Output = Result<Resp, RpcStatus>> + Send + 'static
    where
        Req: Serialize + Debug + Send + 'static,
        Resp: DeserializeOwned + Debug + Send + 'static,
    {
        let call = UnaryCall::new(ctx.clone(), route, req);
        let svc = self.trace.layer(JsonTransport::<Resp>::new(self.transport.clone()));
        svc.oneshot(call)
    }
}
