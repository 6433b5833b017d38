//! Unary RPC server.
//!
//! # Wire Format
//! - `POST /<service>/<method>`, JSON request body
//! - Trace metadata travels as plain request headers
//! - Success: `200` with the JSON response
//! - Failure: the code's HTTP status with a JSON [`RpcStatus`] body

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{service_fn, Layer, ServiceExt};

use crate::context::CallContext;
use crate::interceptor::ServerTraceLayer;
use crate::routing::{RouteError, RouteTable};
use crate::rpc::call::{Incoming, RpcStatus, UnaryCall};

/// Largest accepted request body.
const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

type Endpoint = Arc<dyn Fn(Incoming<Bytes>) -> BoxFuture<'static, Result<Bytes, RpcStatus>> + Send + Sync>;

/// RPC server: a table of traced unary handlers.
pub struct RpcServer {
    name: String,
    routes: RouteTable<Endpoint>,
}

impl RpcServer {
    pub fn new(name: &str) -> Self {
        Self {
            name: format!("rpc.{}", name),
            routes: RouteTable::new(),
        }
    }

    /// Server label, `rpc.<name>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a unary handler under `route` (`/<service>/<method>`).
    ///
    /// The handler runs behind the server trace interceptor.
    pub fn unary<Req, Resp, F, Fut>(&mut self, route: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(CallContext, Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, RpcStatus>> + Send + 'static,
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
    {
        let traced = ServerTraceLayer.layer(service_fn(move |call: UnaryCall<Bytes>| {
            let handler = handler.clone();
            async move {
                let request: Req = serde_json::from_slice(&call.message).map_err(|e| {
                    tracing::warn!(route = %call.route, error = %e, "Undecodable request");
                    RpcStatus::invalid_argument(format!("invalid request body: {}", e))
                })?;
                let response = handler(call.ctx, request).await?;
                serde_json::to_vec(&response)
                    .map(Bytes::from)
                    .map_err(|e| RpcStatus::internal(format!("unencodable response: {}", e)))
            }
        }));

        let endpoint: Endpoint = Arc::new(move |incoming: Incoming<Bytes>| traced.clone().oneshot(incoming).boxed());

        self.routes.insert(route, endpoint)?;
        Ok(self)
    }

    /// Axum router dispatching every path to the registered handlers.
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::new(self.routes))
    }

    /// Serve until the shutdown signal fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(server = %self.name, address = %addr, routes = self.routes.len(), "RPC server starting");

        let name = self.name.clone();
        let app = self.into_router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(server = %name, "RPC server stopped");
        Ok(())
    }
}

fn status_response(status: RpcStatus) -> Response {
    (status.code.http_status(), Json(status)).into_response()
}

async fn dispatch(State(routes): State<Arc<RouteTable<Endpoint>>>, request: Request<Body>) -> Response {
    if request.method() != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "unary calls use POST").into_response();
    }

    let route = request.uri().path().to_string();
    let Some(endpoint) = routes.get(&route).cloned() else {
        tracing::warn!(route = %route, "No handler for route");
        return status_response(RpcStatus::not_found(format!("unknown route {}", route)));
    };

    let peer_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();

    let message = match axum::body::to_bytes(body, MAX_MESSAGE_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return status_response(RpcStatus::invalid_argument(format!("unreadable body: {}", e)));
        }
    };

    let incoming = Incoming {
        route,
        headers: parts.headers,
        peer_addr,
        message,
    };

    match endpoint(incoming).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(status) => status_response(status),
    }
}
