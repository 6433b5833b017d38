//! HTTP server setup and request entry.
//!
//! # Responsibilities
//! - Register handlers per `(verb, path)` with a per-route QPS limit
//! - Build the call context of every request from its trace headers
//! - Shed requests over their route's limit
//! - Run before-request middlewares, then the handler
//! - Turn a panicking handler into a `500` instead of a dropped connection
//! - Echo the trace id and record metrics on every response

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::admission::{admission_key, AdmissionController};
use crate::config::HttpConfig;
use crate::context::CallContext;
use crate::http::request::{context_for, entry_point};
use crate::http::response::echo_trace_id;
use crate::observability::metrics;
use crate::routing::{RouteError, RouteTable};

/// Body of the default reply to a shed request.
pub const OVERFLOW_BODY: &str = "uri over flow! please try again later";

/// Request handler: receives the call context and the raw request.
pub type Handler = Arc<dyn Fn(CallContext, Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

/// Before-request hook. `Err` short-circuits with the given response.
pub type Middleware = Arc<dyn Fn(&CallContext, &Request<Body>) -> Result<(), Response> + Send + Sync>;

/// Box an async function into a [`Handler`].
pub fn handler<F, Fut, R>(f: F) -> Handler
where
    F: Fn(CallContext, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |ctx: CallContext, request: Request<Body>| {
        let fut = f(ctx, request);
        async move { fut.await.into_response() }.boxed()
    })
}

/// A route registration with its admission settings.
pub struct Route {
    method: Method,
    path: String,
    handler: Handler,
    max_qps: Option<u32>,
    on_overflow: Option<Handler>,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
            max_qps: None,
            on_overflow: None,
        }
    }

    /// Admit at most `qps` requests per second. Defaults to the server's limit.
    pub fn max_qps(mut self, qps: u32) -> Self {
        self.max_qps = Some(qps);
        self
    }

    /// Reply with `handler` instead of the default `503` when shed.
    pub fn on_overflow(mut self, handler: Handler) -> Self {
        self.on_overflow = Some(handler);
        self
    }
}

#[derive(Clone)]
struct Endpoint {
    admission_key: String,
    max_qps: u32,
    handler: Handler,
    on_overflow: Option<Handler>,
}

struct Shared {
    name: String,
    routes: RouteTable<Endpoint>,
    middlewares: Vec<Middleware>,
    admission: Arc<AdmissionController>,
}

/// HTTP server for API endpoints.
pub struct HttpServer {
    shared: Shared,
    config: HttpConfig,
}

impl HttpServer {
    /// Server labelled `web.<name>`, shedding through `admission`.
    pub fn new(name: &str, config: HttpConfig, admission: Arc<AdmissionController>) -> Self {
        Self {
            shared: Shared {
                name: format!("web.{}", name),
                routes: RouteTable::new(),
                middlewares: Vec::new(),
                admission,
            },
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Register a route. A `(verb, path)` pair can be registered once.
    pub fn route(&mut self, route: Route) -> Result<&mut Self, RouteError> {
        let endpoint = Endpoint {
            admission_key: admission_key(route.method.as_str(), &route.path),
            max_qps: route.max_qps.unwrap_or(self.config.default_max_qps),
            handler: route.handler,
            on_overflow: route.on_overflow,
        };
        self.shared
            .routes
            .insert(entry_point(&route.path, &route.method), endpoint)?;
        Ok(self)
    }

    pub fn get<F, Fut, R>(&mut self, path: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(CallContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Route::new(Method::GET, path, handler(f)))
    }

    pub fn post<F, Fut, R>(&mut self, path: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(CallContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Route::new(Method::POST, path, handler(f)))
    }

    pub fn put<F, Fut, R>(&mut self, path: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(CallContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Route::new(Method::PUT, path, handler(f)))
    }

    pub fn delete<F, Fut, R>(&mut self, path: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(CallContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Route::new(Method::DELETE, path, handler(f)))
    }

    /// Append a before-request middleware. Middlewares run in binding order.
    pub fn bind_middleware<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&CallContext, &Request<Body>) -> Result<(), Response> + Send + Sync + 'static,
    {
        self.shared.middlewares.push(Arc::new(f));
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(entry)
            .with_state(Arc::new(self.shared))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout_secs)))
            .layer(RequestBodyLimitLayer::new(self.config.max_body_size))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let name = self.shared.name.clone();
        tracing::info!(
            server = %name,
            address = %addr,
            routes = self.shared.routes.len(),
            "HTTP server starting"
        );

        let app = self.into_router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!(server = %name, "HTTP server stopped");
        Ok(())
    }
}

async fn entry(State(shared): State<Arc<Shared>>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    let start = Instant::now();
    let path = request.uri().path().to_string();
    let peer_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ctx = context_for(&shared.name, request.headers(), &path, &method, peer_addr);
    let span = ctx.span();

    let mut response = match shared.routes.get(&entry_point(&path, &method)).cloned() {
        Some(endpoint) => {
            match AssertUnwindSafe(dispatch(&shared, endpoint, ctx.clone(), request))
                .catch_unwind()
                .instrument(span.clone())
                .await
            {
                Ok(response) => response,
                Err(panic) => {
                    span.in_scope(|| {
                        tracing::error!(
                            method = %method,
                            path = %path,
                            panic = %panic_message(panic.as_ref()),
                            "Handler panicked"
                        )
                    });
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        None => {
            span.in_scope(|| tracing::warn!(method = %method, path = %path, "No route matched"));
            StatusCode::NOT_FOUND.into_response()
        }
    };

    echo_trace_id(&ctx, &mut response);
    let status = response.status();
    metrics::record_http_request(method.as_str(), status.as_u16());
    span.in_scope(|| {
        tracing::debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            cost_ms = start.elapsed().as_millis() as u64,
            "Served request"
        )
    });

    response
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn dispatch(shared: &Shared, endpoint: Endpoint, ctx: CallContext, request: Request<Body>) -> Response {
    if shared.admission.is_overflow(&endpoint.admission_key, endpoint.max_qps) {
        tracing::warn!(key = %endpoint.admission_key, limit = endpoint.max_qps, "Request shed");
        return match &endpoint.on_overflow {
            Some(overflow) => overflow(ctx, request).await,
            None => (StatusCode::SERVICE_UNAVAILABLE, OVERFLOW_BODY).into_response(),
        };
    }

    for middleware in &shared.middlewares {
        if let Err(response) = middleware(&ctx, &request) {
            return response;
        }
    }

    (endpoint.handler)(ctx, request).await
}
