//! Server-side trace interceptor.
//!
//! Turns an [`Incoming`] call into a [`UnaryCall`] bound to a context
//! rehydrated from the caller's metadata, then logs one line per call.

use std::fmt::Debug;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::context::{keys, CallContext};
use crate::interceptor::route::RouteName;
use crate::observability::metrics;
use crate::rpc::call::{Incoming, UnaryCall};

/// Tower layer installing [`ServerTrace`] in front of a handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerTraceLayer;

impl<S> Layer<S> for ServerTraceLayer {
    type Service = ServerTrace<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerTrace { inner }
    }
}

/// Service wrapper annotating every inbound call with caller/callee identity.
#[derive(Debug, Clone)]
pub struct ServerTrace<S> {
    inner: S,
}

impl<S> ServerTrace<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, Req> Service<Incoming<Req>> for ServerTrace<S>
where
    S: Service<UnaryCall<Req>>,
    S::Future: Send + 'static,
    S::Response: Debug + Send + 'static,
    S::Error: Debug + Send + 'static,
    Req: Debug,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, incoming: Incoming<Req>) -> Self::Future {
        let ctx = CallContext::from_incoming(&incoming.headers);

        let upstream_service = ctx.get_or_unknown(keys::UPSTREAM_SERVICE);
        let upstream_method = ctx.get_or_unknown(keys::UPSTREAM_METHOD);

        let RouteName { service, method } = RouteName::parse(&incoming.route);
        ctx.set_pairs([
            (keys::CURRENT_METHOD, method.clone()),
            (keys::CURRENT_SERVICE, service.clone()),
        ]);

        let upstream_address = match incoming.peer_addr {
            Some(addr) => {
                let addr = addr.to_string();
                ctx.insert(keys::UPSTREAM_ADDRESS, addr.clone());
                addr
            }
            None => {
                ctx.del(&[keys::UPSTREAM_ADDRESS]);
                keys::UNKNOWN.to_string()
            }
        };

        let request = format!("{:?}", incoming.message);
        let span = ctx.span();
        let call = UnaryCall::inbound(ctx, incoming.route, incoming.message);

        let start = Instant::now();
        let fut = {
            let _enter = span.enter();
            self.inner.call(call)
        };

        Box::pin(
            async move {
                let result = fut.await;
                let elapsed = start.elapsed();
                let cost_ms = elapsed.as_millis() as u64;

                match &result {
                    Ok(response) => tracing::info!(
                        upstream_address = %upstream_address,
                        upstream_service = %upstream_service,
                        upstream_method = %upstream_method,
                        service = %service,
                        method = %method,
                        cost_ms,
                        req = %request,
                        resp = ?response,
                        "Served call"
                    ),
                    Err(error) => tracing::warn!(
                        upstream_address = %upstream_address,
                        upstream_service = %upstream_service,
                        upstream_method = %upstream_method,
                        service = %service,
                        method = %method,
                        cost_ms,
                        req = %request,
                        error = ?error,
                        "Served call with error"
                    ),
                }
                metrics::record_rpc_server(&service, &method, elapsed);

                result
            }
            .instrument(span),
        )
    }
}
