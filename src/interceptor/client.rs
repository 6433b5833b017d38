//! Client-side trace interceptor.
//!
//! Every outbound call runs on an independent copy of the caller's bag, in
//! which this process's current identity becomes the callee's upstream
//! identity.

use std::fmt::Debug;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::context::keys;
use crate::interceptor::route::split_route;
use crate::observability::metrics;
use crate::rpc::call::{Outgoing, UnaryCall};

/// Label for this process, `<process>-<binary name>`.
///
/// Used as the upstream service of calls issued outside any served call.
pub fn process_label() -> String {
    let name = std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| keys::UNKNOWN.to_string());
    format!("<process>-<{}>", name)
}

/// Label for a call site, `<local>-<file:line>`.
pub fn call_site_label(origin: Option<&'static Location<'static>>) -> String {
    match origin {
        Some(loc) => format!("<local>-<{}:{}>", loc.file(), loc.line()),
        None => format!("<local>-<{}>", keys::UNKNOWN),
    }
}

/// Tower layer installing [`ClientTrace`] in front of a transport.
#[derive(Debug, Clone)]
pub struct ClientTraceLayer {
    process_label: Arc<str>,
}

impl ClientTraceLayer {
    pub fn new() -> Self {
        Self::with_process_label(process_label())
    }

    /// Layer using `label` when the caller has no current service.
    pub fn with_process_label(label: impl Into<String>) -> Self {
        Self {
            process_label: Arc::from(label.into()),
        }
    }
}

impl Default for ClientTraceLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for ClientTraceLayer {
    type Service = ClientTrace<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientTrace {
            inner,
            process_label: self.process_label.clone(),
        }
    }
}

/// Service wrapper that forwards the caller's context on every outbound call.
#[derive(Debug, Clone)]
pub struct ClientTrace<S> {
    inner: S,
    process_label: Arc<str>,
}

impl<S, Req> Service<UnaryCall<Req>> for ClientTrace<S>
where
    S: Service<Outgoing<Req>>,
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

    fn call(&mut self, call: UnaryCall<Req>) -> Self::Future {
        let UnaryCall {
            ctx,
            route,
            message,
            origin,
        } = call;
        let ctx = ctx.copy();

        let upstream_service = ctx.get_or_unknown(keys::UPSTREAM_SERVICE);
        let upstream_method = ctx.get_or_unknown(keys::UPSTREAM_METHOD);

        let current_method = ctx
            .get(keys::CURRENT_METHOD)
            .unwrap_or_else(|| call_site_label(origin));
        let current_service = ctx
            .get(keys::CURRENT_SERVICE)
            .unwrap_or_else(|| self.process_label.to_string());
        ctx.set_pairs([
            (keys::UPSTREAM_METHOD, current_method.clone()),
            (keys::UPSTREAM_SERVICE, current_service.clone()),
        ]);
        // The recorded address is our caller's, not something the callee may reuse.
        ctx.del(&[keys::UPSTREAM_ADDRESS]);

        let (downstream_service, downstream_method) = match split_route(&route) {
            Some((service, method)) => (service.to_string(), method.to_string()),
            None => (keys::UNKNOWN.to_string(), route.clone()),
        };

        let request = format!("{:?}", message);
        let span = ctx.span();
        let outgoing = Outgoing {
            route,
            headers: ctx.to_wire(),
            message,
        };

        let start = Instant::now();
        let fut = {
            let _enter = span.enter();
            self.inner.call(outgoing)
        };

        Box::pin(
            async move {
                let result = fut.await;
                let elapsed = start.elapsed();
                let cost_ms = elapsed.as_millis() as u64;

                match &result {
                    Ok(response) => tracing::info!(
                        upstream_service = %upstream_service,
                        upstream_method = %upstream_method,
                        downstream_service = %downstream_service,
                        downstream_method = %downstream_method,
                        current_service = %current_service,
                        current_method = %current_method,
                        cost_ms,
                        req = %request,
                        resp = ?response,
                        "Issued call"
                    ),
                    Err(error) => tracing::warn!(
                        upstream_service = %upstream_service,
                        upstream_method = %upstream_method,
                        downstream_service = %downstream_service,
                        downstream_method = %downstream_method,
                        current_service = %current_service,
                        current_method = %current_method,
                        cost_ms,
                        req = %request,
                        error = ?error,
                        "Issued call with error"
                    ),
                }
                metrics::record_rpc_client(&downstream_service, &downstream_method, elapsed);

                result
            }
            .instrument(span),
        )
    }
}
