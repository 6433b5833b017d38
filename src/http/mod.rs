//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, TraceLayer, timeout, body limit)
//!     → entry: OPTIONS → 200
//!     → request.rs (trace headers → CallContext, route key)
//!     → route lookup (miss → 404)
//!     → admission (<VERB>.<path>; over limit → overflow handler | 503)
//!     → before-request middlewares (may short-circuit)
//!     → handler(ctx, request)
//!     → response.rs (echo persist_trace_id)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Exact `(verb, path)` routing; registration errors surface at startup
//! - One shared `AdmissionController` per process, keyed per route
//! - Handlers get the raw request; `ApiResponse` is a convenience, not a rule

pub mod request;
pub mod response;
pub mod server;

pub use response::{reply_json, ApiResponse};
pub use server::{handler, Handler, HttpServer, Middleware, Route};
