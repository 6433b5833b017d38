//! Trace interceptors for unary calls.
//!
//! # Data Flow
//! ```text
//! Inbound (server.rs):
//!     Incoming { route, headers, peer }
//!     → CallContext::from_incoming
//!     → current service/method from route.rs, peer address recorded
//!     → handler(UnaryCall)
//!     → one log line, result returned as-is
//!
//! Outbound (client.rs):
//!     UnaryCall { ctx, route }
//!     → ctx.copy(), current → upstream, upstream address dropped
//!     → Outgoing { headers: ctx.to_wire() }
//!     → transport
//!     → one log line, result returned as-is
//! ```
//!
//! # Design Decisions
//! - Interceptors never add errors of their own; missing identity is logged
//!   as "unknown"
//! - A panicking handler unwinds through the interceptor without a log line
//! - Both directions are plain tower layers, so they compose with any
//!   transport that speaks the call envelopes in `rpc::call`

pub mod client;
pub mod route;
pub mod server;

pub use client::{ClientTrace, ClientTraceLayer};
pub use route::{split_route, RouteName};
pub use server::{ServerTrace, ServerTraceLayer};
