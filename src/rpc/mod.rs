//! Unary RPC transport.
//!
//! # Data Flow
//! ```text
//! caller                                             callee
//! ──────                                             ──────
//! RpcClient::call                                    RpcServer::dispatch
//!   │ ClientTrace (ctx copy → wire headers)            │ route lookup
//!   │ JSON encode                                      │ JSON decode
//!   └──── POST /<service>/<method> + headers ────────▶ │ ServerTrace (headers → ctx)
//!                                                      │ handler(ctx, req)
//!   ◀──── 200 JSON | <status> RpcStatus JSON ───────── ┘
//! ```
//!
//! # Design Decisions
//! - Calls are plain HTTP/1.1 POSTs; metadata rides in request headers
//! - Failures cross the wire as a JSON [`RpcStatus`] with a matching HTTP status
//! - Addresses are resolved once per client through a [`Resolver`]

pub mod call;
pub mod client;
pub mod discovery;
pub mod server;

pub use call::{Code, Incoming, Outgoing, RpcStatus, UnaryCall};
pub use client::{HttpTransport, JsonTransport, RpcClient};
pub use discovery::{DiscoveryError, Resolver, StaticResolver};
pub use server::RpcServer;
