//! Request-side helpers.
//!
//! # Responsibilities
//! - Derive the route key (`<path>_<VERB>`) of a request
//! - Build the call context of a request from its trace headers
//!
//! # Design Decisions
//! - Only `persist_`/`temp_` headers enter the bag; ordinary headers
//!   (cookies, auth) are never forwarded downstream
//! - A missing trace id starts a new call tree

use std::net::SocketAddr;

use axum::http::{HeaderMap, Method};

use crate::context::{keys, CallContext};

/// Route table key for `path` and `method`, e.g. `/orders_POST`.
pub fn entry_point(path: &str, method: &Method) -> String {
    format!("{}_{}", path, method.as_str())
}

/// Context for an inbound HTTP request served by `server_name`.
pub fn context_for(
    server_name: &str,
    headers: &HeaderMap,
    path: &str,
    method: &Method,
    peer_addr: Option<SocketAddr>,
) -> CallContext {
    let ctx = CallContext::from_incoming(headers);
    ctx.set_pairs([
        (keys::CURRENT_SERVICE, server_name.to_string()),
        (keys::CURRENT_METHOD, entry_point(path, method)),
    ]);
    match peer_addr {
        Some(addr) => ctx.insert(keys::UPSTREAM_ADDRESS, addr.to_string()),
        None => ctx.del(&[keys::UPSTREAM_ADDRESS]),
    }
    ctx
}
