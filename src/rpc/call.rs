//! Unary call envelopes exchanged between the transport, the interceptors
//! and handlers.

use std::net::SocketAddr;
use std::panic::Location;

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::context::CallContext;

/// Inbound call as delivered by the transport, before any context exists.
#[derive(Debug, Clone)]
pub struct Incoming<T> {
    /// Full route, e.g. `/billing/Charge`.
    pub route: String,
    /// Wire metadata sent by the caller.
    pub headers: HeaderMap,
    /// Caller address, when the transport exposes one.
    pub peer_addr: Option<SocketAddr>,
    pub message: T,
}

impl<T> Incoming<T> {
    pub fn new(route: impl Into<String>, headers: HeaderMap, message: T) -> Self {
        Self {
            route: route.into(),
            headers,
            peer_addr: None,
            message,
        }
    }

    pub fn with_peer(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }
}

/// A call bound to a context: what handlers receive and what callers send.
#[derive(Debug, Clone)]
pub struct UnaryCall<T> {
    pub ctx: CallContext,
    pub route: String,
    pub message: T,
    /// Source location that built the call, for outbound calls.
    pub origin: Option<&'static Location<'static>>,
}

impl<T> UnaryCall<T> {
    /// Outbound call issued from the caller's location.
    #[track_caller]
    pub fn new(ctx: CallContext, route: impl Into<String>, message: T) -> Self {
        Self {
            ctx,
            route: route.into(),
            message,
            origin: Some(Location::caller()),
        }
    }

    /// Call handed to a handler by the server side.
    pub fn inbound(ctx: CallContext, route: impl Into<String>, message: T) -> Self {
        Self {
            ctx,
            route: route.into(),
            message,
            origin: None,
        }
    }
}

/// Outbound call as handed to the transport.
#[derive(Debug, Clone)]
pub struct Outgoing<T> {
    pub route: String,
    pub headers: HeaderMap,
    pub message: T,
}

/// Canonical failure classes of a unary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    DeadlineExceeded,
    Unavailable,
    Internal,
    Unknown,
}

impl Code {
    /// HTTP status used when the code crosses the wire.
    pub fn http_status(self) -> StatusCode {
        match self {
            Code::InvalidArgument => StatusCode::BAD_REQUEST,
            Code::NotFound => StatusCode::NOT_FOUND,
            Code::AlreadyExists => StatusCode::CONFLICT,
            Code::PermissionDenied => StatusCode::FORBIDDEN,
            Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Code::Internal | Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Best guess for a status that arrived without an error body.
    pub fn from_http_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Code::InvalidArgument,
            StatusCode::NOT_FOUND => Code::NotFound,
            StatusCode::CONFLICT => Code::AlreadyExists,
            StatusCode::FORBIDDEN => Code::PermissionDenied,
            StatusCode::TOO_MANY_REQUESTS => Code::ResourceExhausted,
            StatusCode::GATEWAY_TIMEOUT => Code::DeadlineExceeded,
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => Code::Unavailable,
            s if s.is_server_error() => Code::Internal,
            _ => Code::Unknown,
        }
    }
}

/// Error of a unary call, as returned by handlers and seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct RpcStatus {
    pub code: Code,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}
