//! Service mesh runtime: call-context propagation, trace interceptors and
//! per-route admission control for HTTP and RPC services.

// Per-call state
pub mod admission;
pub mod context;
pub mod interceptor;

// Transports
pub mod http;
pub mod net;
pub mod routing;
pub mod rpc;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use admission::AdmissionController;
pub use config::MeshConfig;
pub use context::CallContext;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rpc::{RpcClient, RpcServer, RpcStatus};
