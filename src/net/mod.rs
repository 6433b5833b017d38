//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! configured host + start port
//!     → listener.rs (scan upward until a port binds)
//!     → TcpListener handed to the HTTP or RPC server
//! ```
//!
//! # Design Decisions
//! - Several processes of one service can share a host without port config
//! - The bound address is logged; discovery is told out of band

pub mod listener;

pub use listener::{bind_scan, BindError};
