//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging/metrics → Bind listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Shutdown::trigger → servers stop accepting → in-flight calls drain
//! ```
//!
//! # Design Decisions
//! - Every long-running task subscribes to one broadcast channel
//! - Startup failures are returned to `main`, which exits non-zero

pub mod shutdown;

pub use shutdown::Shutdown;
