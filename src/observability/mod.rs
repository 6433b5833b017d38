//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-call spans from CallContext)
//!     → metrics.rs (admission rejections, RPC latency, HTTP status counts)
//!
//! Consumers:
//!     → Log sink (stdout, stderr, file)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows through every log line via the call span
//! - Log level is process-wide and only changes at configuration time
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{LogHandle, LoggingError};
