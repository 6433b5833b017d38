//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     HTTP: "<path>_<VERB>" → handler + QPS ceiling
//!     RPC:  "/<service>/<method>" → traced handler
//!     → router.rs (duplicate check)
//!     → frozen into the server state
//!
//! Request:
//!     key from request → router.rs (exact lookup) → handler or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Exact match only; no prefixes, no wildcards
//! - Deterministic: same input always matches same route

pub mod router;

pub use router::{RouteError, RouteTable};
