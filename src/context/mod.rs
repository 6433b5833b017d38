//! Request-scoped trace context.
//!
//! # Data Flow
//! ```text
//! Inbound call headers
//!     → bag.rs (Metadata::from_wire)
//!     → propagator.rs (CallContext::from_incoming, mint trace id if missing)
//!     → handler reads/writes fields via CallContext
//!
//! Outbound call:
//!     CallContext::copy (independent bag per branch)
//!     → CallContext::to_wire
//!     → transport headers
//! ```
//!
//! # Design Decisions
//! - The bag is reached through an explicit `CallContext` parameter, so a
//!   context without a bag cannot exist
//! - One reader/writer lock per bag; bags are never shared across fan-out
//! - Only `persist_trace_id` is guaranteed end-to-end; `temp_` keys are
//!   rewritten at each hop

pub mod bag;
pub mod keys;
pub mod propagator;

pub use bag::{Metadata, MetadataBag};
pub use propagator::{new_trace_id, CallContext, ContextError};
