//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request (verb, path)
//!     → key "<VERB>.<path>"
//!     → controller.rs (fixed one-second window per key)
//!     → admitted: continue to handler
//!     → rejected: overflow handler or 503
//! ```
//!
//! # Design Decisions
//! - Fixed window, not sliding: up to 2×limit calls can pass across a second
//!   boundary (limit at the tail of second N, limit at the head of N+1)
//! - Counters are created lazily and never evicted; keys come from the
//!   operator-defined route table, not from clients
//! - Map lookups take a shard read lock; counter updates are a single CAS

pub mod clock;
pub mod controller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{admission_key, AdmissionController, AdmissionCounter};
