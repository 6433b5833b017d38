//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store registered handlers under exact keys
//! - Reject duplicate registrations at startup
//! - Look up the handler for a request, or report no match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) exact lookup via HashMap, no wildcards
//! - Explicit NoMatch rather than silent default

use std::collections::HashMap;

/// Error type for route registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route already registered: {0}")]
    Duplicate(String),
}

/// Exact-match table from route key to handler.
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    routes: HashMap<String, H>,
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register `handler` under `key`. The first registration wins.
    pub fn insert(&mut self, key: impl Into<String>, handler: H) -> Result<(), RouteError> {
        let key = key.into();
        if self.routes.contains_key(&key) {
            return Err(RouteError::Duplicate(key));
        }
        tracing::info!(route = %key, "Route registered");
        self.routes.insert(key, handler);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&H> {
        self.routes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.routes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
