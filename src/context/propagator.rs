//! Call context: the handle through which handlers reach their metadata bag.

use std::sync::Arc;

use http::HeaderMap;
use uuid::Uuid;

use crate::context::bag::{Metadata, MetadataBag};
use crate::context::keys;

/// Error type for context operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// `set` received a key without a value.
    #[error("metadata: odd number of key/value arguments: {0}")]
    OddArguments(usize),
}

/// Mint a new globally unique trace id.
pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Request-scoped context carrying exactly one metadata bag.
///
/// Cloning a `CallContext` shares the bag: the clone belongs to the same call.
/// Use [`CallContext::copy`] to branch into an independent bag before fanning
/// out to concurrent outbound calls.
#[derive(Debug, Clone)]
pub struct CallContext {
    bag: Arc<MetadataBag>,
}

impl CallContext {
    /// Root of a new call tree, seeded with a fresh trace id.
    pub fn new() -> Self {
        let mut md = Metadata::new();
        md.set(keys::TRACE_ID, new_trace_id());
        Self::from_metadata(md)
    }

    /// Context for a call that arrived with wire metadata.
    ///
    /// Only `persist_`/`temp_` headers enter the bag; transport headers such
    /// as `host` or `content-length` stay with the hop that carried them.
    /// A missing or empty trace id starts a new call tree.
    pub fn from_incoming(headers: &HeaderMap) -> Self {
        Self::rehydrate(Metadata::from_wire_filtered(headers, keys::is_trace_key))
    }

    /// Context from inbound metadata if any, otherwise a new root.
    pub fn new_with(incoming: Option<&HeaderMap>) -> Self {
        match incoming {
            Some(headers) => Self::from_incoming(headers),
            None => Self::new(),
        }
    }

    /// Context from metadata that already went through the transport.
    pub fn rehydrate(mut md: Metadata) -> Self {
        if md.get(keys::TRACE_ID).map_or(true, str::is_empty) {
            md.set(keys::TRACE_ID, new_trace_id());
        }
        Self::from_metadata(md)
    }

    fn from_metadata(md: Metadata) -> Self {
        Self {
            bag: Arc::new(MetadataBag::new(md)),
        }
    }

    /// New context holding a value copy of this one's bag.
    pub fn copy(&self) -> Self {
        Self::from_metadata(self.bag.snapshot())
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.bag.read().get(key).map(str::to_owned)
    }

    /// Like [`CallContext::get`], with the `"unknown"` placeholder.
    pub fn get_or_unknown(&self, key: &str) -> String {
        self.get(key).unwrap_or_else(|| keys::UNKNOWN.to_string())
    }

    /// Write alternating key/value pairs.
    ///
    /// An odd-length list is a caller bug: nothing is written and
    /// [`ContextError::OddArguments`] is returned.
    pub fn set<S: AsRef<str>>(&self, kvs: &[S]) -> Result<(), ContextError> {
        if kvs.len() % 2 == 1 {
            return Err(ContextError::OddArguments(kvs.len()));
        }

        let mut md = self.bag.write();
        for pair in kvs.chunks_exact(2) {
            md.set(pair[0].as_ref(), pair[1].as_ref());
        }
        Ok(())
    }

    /// Write key/value pairs under one lock acquisition.
    pub fn set_pairs<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut md = self.bag.write();
        for (key, value) in pairs {
            md.set(key.as_ref(), value);
        }
    }

    /// Write a single key.
    pub fn insert(&self, key: &str, value: impl Into<String>) {
        self.bag.write().set(key, value);
    }

    /// Remove keys. Absent keys are ignored.
    pub fn del<S: AsRef<str>>(&self, keys: &[S]) {
        let mut md = self.bag.write();
        for key in keys {
            md.remove(key.as_ref());
        }
    }

    /// Snapshot of the bag in transport header form.
    pub fn to_wire(&self) -> HeaderMap {
        self.bag.read().to_wire()
    }

    /// Value copy of the bag contents.
    pub fn metadata(&self) -> Metadata {
        self.bag.snapshot()
    }

    /// Trace id of this call tree.
    pub fn trace_id(&self) -> String {
        self.get_or_unknown(keys::TRACE_ID)
    }

    /// Span correlating log lines with this call.
    pub fn span(&self) -> tracing::Span {
        let md = self.bag.read();
        let field = |key: &str| md.get(key).unwrap_or(keys::UNKNOWN).to_string();
        tracing::info_span!(
            "call",
            trace_id = %field(keys::TRACE_ID),
            service = %field(keys::CURRENT_SERVICE),
            method = %field(keys::CURRENT_METHOD),
        )
    }

    /// True if both handles point at the same bag.
    pub fn shares_bag_with(&self, other: &CallContext) -> bool {
        Arc::ptr_eq(&self.bag, &other.bag)
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn set_then_get() {
        let ctx = CallContext::new();
        ctx.set(&["temp_current_method", "CreateOrder"]).unwrap();
        assert_eq!(ctx.get("temp_current_method").as_deref(), Some("CreateOrder"));
    }

    #[test]
    fn odd_set_applies_nothing() {
        let ctx = CallContext::new();
        let before = ctx.metadata();

        let err = ctx.set(&["a", "1", "b"]).unwrap_err();
        assert_eq!(err, ContextError::OddArguments(3));
        assert_eq!(ctx.get("a"), None);
        assert_eq!(ctx.metadata(), before);
    }

    #[test]
    fn get_on_unset_key_is_none() {
        let ctx = CallContext::new();
        assert_eq!(ctx.get(keys::UPSTREAM_METHOD), None);
        assert_eq!(ctx.get_or_unknown(keys::UPSTREAM_METHOD), "unknown");
    }

    #[test]
    fn copy_does_not_alias() {
        let source = CallContext::new();
        source.insert("k", "source");

        let branch = source.copy();
        assert!(!branch.shares_bag_with(&source));
        assert_eq!(branch.get("k").as_deref(), Some("source"));

        branch.insert("k", "branch");
        source.insert("only_source", "x");
        assert_eq!(source.get("k").as_deref(), Some("source"));
        assert_eq!(branch.get("only_source"), None);
        assert_eq!(branch.trace_id(), source.trace_id());
    }

    #[test]
    fn clone_shares_the_bag() {
        let ctx = CallContext::new();
        let same = ctx.clone();
        same.insert("k", "v");
        assert!(same.shares_bag_with(&ctx));
        assert_eq!(ctx.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn del_removes_and_ignores_missing() {
        let ctx = CallContext::new();
        ctx.insert("a", "1");
        ctx.del(&["a", "never_set"]);
        assert_eq!(ctx.get("a"), None);
        assert!(ctx.get(keys::TRACE_ID).is_some());
    }

    #[test]
    fn fresh_trace_ids_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = CallContext::new().trace_id();
            assert!(!id.is_empty());
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn incoming_trace_id_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(keys::TRACE_ID, "trace-from-caller".parse().unwrap());
        headers.insert(keys::UPSTREAM_METHOD, "CreateOrder".parse().unwrap());

        let ctx = CallContext::new_with(Some(&headers));
        assert_eq!(ctx.trace_id(), "trace-from-caller");
        assert_eq!(ctx.get(keys::UPSTREAM_METHOD).as_deref(), Some("CreateOrder"));
    }

    #[test]
    fn incoming_without_trace_id_starts_new_tree() {
        let mut headers = HeaderMap::new();
        headers.insert(keys::UPSTREAM_METHOD, "CreateOrder".parse().unwrap());

        let ctx = CallContext::from_incoming(&headers);
        assert!(!ctx.trace_id().is_empty());
        assert_ne!(ctx.trace_id(), "unknown");
    }

    #[test]
    fn wire_round_trip_preserves_reads() {
        let ctx = CallContext::new();
        ctx.set(&[
            keys::CURRENT_SERVICE,
            "orders",
            keys::CURRENT_METHOD,
            "CreateOrder",
            keys::UPSTREAM_ADDRESS,
            "10.0.0.7:51234",
        ])
        .unwrap();

        let back = CallContext::from_incoming(&ctx.to_wire());
        for (key, _) in ctx.metadata().iter() {
            assert_eq!(back.get(key), ctx.get(key), "key {key}");
        }
    }

    #[test]
    fn incoming_transport_headers_stay_out_of_the_bag() {
        let mut headers = HeaderMap::new();
        headers.insert(keys::TRACE_ID, "t-1".parse().unwrap());
        headers.insert("host", "127.0.0.1:9000".parse().unwrap());
        headers.insert("content-length", "11".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());

        let md = CallContext::from_incoming(&headers).metadata();
        assert_eq!(md.len(), 1);
        assert_eq!(md.get(keys::TRACE_ID), Some("t-1"));
    }
}
