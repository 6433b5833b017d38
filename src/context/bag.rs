//! Per-call metadata storage and its wire form.
//!
//! # Responsibilities
//! - Hold the ordered key → values mapping of one logical request
//! - Serialize to and from the transport's header map
//!
//! # Design Decisions
//! - Keys are lowercased on every access, matching HTTP/2 header semantics
//! - Reads return the first value; writes replace the whole value set
//! - Entries that cannot be represented as headers are skipped, never fatal

use http::header::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Plain ordered metadata, without synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, Vec<String>)>,
}

fn normalize(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata from key/value pairs. Later pairs replace earlier ones.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut md = Self::new();
        for (key, value) in pairs {
            md.set(key.as_ref(), value);
        }
        md
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key)
            .and_then(|idx| self.entries[idx].1.first())
            .map(String::as_str)
    }

    /// Every value stored under `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        match self.position(key) {
            Some(idx) => &self.entries[idx].1,
            None => &[],
        }
    }

    /// Replace the value set of `key` with a single value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(key) {
            Some(idx) => self.entries[idx].1 = vec![value],
            None => self.entries.push((normalize(key), vec![value])),
        }
    }

    /// Add a value to `key` without dropping the existing ones.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(key) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self.entries.push((normalize(key), vec![value])),
        }
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys and their value sets.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Snapshot into a transport header map.
    pub fn to_wire(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(self.entries.len());
        for (key, values) in &self.entries {
            let name = match HeaderName::from_bytes(key.as_bytes()) {
                Ok(name) => name,
                Err(_) => {
                    tracing::warn!(key = %key, "Metadata key is not a valid header name, skipped");
                    continue;
                }
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => {
                        headers.append(name.clone(), value);
                    }
                    Err(_) => {
                        tracing::warn!(key = %key, "Metadata value is not a valid header value, skipped");
                    }
                }
            }
        }
        headers
    }

    /// Rebuild metadata from a transport header map.
    ///
    /// Values are decoded as UTF-8, so anything [`Metadata::to_wire`] sent
    /// reads back unchanged. Values that are not UTF-8 are dropped.
    pub fn from_wire(headers: &HeaderMap) -> Self {
        Self::from_wire_filtered(headers, |_| true)
    }

    /// Like [`Metadata::from_wire`], keeping only the keys accepted by `keep`.
    pub fn from_wire_filtered(headers: &HeaderMap, keep: impl Fn(&str) -> bool) -> Self {
        let mut md = Self::new();
        for (name, value) in headers {
            if !keep(name.as_str()) {
                continue;
            }
            match std::str::from_utf8(value.as_bytes()) {
                Ok(value) => md.append(name.as_str(), value),
                Err(_) => {
                    tracing::warn!(key = %name, "Metadata value is not UTF-8, dropped");
                }
            }
        }
        md
    }
}

/// Metadata behind a reader/writer lock.
///
/// One bag exists per call; it is shared only between a caller and the
/// handler it invoked directly.
#[derive(Debug, Default)]
pub struct MetadataBag {
    inner: RwLock<Metadata>,
}

impl MetadataBag {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            inner: RwLock::new(metadata),
        }
    }

    /// Rebuild a bag from transport headers.
    pub fn from_wire(headers: &HeaderMap) -> Self {
        Self::new(Metadata::from_wire(headers))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Metadata> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Metadata> {
        self.inner.write()
    }

    /// Value copy of the current contents.
    pub fn snapshot(&self) -> Metadata {
        self.inner.read().clone()
    }
}
