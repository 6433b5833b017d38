//! Well-known metadata keys.
//!
//! Only [`TRACE_ID`] is guaranteed to travel end-to-end. The `temp_` keys
//! describe a single hop and are rewritten by the interceptors at every
//! transition.

/// Trace id shared by every call in one call tree.
pub const TRACE_ID: &str = "persist_trace_id";

/// Service that issued the call currently being served.
pub const UPSTREAM_SERVICE: &str = "temp_upstream_service";

/// Method that issued the call currently being served.
pub const UPSTREAM_METHOD: &str = "temp_upstream_method";

/// Method currently being served by this process.
pub const CURRENT_METHOD: &str = "temp_current_method";

/// Service currently being served by this process.
pub const CURRENT_SERVICE: &str = "temp_current_service";

/// Network address of the caller, as seen by the transport.
pub const UPSTREAM_ADDRESS: &str = "temp_upstream_address";

/// Placeholder logged when an identity field is absent.
pub const UNKNOWN: &str = "unknown";

/// Prefixes of the keys owned by this runtime.
///
/// Used to pick trace fields out of header maps that also carry unrelated
/// transport headers (host, user-agent, ...).
pub const OWNED_PREFIXES: [&str; 2] = ["persist_", "temp_"];

/// Returns true if `key` belongs to the trace context.
pub fn is_trace_key(key: &str) -> bool {
    OWNED_PREFIXES
        .iter()
        .any(|prefix| key.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_keys_are_recognized() {
        assert!(is_trace_key(TRACE_ID));
        assert!(is_trace_key(UPSTREAM_ADDRESS));
        assert!(is_trace_key("TEMP_custom"));
        assert!(!is_trace_key("host"));
        assert!(!is_trace_key("temp"));
    }
}
