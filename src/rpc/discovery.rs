//! Service address resolution.
//!
//! Clients resolve a service name to an address once, when connecting.
//! Only a static resolver ships here; registries plug in behind [`Resolver`].

use std::collections::HashMap;
use std::net::SocketAddr;

/// Error type for address resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no address known for service {0}")]
    Unresolved(String),
    #[error("invalid address {address} for service {service}")]
    BadAddress { service: String, address: String },
}

/// Maps a service name to a dialable address.
pub trait Resolver: Send + Sync {
    fn resolve(&self, service: &str) -> Result<SocketAddr, DiscoveryError>;
}

/// Resolver answering from a fixed table, with an optional catch-all address.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    services: HashMap<String, SocketAddr>,
    fallback: Option<SocketAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that sends every service to `addr`.
    pub fn with_fallback(addr: SocketAddr) -> Self {
        Self {
            services: HashMap::new(),
            fallback: Some(addr),
        }
    }

    /// Resolver built from the configured static address string.
    pub fn from_address(address: &str) -> Result<Self, DiscoveryError> {
        let addr = address.parse().map_err(|_| DiscoveryError::BadAddress {
            service: "*".to_string(),
            address: address.to_string(),
        })?;
        Ok(Self::with_fallback(addr))
    }

    pub fn insert(&mut self, service: impl Into<String>, addr: SocketAddr) -> &mut Self {
        self.services.insert(service.into(), addr);
        self
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, service: &str) -> Result<SocketAddr, DiscoveryError> {
        self.services
            .get(service)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| DiscoveryError::Unresolved(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_entry_wins_over_fallback() {
        let mut resolver = StaticResolver::with_fallback("127.0.0.1:8088".parse().unwrap());
        resolver.insert("billing", "127.0.0.1:9000".parse().unwrap());

        assert_eq!(resolver.resolve("billing").unwrap().port(), 9000);
        assert_eq!(resolver.resolve("orders").unwrap().port(), 8088);
    }

    #[test]
    fn unknown_service_without_fallback() {
        assert_eq!(
            StaticResolver::new().resolve("billing"),
            Err(DiscoveryError::Unresolved("billing".to_string()))
        );
    }

    #[test]
    fn configured_address_must_parse() {
        assert!(StaticResolver::from_address("127.0.0.1:8088").is_ok());
        assert!(matches!(
            StaticResolver::from_address("not-an-address"),
            Err(DiscoveryError::BadAddress { .. })
        ));
    }
}
