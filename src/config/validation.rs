//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, port ranges fit in u16)
//! - Check addresses and level names parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MeshConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::MeshConfig;
use crate::observability::logging::level_directive;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("service.name must not be empty")]
    EmptyServiceName,
    #[error("{section}.start_port must be non-zero")]
    ZeroPort { section: &'static str },
    #[error("{section}: scanning {attempts} ports from {start} runs past 65535")]
    PortRangeOverflow {
        section: &'static str,
        start: u16,
        attempts: u16,
    },
    #[error("{section}.scan_attempts must be non-zero")]
    NoScanAttempts { section: &'static str },
    #[error("{field} must be non-zero")]
    ZeroValue { field: &'static str },
    #[error("{field} is not a socket address: {value}")]
    BadAddress { field: &'static str, value: String },
    #[error("unsupported log level: {0}")]
    UnknownLogLevel(String),
}

fn check_ports(section: &'static str, start: u16, attempts: u16, errors: &mut Vec<ValidationError>) {
    if start == 0 {
        errors.push(ValidationError::ZeroPort { section });
    }
    if attempts == 0 {
        errors.push(ValidationError::NoScanAttempts { section });
    }
    if u32::from(start) + u32::from(attempts) > u32::from(u16::MAX) + 1 {
        errors.push(ValidationError::PortRangeOverflow {
            section,
            start,
            attempts,
        });
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &MeshConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    check_ports("http", config.http.start_port, config.http.scan_attempts, &mut errors);
    check_ports("rpc", config.rpc.start_port, config.rpc.scan_attempts, &mut errors);

    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "http.request_timeout_secs",
        });
    }
    if config.http.default_max_qps == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "http.default_max_qps",
        });
    }
    if config.rpc.client_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "rpc.client_timeout_secs",
        });
    }

    if config.discovery.static_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "discovery.static_address",
            value: config.discovery.static_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if level_directive(&config.observability.log_level).is_none() {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
