//! TCP listener binding with port scanning.
//!
//! # Responsibilities
//! - Bind the first free port from a configured start port
//! - Report which port was taken
//!
//! # Design Decisions
//! - Ports are tried in ascending order; a busy port is logged and skipped
//! - Running out of attempts is a startup error

use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Error type for listener binding.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Host does not form a valid socket address.
    #[error("invalid listen host {host}: {source}")]
    BadHost {
        host: String,
        source: std::net::AddrParseError,
    },
    /// Every port in the scanned range was unavailable.
    #[error("no free port in {start}..{end} on {host}")]
    Exhausted { host: String, start: u16, end: u32 },
}

/// Bind `host` on the first free port in `start_port..start_port + attempts`.
///
/// Port `0` asks the OS for an ephemeral port in a single attempt.
pub async fn bind_scan(host: &str, start_port: u16, attempts: u16) -> Result<TcpListener, BindError> {
    let end = u32::from(start_port) + u32::from(attempts);
    let ports = if start_port == 0 {
        0..=0
    } else {
        start_port..=u16::try_from(end - 1).unwrap_or(u16::MAX)
    };

    for port in ports.take(usize::from(attempts.max(1))) {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|source| BindError::BadHost {
                host: host.to_string(),
                source,
            })?;

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                let local = listener.local_addr().unwrap_or(addr);
                tracing::info!(address = %local, "Listener bound");
                return Ok(listener);
            }
            Err(e) => {
                tracing::warn!(address = %addr, error = %e, "Port unavailable, trying next");
            }
        }
    }

    Err(BindError::Exhausted {
        host: host.to_string(),
        start: start_port,
        end,
    })
}
