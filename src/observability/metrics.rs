//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_admission_rejected_total` (counter): calls shed, by admission key
//! - `mesh_rpc_server_duration_seconds` (histogram): served RPC latency
//! - `mesh_rpc_client_duration_seconds` (histogram): outbound RPC latency
//! - `mesh_http_requests_total` (counter): HTTP requests by method, status
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_admission_rejected(key: &str) {
    counter!("mesh_admission_rejected_total", "key" => key.to_owned()).increment(1);
}

pub fn record_rpc_server(service: &str, method: &str, elapsed: Duration) {
    histogram!(
        "mesh_rpc_server_duration_seconds",
        "service" => service.to_owned(),
        "method" => method.to_owned()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_rpc_client(service: &str, method: &str, elapsed: Duration) {
    histogram!(
        "mesh_rpc_client_duration_seconds",
        "service" => service.to_owned(),
        "method" => method.to_owned()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_http_request(method: &str, status: u16) {
    counter!(
        "mesh_http_requests_total",
        "method" => method.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
}
