//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from `framework.toml`.
//! Every field has a default so a partial file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration of a mesh process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    /// Identity of this process.
    pub service: ServiceConfig,

    /// HTTP entry point.
    pub http: HttpConfig,

    /// RPC server and client settings.
    pub rpc: RpcConfig,

    /// Peer address resolution.
    pub discovery: DiscoveryConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Process identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name used to label the HTTP (`web.<name>`) and RPC (`rpc.<name>`) servers.
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "mesh".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// First port tried when binding.
    pub start_port: u16,

    /// Number of consecutive ports tried before giving up.
    pub scan_attempts: u16,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// QPS ceiling for routes registered without one.
    pub default_max_qps: u32,

    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            start_port: 6666,
            scan_attempts: 1000,
            request_timeout_secs: 30,
            default_max_qps: 10240,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Interface to bind.
    pub host: String,

    /// First port tried when binding.
    pub start_port: u16,

    /// Number of consecutive ports tried before giving up.
    pub scan_attempts: u16,

    /// Outbound call timeout in seconds.
    pub client_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            start_port: 8888,
            scan_attempts: 1000,
            client_timeout_secs: 10,
        }
    }
}

/// Discovery configuration.
///
/// There is no real discovery: every service name resolves to
/// `static_address`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub static_address: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            static_address: "127.0.0.1:8088".to_string(),
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// When a file log sink starts a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Hourly,
    #[default]
    #[serde(alias = "date")]
    Daily,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error, fatal, all, off).
    pub log_level: String,

    /// Log line encoding.
    pub log_format: LogFormat,

    /// "stdout", "stderr", or a file path.
    pub log_output: String,

    /// Rotation of file output; ignored for stdout/stderr.
    pub log_rotation: LogRotation,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_output: "stdout".to_string(),
            log_rotation: LogRotation::Daily,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
