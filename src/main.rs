//! mesh-runtime demo process.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP client                                     this process
//!     ───────────                ┌───────────────────────────────────────────────────┐
//!                                │                                                   │
//!     POST /orders  ─────────────┼─▶ HttpServer (web.<name>)                         │
//!                                │     admission (POST./orders) → handler            │
//!                                │        │                                          │
//!                                │        │ RpcClient::call(ctx, /billing/Charge)    │
//!                                │        ▼                                          │
//!                                │   ClientTrace ── POST + trace headers ──┐         │
//!                                │                                         ▼         │
//!                                │                          RpcServer (rpc.<name>)   │
//!                                │                            ServerTrace → Charge   │
//!                                │                                                   │
//!                                │  config (framework.toml + watcher) · logging ·    │
//!                                │  metrics · lifecycle (Ctrl+C)                     │
//!                                └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::{body::Body, http::Request};
use clap::Parser;
use serde::{Deserialize, Serialize};

use mesh_runtime::config::watcher::ConfigWatcher;
use mesh_runtime::config::{discover_config, load_config, ConfigError, MeshConfig};
use mesh_runtime::context::keys;
use mesh_runtime::http::{ApiResponse, HttpServer};
use mesh_runtime::net::bind_scan;
use mesh_runtime::observability::{logging, metrics};
use mesh_runtime::rpc::{RpcClient, RpcServer, RpcStatus, StaticResolver};
use mesh_runtime::{AdmissionController, CallContext, Shutdown};

#[derive(Parser)]
#[command(name = "mesh-runtime")]
#[command(about = "HTTP and RPC services with call-context tracing and admission control", long_about = None)]
struct Cli {
    /// Configuration file. Searched as framework.toml in ./, ./conf/, ../conf/, ../../conf/ if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChargeRequest {
    order_id: String,
    cents: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChargeReply {
    order_id: String,
    charged: u64,
    charged_by: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrder {
    order_id: String,
    cents: u64,
}

async fn charge(ctx: CallContext, req: ChargeRequest) -> Result<ChargeReply, RpcStatus> {
    if req.cents == 0 {
        return Err(RpcStatus::invalid_argument("nothing to charge"));
    }
    tracing::info!(
        order_id = %req.order_id,
        upstream_service = %ctx.get_or_unknown(keys::UPSTREAM_SERVICE),
        "Charging order"
    );
    Ok(ChargeReply {
        order_id: req.order_id,
        charged: req.cents,
        charged_by: ctx.get_or_unknown(keys::CURRENT_SERVICE),
    })
}

async fn create_order(billing: Arc<RpcClient>, ctx: CallContext, request: Request<Body>) -> ApiResponse {
    let body = match axum::body::to_bytes(request.into_body(), 64 * 1024).await {
        Ok(body) => body,
        Err(e) => return ApiResponse::error(400, format!("unreadable body: {}", e)),
    };
    let order: CreateOrder = match serde_json::from_slice(&body) {
        Ok(order) => order,
        Err(e) => return ApiResponse::error(400, format!("invalid order: {}", e)),
    };

    let charge = ChargeRequest {
        order_id: order.order_id,
        cents: order.cents,
    };
    match billing.call::<_, ChargeReply>(&ctx, "/billing/Charge", charge).await {
        Ok(reply) => match serde_json::to_value(reply) {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => ApiResponse::error(500, e.to_string()),
        },
        Err(status) => ApiResponse::error(502, status.to_string()),
    }
}

fn resolve_config(cli: &Cli) -> Result<(Option<PathBuf>, MeshConfig), ConfigError> {
    if let Some(path) = &cli.config {
        return Ok((Some(path.clone()), load_config(path)?));
    }
    let base = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    match discover_config(&base) {
        Ok((path, config)) => Ok((Some(path), config)),
        Err(ConfigError::NotFound { .. }) => Ok((None, MeshConfig::default())),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config_path, config) = resolve_config(&cli)?;

    let log_handle = logging::init(&config.observability)?;
    tracing::info!(service = %config.service.name, "mesh-runtime v0.1.0 starting");
    match &config_path {
        Some(path) => tracing::info!(path = %path.display(), "Configuration loaded"),
        None => tracing::warn!("No framework.toml found, using defaults"),
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Some(path) = &config_path {
        let mut updates = ConfigWatcher::new(path).spawn(config.observability.log_level.clone())?;
        let handle = log_handle.clone();
        tokio::spawn(async move {
            while let Some(level) = updates.changed().await {
                if let Err(e) = handle.set_level(&level) {
                    tracing::error!(error = %e, "Failed to apply reloaded log level");
                }
            }
        });
    }

    let shutdown = Shutdown::new();

    // RPC side
    let rpc_listener = bind_scan(&config.rpc.host, config.rpc.start_port, config.rpc.scan_attempts).await?;
    let rpc_addr = rpc_listener.local_addr()?;
    let mut rpc_server = RpcServer::new(&config.service.name);
    rpc_server.unary("/billing/Charge", charge)?;
    let rpc_task = tokio::spawn(rpc_server.serve(rpc_listener, shutdown.subscribe()));

    // Clients of this process resolve to the local RPC listener.
    let mut resolver = StaticResolver::from_address(&config.discovery.static_address)?;
    resolver.insert("billing", rpc_addr);
    let billing = Arc::new(RpcClient::connect("billing", &resolver, &config.rpc)?);

    // HTTP side
    let admission = Arc::new(AdmissionController::new());
    let mut http_server = HttpServer::new(&config.service.name, config.http.clone(), admission);
    http_server.post("/orders", move |ctx, request| create_order(billing.clone(), ctx, request))?;
    let http_listener = bind_scan(&config.http.host, config.http.start_port, config.http.scan_attempts).await?;
    let http_task = tokio::spawn(http_server.run(http_listener, shutdown.subscribe()));

    shutdown.trigger_on_ctrl_c().await?;

    rpc_task.await??;
    http_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_config_is_an_io_error_naming_the_path() {
        let missing = std::env::temp_dir().join(format!("mesh-missing-{}", uuid::Uuid::new_v4()));
        let cli = Cli {
            config: Some(missing.join("framework.toml")),
        };
        match resolve_config(&cli) {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing.join("framework.toml")),
            other => panic!("expected an io error, got {:?}", other.map(|(path, _)| path)),
        }
    }
}
