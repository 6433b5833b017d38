//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mesh_runtime::admission::{AdmissionController, ManualClock};
use mesh_runtime::config::HttpConfig;
use mesh_runtime::http::HttpServer;
use mesh_runtime::lifecycle::Shutdown;
use mesh_runtime::rpc::RpcServer;
use tokio::net::TcpListener;

/// Serve `server` on an ephemeral local port.
pub async fn start_rpc(server: RpcServer, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.serve(listener, rx).await;
    });
    wait_until_listening(addr).await;
    addr
}

/// Serve `server` on an ephemeral local port.
pub async fn start_http(server: HttpServer, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    wait_until_listening(addr).await;
    addr
}

/// HTTP server named `name` whose admission clock is frozen at `clock`.
#[allow(dead_code)]
pub fn http_server_with_clock(name: &str, clock: Arc<ManualClock>) -> HttpServer {
    let admission = Arc::new(AdmissionController::with_clock(clock));
    HttpServer::new(name, HttpConfig::default(), admission)
}

async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server at {} did not start", addr);
}
