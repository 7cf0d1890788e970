//! HTTP health endpoint
//!
//! Serves `GET /health` from the shared [`HealthStatus`]: 200 with
//! `{"status":"healthy"}`, or 503 with `{"status":"unhealthy","reason":...}`.
//! Every other path is a 404.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use portsync_core::HealthStatus;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Build the health router
pub fn router(health: Arc<HealthStatus>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(health)
}

async fn health_check(State(health): State<Arc<HealthStatus>>) -> impl IntoResponse {
    let snapshot = health.status();
    debug!(
        "Health check: healthy={} reason={:?}",
        snapshot.healthy, snapshot.reason
    );

    let code = if snapshot.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(snapshot.report()))
}

/// Bind the health endpoint on all interfaces
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind health server on {}: {}", addr, e))
}

/// Serve the health endpoint until the task is dropped
pub async fn serve(listener: TcpListener, health: Arc<HealthStatus>) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Health server started on port {}", addr.port());
    }
    axum::serve(listener, router(health)).await?;
    Ok(())
}
