//! Liveness endpoints for the hosting platform.

use anyhow::{Context, Result};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

async fn root() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// `GET`/`HEAD` on `/` and `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

/// Bind `0.0.0.0:port` and serve in the background.  Binding errors are
/// returned; serving errors are only logged.
pub async fn spawn(port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind health port {port}"))?;
    info!("Health endpoint listening on 0.0.0.0:{port}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            warn!("Health server stopped: {e}");
        }
    });
    Ok(())
}
