// src/api.rs
//! Read-only HTTP view of a running pipeline: health, unit status, metrics.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::collections::BTreeMap;

use crate::metrics::Metrics;
use crate::status::PipelineStatus;
use crate::stop::StopSignal;

#[derive(Clone)]
pub struct AppState {
    pub status: PipelineStatus,
    pub metrics: Option<Metrics>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.status.snapshot())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(m) => (StatusCode::OK, m.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Serve the router on `addr` until `stop` fires.
pub async fn serve(addr: &str, state: AppState, mut stop: StopSignal) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding status API on {addr}"))?;
    tracing::info!(target: "api", %addr, "status API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { stop.stopped().await })
        .await
        .context("status API server")?;
    Ok(())
}
