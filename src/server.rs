//! HTTP surface.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/pipeline` | Run the pipeline for `{email, source}` |
//!
//! The pipeline is blocking (HTTP client and SQLite), so each request runs on
//! tokio's blocking pool. Malformed bodies are rejected by axum's `Json`
//! extractor; a storage failure becomes a 500.
use crate::pipeline::{Pipeline, PipelineRequest};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

/// Application state shared across handlers.
pub type AppState = Arc<Pipeline>;

pub fn router(pipeline: AppState) -> Router {
    Router::new()
        .route("/pipeline", post(run_pipeline))
        .with_state(pipeline)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, pipeline: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    let local_addr = listener.local_addr().context("resolve listen address")?;
    tracing::info!(addr = %local_addr, db = %pipeline.store().path().display(), "pipeline server listening");
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;
    tracing::info!("pipeline server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: msg.into() })).into_response()
}

/// `POST /pipeline`: run the fan-out and return the aggregated report.
async fn run_pipeline(
    State(pipeline): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> Response {
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(&request)).await;
    match outcome {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(err)) => {
            let description = format!("{err:#}");
            tracing::error!(error = %description, "pipeline run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, description)
        }
        Err(err) => {
            tracing::error!(error = %err, "pipeline task aborted");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "pipeline task aborted")
        }
    }
}
