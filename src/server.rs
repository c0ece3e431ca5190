//! HTTP control surface.
//!
//! - `GET /health`: [`HealthReport`](crate::HealthReport) as JSON
//! - `POST /trigger`: start a cycle now; `202` when accepted, `409` once the
//!   loop has stopped for good

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::control::LoopHandle;
use crate::poll::LoopState;

#[derive(Debug, Serialize)]
struct TriggerResponse {
    accepted: bool,
    state: LoopState,
}

async fn health(State(handle): State<LoopHandle>) -> impl IntoResponse {
    Json(handle.health().await)
}

async fn trigger(State(handle): State<LoopHandle>) -> impl IntoResponse {
    let accepted = handle.trigger();
    let status = if accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    };
    let body = TriggerResponse {
        accepted,
        state: handle.status().state,
    };
    (status, Json(body))
}

/// Builds the control router.
pub fn router(handle: LoopHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trigger", post(trigger))
        .with_state(handle)
}

/// Serves the control router on `addr` until `cancel` fires.
pub async fn serve(addr: SocketAddr, handle: LoopHandle, cancel: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Control server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(handle))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
