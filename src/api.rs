//! Ops HTTP surface: liveness, status snapshot, Prometheus metrics.

use axum::{extract::State, routing::get, Json, Router};

use crate::metrics::Metrics;
use crate::status::{StatusSnapshot, StatusSource};

pub fn create_router(status: StatusSource, metrics: &Metrics) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status_json))
        .with_state(status)
        .merge(metrics.router())
}

async fn status_json(State(status): State<StatusSource>) -> Json<StatusSnapshot> {
    Json(status.snapshot())
}
