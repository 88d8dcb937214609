use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use webpit_core::StatusSnapshot;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Service limits as configured.
#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    pub max_files: usize,
    pub max_size_bytes: u64,
    pub max_conversions: usize,
    pub min_free_space_bytes: u64,
    pub ttl_secs: u64,
}

/// Scheduler status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    /// Records per status at the last scheduler pass
    pub conversions: StatusSnapshot,
    pub converting_images: usize,
    pub converting_videos: usize,
    pub registered: usize,
    pub disk_free_bytes: Option<u64>,
    pub accepts_uploads: bool,
    pub limits: LimitsResponse,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let orchestrator = state.orchestrator();
    let config = orchestrator.config();

    Json(StatusResponse {
        running: orchestrator.is_running(),
        conversions: orchestrator.status(),
        converting_images: orchestrator.converting_images(),
        converting_videos: orchestrator.converting_videos(),
        registered: orchestrator.registered(),
        disk_free_bytes: orchestrator.disk_free_space(),
        accepts_uploads: orchestrator.accepts_uploads(),
        limits: LimitsResponse {
            max_files: orchestrator.max_files(),
            max_size_bytes: orchestrator.max_size(),
            max_conversions: orchestrator.max_conversions(),
            min_free_space_bytes: config.min_free_space_bytes(),
            ttl_secs: config.ttl_secs,
        },
    })
}

/// GET /metrics (Prometheus text format)
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        encode_metrics(),
    )
}
