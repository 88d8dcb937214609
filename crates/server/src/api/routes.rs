use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{conversions, handlers, middleware as api_middleware};
use crate::state::AppState;

/// Multipart framing and base64 inflation on top of the raw file sizes.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = body_limit(&state);
    let concurrency = state.config().server.concurrency.max(1);

    Router::new()
        // Conversions
        .route("/convert", post(conversions::convert))
        .route("/query", get(conversions::query))
        .route("/download", get(conversions::download))
        .route("/conversions/{id}", delete(conversions::delete_conversion))
        // Service
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(api_middleware::powered_by))
        .layer(middleware::from_fn(api_middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(concurrency))
}

/// Largest accepted request body: every file at the size cap, base64 encoded.
fn body_limit(state: &AppState) -> usize {
    let orchestrator = state.orchestrator();
    let max_size = usize::try_from(orchestrator.max_size()).unwrap_or(usize::MAX);
    max_size
        .saturating_mul(orchestrator.max_files())
        .saturating_mul(4)
        / 3
        + BODY_OVERHEAD_BYTES
}
