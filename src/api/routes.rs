use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Headroom on top of the file-size cap for multipart boundaries and part
/// headers, so a file just under the cap still fits in the request body and
/// oversized files hit the handler's own 413 check.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize + MULTIPART_OVERHEAD;

    // The SPA frontend is served from a different origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Uploads
        .route(
            "/api/upload",
            post(handlers::create_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/upload/:id", get(handlers::get_upload_status))
        .route("/api/upload/:id/annotations", get(handlers::get_annotations))
        // Images
        .route("/api/images", get(handlers::list_images))
        .route("/api/images/:id", get(handlers::get_image))
        .route("/api/images/:id", delete(handlers::delete_image))
        // Processing
        .route("/api/process/:id", post(handlers::trigger_processing))
        .route(
            "/api/process/:id/complete",
            post(handlers::complete_processing),
        )
        .route("/api/process/:id/status", get(handlers::get_processing_status))
        // Health
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
