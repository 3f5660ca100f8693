mod images;
mod process;
mod upload;

use axum::Json;
use serde::Serialize;

pub use images::{delete_image, get_image, list_images};
pub use process::{complete_processing, get_processing_status, trigger_processing};
pub use upload::{create_upload, get_annotations, get_upload_status};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
