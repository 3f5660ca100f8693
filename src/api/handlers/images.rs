use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::tracker::UploadRecord;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn list_images(State(state): State<Arc<AppState>>) -> Json<Vec<UploadRecord>> {
    Json(state.tracker.list_all())
}

pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UploadRecord>, ApiError> {
    let record = state.tracker.get_status(&id)?;
    Ok(Json(record))
}

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tracker.delete_asset(&id).await?;

    tracing::debug!(upload_id = %id, "Deleted image");
    Ok(Json(MessageResponse {
        message: "Image deleted successfully".to_string(),
    }))
}
