use axum::extract::{Multipart, Path, State};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::tracker::{Annotation, UploadRecord};
use crate::AppState;

const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub status: String,
    pub message: String,
    pub filename: String,
    pub original_url: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut image_data: Option<Bytes> = None;
    let mut image_name: Option<String> = None;
    let mut image_content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "image" {
            image_name = field.file_name().map(|s| s.to_string());
            image_content_type = field.content_type().map(|s| s.to_string());

            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

            if data.len() as u64 > state.config.max_upload_size {
                return Err(ApiError::payload_too_large(format!(
                    "File exceeds maximum upload size of {} bytes",
                    state.config.max_upload_size
                )));
            }

            image_data = Some(data);
        }
        // Ignore unknown fields
    }

    let image_data = image_data.ok_or_else(|| ApiError::bad_request("No image file provided"))?;
    let filename = image_name.unwrap_or_else(|| "upload".to_string());

    // Determine MIME type: from multipart Content-Type, or guess from
    // filename, or fallback
    let content_type = image_content_type
        .filter(|ct| ct != "application/octet-stream")
        .or_else(|| {
            mime_guess::from_path(&filename)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    if !ALLOWED_MIME_TYPES.contains(&content_type.as_str()) {
        return Err(ApiError::bad_request(
            "Invalid file type. Only JPEG, PNG, and GIF are allowed.",
        ));
    }

    let record = state
        .tracker
        .begin_upload(&filename, image_data, &content_type)
        .await?;

    tracing::debug!(upload_id = %record.id, filename = %record.filename, "Accepted upload");

    Ok(Json(UploadResponse {
        id: record.id,
        status: "success".to_string(),
        message: "Image uploaded successfully and processing started".to_string(),
        filename: record.filename,
        original_url: record.original_url,
    }))
}

pub async fn get_upload_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UploadRecord>, ApiError> {
    let record = state.tracker.get_status(&id)?;
    Ok(Json(record))
}

pub async fn get_annotations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Annotation>>, ApiError> {
    // 404 for unknown ids; a known record with no annotations yet returns []
    state.tracker.get_status(&id)?;
    Ok(Json(state.tracker.get_annotations(&id)))
}
