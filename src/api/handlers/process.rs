use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::images::MessageResponse;
use crate::api::response::{ApiError, AppJson};
use crate::tracker::{Annotation, ProcessingOutcome, UploadRecord, UploadStatus};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProcessingStatusResponse {
    pub status: UploadStatus,
}

/// Completion report posted by the annotation function when it finishes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub status: CompletionStatus,
    #[serde(default)]
    pub processed_url: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
    Error,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn trigger_processing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tracker.retrigger(&id).await?;

    Ok(Json(MessageResponse {
        message: "Processing triggered successfully".to_string(),
    }))
}

pub async fn complete_processing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<CompletionRequest>,
) -> Result<Json<UploadRecord>, ApiError> {
    let outcome = match req.status {
        CompletionStatus::Completed => {
            let processed_url = req.processed_url.ok_or_else(|| {
                ApiError::bad_request("processedUrl is required when status is completed")
            })?;
            ProcessingOutcome::Completed {
                processed_url,
                annotations: req.annotations,
            }
        }
        CompletionStatus::Error => ProcessingOutcome::Failed,
    };

    let record = state.tracker.complete_processing(&id, outcome)?;

    tracing::debug!(upload_id = %id, status = %record.status, "Processing completion recorded");
    Ok(Json(record))
}

pub async fn get_processing_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProcessingStatusResponse>, ApiError> {
    let record = state.tracker.get_status(&id)?;
    Ok(Json(ProcessingStatusResponse {
        status: record.status,
    }))
}
