use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of an uploaded asset.
///
/// Statuses only ever advance `Uploading -> Processing -> {Completed, Error}`.
/// `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }

    /// Whether a transition from `self` to `next` is a legal edge of the
    /// status machine. Identity transitions on non-terminal states are
    /// allowed so re-triggering an in-flight record is idempotent.
    pub fn can_transition(self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        match (self, next) {
            (Uploading, Processing) | (Uploading, Error) => true,
            (Processing, Completed) | (Processing, Error) => true,
            (Uploading, Uploading) | (Processing, Processing) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Geometric interpretation of an annotation's coordinate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Polyline along a detected edge.
    Edge,
    /// Closed polygon outlining a region of interest.
    Region,
    /// Single point feature.
    Point,
}

/// A single feature detected by the external processing function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// 2D points, ordered; semantics depend on `kind`.
    pub coordinates: Vec<[f64; 2]>,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The authoritative record for one uploaded asset.
///
/// Owned exclusively by the tracker; callers always receive clones, never a
/// handle to the live instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub status: UploadStatus,
    pub filename: String,
    /// Location of the stored original; empty until the store call succeeds.
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_url: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl UploadRecord {
    pub fn new(id: String, filename: String) -> Self {
        Self {
            id,
            status: UploadStatus::Uploading,
            filename,
            original_url: String::new(),
            processed_url: None,
            uploaded_at: Utc::now(),
            processed_at: None,
            annotations: Vec::new(),
        }
    }

    /// Storage key of the original object. Derived deterministically from
    /// the id and filename so it is reconstructible without a lookup.
    pub fn original_key(&self) -> String {
        original_key(&self.id, &self.filename)
    }

    /// Storage key of the processed object, derived the same way.
    pub fn processed_key(&self) -> String {
        processed_key(&self.id, &self.filename)
    }
}

pub fn original_key(id: &str, filename: &str) -> String {
    format!("uploads/{id}-{filename}")
}

pub fn processed_key(id: &str, filename: &str) -> String {
    format!("processed/{id}-{filename}")
}

/// Outcome reported by the external processing function when it finishes.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    Completed {
        processed_url: String,
        annotations: Vec<Annotation>,
    },
    Failed,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Upload not found: {0}")]
    NotFound(String),
    #[error("Illegal status transition {from} -> {to} for upload {id}")]
    IllegalTransition {
        id: String,
        from: UploadStatus,
        to: UploadStatus,
    },
    #[error("Upstream call failed: {0}")]
    Upstream(String),
}
