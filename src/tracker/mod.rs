//! Upload lifecycle tracking.
//!
//! The tracker is the in-process authority for every [`UploadRecord`]: it
//! assigns identity, coordinates the object-store and invoker calls with
//! validated status transitions, and serves snapshot reads to concurrent
//! request handlers. Collaborators are injected as trait objects.

pub mod models;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;

use crate::invoker::ProcessingInvoker;
use crate::object_store::ObjectStore;

pub use models::{
    Annotation, AnnotationKind, ProcessingOutcome, TrackerError, UploadRecord, UploadStatus,
};
pub use store::RecordStore;

pub struct UploadTracker {
    records: RecordStore,
    objects: Arc<dyn ObjectStore>,
    invoker: Arc<dyn ProcessingInvoker>,
    /// Deadline applied to every store and invoke call so a stalled upstream
    /// fails the record into `Error` instead of hanging the request.
    upstream_timeout: Duration,
}

impl UploadTracker {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        invoker: Arc<dyn ProcessingInvoker>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            records: RecordStore::new(),
            objects,
            invoker,
            upstream_timeout,
        }
    }

    /// Accept an upload: assign an id, persist the bytes, and trigger the
    /// annotation function.
    ///
    /// Performs at most one store call and at most one invoke call, with no
    /// internal retry. On any upstream failure the record is kept in `Error`
    /// status so the failure stays queryable via [`get_status`].
    ///
    /// [`get_status`]: UploadTracker::get_status
    pub async fn begin_upload(
        &self,
        filename: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<UploadRecord, TrackerError> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = UploadRecord::new(id.clone(), filename.to_string());
        let key = record.original_key();
        self.records.insert(record);

        let original_url = match self.bounded(self.objects.put(&key, bytes, content_type)).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(upload_id = %id, error = %e, "Object store put failed");
                self.mark_error(&id);
                return Err(e);
            }
        };

        let record = self
            .records
            .transition(&id, UploadStatus::Processing, |r| {
                r.original_url = original_url.clone();
            })?;

        if let Err(e) = self.bounded(self.invoker.trigger(&id, &key)).await {
            tracing::warn!(upload_id = %id, error = %e, "Processing trigger failed");
            self.mark_error(&id);
            return Err(e);
        }

        tracing::debug!(upload_id = %id, key = %key, "Upload accepted, processing triggered");
        Ok(record)
    }

    /// Snapshot of a single record.
    pub fn get_status(&self, id: &str) -> Result<UploadRecord, TrackerError> {
        self.records
            .get(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }

    /// Snapshot of all tracked records in insertion order.
    pub fn list_all(&self) -> Vec<UploadRecord> {
        self.records.list()
    }

    /// Transition a record, validating the edge.
    ///
    /// A processed location is only ever associated with a `Completed`
    /// record; one supplied alongside any other status is discarded so the
    /// record never carries a processed location mid-flight.
    pub fn update_status(
        &self,
        id: &str,
        new_status: UploadStatus,
        processed_url: Option<String>,
    ) -> Result<UploadRecord, TrackerError> {
        self.records.transition(id, new_status, |r| {
            if new_status == UploadStatus::Completed {
                if let Some(url) = processed_url {
                    r.processed_url = Some(url);
                    r.processed_at = Some(Utc::now());
                }
            }
        })
    }

    /// Completion report from the external annotation function.
    pub fn complete_processing(
        &self,
        id: &str,
        outcome: ProcessingOutcome,
    ) -> Result<UploadRecord, TrackerError> {
        match outcome {
            ProcessingOutcome::Completed {
                processed_url,
                annotations,
            } => self.records.transition(id, UploadStatus::Completed, |r| {
                r.processed_url = Some(processed_url);
                r.processed_at = Some(Utc::now());
                r.annotations = annotations;
            }),
            ProcessingOutcome::Failed => {
                self.records.transition(id, UploadStatus::Error, |_| {})
            }
        }
    }

    /// Annotations for a record. Unknown ids yield an empty list, never an
    /// error.
    pub fn get_annotations(&self, id: &str) -> Vec<Annotation> {
        self.records
            .get(id)
            .map(|r| r.annotations)
            .unwrap_or_default()
    }

    /// Re-trigger processing for a known record. Rejected for terminal
    /// records; a record already in `processing` is re-triggered in place.
    pub async fn retrigger(&self, id: &str) -> Result<UploadRecord, TrackerError> {
        let record = self.get_status(id)?;
        if record.status.is_terminal() {
            return Err(TrackerError::IllegalTransition {
                id: id.to_string(),
                from: record.status,
                to: UploadStatus::Processing,
            });
        }

        let key = record.original_key();
        if let Err(e) = self.bounded(self.invoker.trigger(id, &key)).await {
            tracing::warn!(upload_id = %id, error = %e, "Processing re-trigger failed");
            self.mark_error(id);
            return Err(e);
        }

        self.records
            .transition(id, UploadStatus::Processing, |_| {})
    }

    /// Delete an asset: drop the record from the index so the id becomes
    /// unknown, then issue object-store deletes for the original and, if
    /// present, the processed object.
    ///
    /// The record leaves the index before the blob deletes run, so no
    /// concurrent transition can attach a processed location the deletes
    /// below would miss. Blob deletes are best-effort; a failed delete is
    /// logged but does not resurrect the record.
    pub async fn delete_asset(&self, id: &str) -> Result<(), TrackerError> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;

        if let Err(e) = self.bounded(self.objects.delete(&record.original_key())).await {
            tracing::warn!(upload_id = %id, error = %e, "Failed to delete original object");
        }
        if record.processed_url.is_some() {
            if let Err(e) = self
                .bounded(self.objects.delete(&record.processed_key()))
                .await
            {
                tracing::warn!(upload_id = %id, error = %e, "Failed to delete processed object");
            }
        }

        tracing::debug!(upload_id = %id, "Deleted asset");
        Ok(())
    }

    /// Force a record into `Error` status. A rejected transition means the
    /// record is already terminal; it is left as-is.
    fn mark_error(&self, id: &str) {
        if let Err(e) = self.records.transition(id, UploadStatus::Error, |_| {}) {
            tracing::error!(upload_id = %id, error = %e, "Could not mark upload as errored");
        }
    }

    /// Run an upstream call under the configured deadline, folding both
    /// failure and timeout into [`TrackerError::Upstream`].
    async fn bounded<T, E>(
        &self,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, TrackerError>
    where
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.upstream_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TrackerError::Upstream(e.to_string())),
            Err(_) => Err(TrackerError::Upstream(format!(
                "timed out after {:?}",
                self.upstream_timeout
            ))),
        }
    }
}
