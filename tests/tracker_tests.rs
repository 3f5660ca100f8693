use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image_annotator::invoker::{InvokeError, ProcessingInvoker};
use image_annotator::object_store::{ObjectStore, ObjectStoreError};
use image_annotator::tracker::{
    Annotation, AnnotationKind, ProcessingOutcome, TrackerError, UploadStatus, UploadTracker,
};

// ============================================================================
// Mock collaborators
// ============================================================================

#[derive(Default)]
struct MockStore {
    fail_put: AtomicBool,
    puts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn put(
        &self,
        key: &str,
        _data: Bytes,
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("injected put failure".into()));
        }
        self.puts.lock().unwrap().push(key.to_string());
        Ok(format!("https://test-bucket.s3.amazonaws.com/{key}"))
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        Err(ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool, ObjectStoreError> {
        Ok(false)
    }
}

#[derive(Default)]
struct MockInvoker {
    fail: AtomicBool,
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ProcessingInvoker for MockInvoker {
    async fn trigger(&self, asset_id: &str, storage_key: &str) -> Result<(), InvokeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InvokeError::Failed("injected invoke failure".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((asset_id.to_string(), storage_key.to_string()));
        Ok(())
    }
}

/// Store whose put never resolves, for timeout tests.
struct HangingStore;

#[async_trait]
impl ObjectStore for HangingStore {
    async fn put(
        &self,
        _key: &str,
        _data: Bytes,
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        std::future::pending().await
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        Err(ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), ObjectStoreError> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool, ObjectStoreError> {
        Ok(false)
    }
}

fn test_tracker() -> (Arc<MockStore>, Arc<MockInvoker>, UploadTracker) {
    let store = Arc::new(MockStore::default());
    let invoker = Arc::new(MockInvoker::default());
    let tracker = UploadTracker::new(
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        Arc::clone(&invoker) as Arc<dyn ProcessingInvoker>,
        Duration::from_secs(5),
    );
    (store, invoker, tracker)
}

fn sample_annotations() -> Vec<Annotation> {
    vec![
        Annotation {
            id: "1".to_string(),
            kind: AnnotationKind::Edge,
            coordinates: vec![[100.0, 100.0], [200.0, 100.0], [200.0, 200.0]],
            confidence: 0.95,
            label: Some("Edge Detection".to_string()),
        },
        Annotation {
            id: "2".to_string(),
            kind: AnnotationKind::Region,
            coordinates: vec![[150.0, 150.0], [250.0, 150.0], [250.0, 250.0], [150.0, 250.0]],
            confidence: 0.87,
            label: Some("Region of Interest".to_string()),
        },
    ]
}

// ============================================================================
// begin_upload
// ============================================================================

#[tokio::test]
async fn test_begin_upload_success() {
    let (store, invoker, tracker) = test_tracker();

    let record = tracker
        .begin_upload("cat.jpg", Bytes::from(vec![0u8; 4096]), "image/jpeg")
        .await
        .unwrap();

    assert_eq!(record.status, UploadStatus::Processing);
    assert_eq!(record.filename, "cat.jpg");
    assert!(!record.original_url.is_empty());
    assert!(record.processed_url.is_none());
    assert!(record.annotations.is_empty());

    // Exactly one store call and one invoke call, with the derived key
    let expected_key = format!("uploads/{}-cat.jpg", record.id);
    assert_eq!(*store.puts.lock().unwrap(), vec![expected_key.clone()]);
    assert_eq!(
        *invoker.calls.lock().unwrap(),
        vec![(record.id.clone(), expected_key)]
    );

    // The tracker's snapshot agrees with the returned record
    let status = tracker.get_status(&record.id).unwrap();
    assert_eq!(status.status, UploadStatus::Processing);
    assert_eq!(status.original_url, record.original_url);
}

#[tokio::test]
async fn test_begin_upload_assigns_distinct_ids() {
    let (_store, _invoker, tracker) = test_tracker();
    let mut seen = HashSet::new();

    for i in 0..10 {
        let record = tracker
            .begin_upload(&format!("img-{i}.png"), Bytes::from("data"), "image/png")
            .await
            .unwrap();
        assert!(seen.insert(record.id), "duplicate id issued");
    }
}

#[tokio::test]
async fn test_begin_upload_store_failure_keeps_errored_record() {
    let (store, invoker, tracker) = test_tracker();
    store.fail_put.store(true, Ordering::SeqCst);

    let err = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Upstream(_)));

    // The invoker was never reached, but the record remains queryable
    assert!(invoker.calls.lock().unwrap().is_empty());
    let records = tracker.list_all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, UploadStatus::Error);
    assert!(records[0].original_url.is_empty());
}

#[tokio::test]
async fn test_begin_upload_invoke_failure_keeps_errored_record() {
    let (_store, invoker, tracker) = test_tracker();
    invoker.fail.store(true, Ordering::SeqCst);

    let err = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Upstream(_)));

    // The blob was stored before the trigger failed, so the location sticks
    let records = tracker.list_all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, UploadStatus::Error);
    assert!(!records[0].original_url.is_empty());
}

#[tokio::test]
async fn test_begin_upload_store_timeout() {
    let invoker = Arc::new(MockInvoker::default());
    let tracker = UploadTracker::new(
        Arc::new(HangingStore),
        Arc::clone(&invoker) as Arc<dyn ProcessingInvoker>,
        Duration::from_millis(20),
    );

    let err = tracker
        .begin_upload("slow.png", Bytes::from("data"), "image/png")
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Upstream(_)));

    let records = tracker.list_all();
    assert_eq!(records[0].status, UploadStatus::Error);
}

#[tokio::test]
async fn test_concurrent_uploads_are_isolated() {
    let (_store, _invoker, tracker) = test_tracker();
    let tracker = Arc::new(tracker);

    let mut handles = Vec::new();
    for i in 0..16 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            tracker
                .begin_upload(&format!("img-{i}.jpg"), Bytes::from("data"), "image/jpeg")
                .await
                .unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let record = handle.await.unwrap();
        assert_eq!(record.status, UploadStatus::Processing);
        assert!(ids.insert(record.id));
    }

    assert_eq!(tracker.list_all().len(), 16);
}

// ============================================================================
// get_status / list_all
// ============================================================================

#[tokio::test]
async fn test_get_status_not_found() {
    let (_store, _invoker, tracker) = test_tracker();
    let err = tracker.get_status("no-such-id").unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
}

#[tokio::test]
async fn test_list_all_insertion_order() {
    let (_store, _invoker, tracker) = test_tracker();

    let a = tracker
        .begin_upload("a.png", Bytes::from("a"), "image/png")
        .await
        .unwrap();
    let b = tracker
        .begin_upload("b.png", Bytes::from("b"), "image/png")
        .await
        .unwrap();

    let all = tracker.list_all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, a.id);
    assert_eq!(all[1].id, b.id);
}

// ============================================================================
// update_status / transitions
// ============================================================================

#[tokio::test]
async fn test_update_status_to_completed_sets_processed_fields() {
    let (_store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    let loc = "https://test-bucket.s3.amazonaws.com/processed/x".to_string();
    let updated = tracker
        .update_status(&record.id, UploadStatus::Completed, Some(loc.clone()))
        .unwrap();

    assert_eq!(updated.status, UploadStatus::Completed);
    assert_eq!(updated.processed_url, Some(loc.clone()));
    assert!(updated.processed_at.is_some());

    let snapshot = tracker.get_status(&record.id).unwrap();
    assert_eq!(snapshot.processed_url, Some(loc));
}

#[tokio::test]
async fn test_update_status_discards_processed_location_unless_completed() {
    let (_store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    // An identity transition with a processed location must not attach it
    let updated = tracker
        .update_status(
            &record.id,
            UploadStatus::Processing,
            Some("https://bucket/processed/early".into()),
        )
        .unwrap();
    assert_eq!(updated.status, UploadStatus::Processing);
    assert!(updated.processed_url.is_none());
    assert!(updated.processed_at.is_none());

    // The same location supplied with the completing transition sticks
    let completed = tracker
        .update_status(
            &record.id,
            UploadStatus::Completed,
            Some("https://bucket/processed/cat.jpg".into()),
        )
        .unwrap();
    assert_eq!(
        completed.processed_url.as_deref(),
        Some("https://bucket/processed/cat.jpg")
    );
    assert!(completed.processed_at.is_some());
}

#[tokio::test]
async fn test_update_status_unknown_id() {
    let (_store, _invoker, tracker) = test_tracker();
    let err = tracker
        .update_status("ghost", UploadStatus::Error, None)
        .unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
}

#[tokio::test]
async fn test_no_transition_out_of_terminal_state() {
    let (_store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    tracker
        .update_status(&record.id, UploadStatus::Completed, Some("loc".into()))
        .unwrap();

    // Completed -> Uploading is an illegal back-transition
    let err = tracker
        .update_status(&record.id, UploadStatus::Uploading, None)
        .unwrap_err();
    assert!(matches!(err, TrackerError::IllegalTransition { .. }));

    // Completed -> Error is also rejected once terminal
    let err = tracker
        .update_status(&record.id, UploadStatus::Error, None)
        .unwrap_err();
    assert!(matches!(err, TrackerError::IllegalTransition { .. }));

    // The record is untouched by the rejected transitions
    let snapshot = tracker.get_status(&record.id).unwrap();
    assert_eq!(snapshot.status, UploadStatus::Completed);
}

// ============================================================================
// Completion reporting and annotations
// ============================================================================

#[tokio::test]
async fn test_complete_processing_records_annotations() {
    let (_store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    let updated = tracker
        .complete_processing(
            &record.id,
            ProcessingOutcome::Completed {
                processed_url: "https://bucket/processed/cat.jpg".to_string(),
                annotations: sample_annotations(),
            },
        )
        .unwrap();

    assert_eq!(updated.status, UploadStatus::Completed);
    assert_eq!(updated.annotations.len(), 2);

    let annotations = tracker.get_annotations(&record.id);
    assert_eq!(annotations, sample_annotations());
    assert_eq!(annotations[0].kind, AnnotationKind::Edge);
}

#[tokio::test]
async fn test_complete_processing_failure() {
    let (_store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    let updated = tracker
        .complete_processing(&record.id, ProcessingOutcome::Failed)
        .unwrap();
    assert_eq!(updated.status, UploadStatus::Error);
    assert!(updated.processed_url.is_none());
}

#[tokio::test]
async fn test_get_annotations_unknown_id_is_empty() {
    let (_store, _invoker, tracker) = test_tracker();
    assert!(tracker.get_annotations("no-such-id").is_empty());
}

// ============================================================================
// retrigger
// ============================================================================

#[tokio::test]
async fn test_retrigger_processing_record() {
    let (_store, invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    let updated = tracker.retrigger(&record.id).await.unwrap();
    assert_eq!(updated.status, UploadStatus::Processing);
    assert_eq!(invoker.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_retrigger_rejected_for_terminal_record() {
    let (_store, invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();
    tracker
        .complete_processing(&record.id, ProcessingOutcome::Failed)
        .unwrap();

    let err = tracker.retrigger(&record.id).await.unwrap_err();
    assert!(matches!(err, TrackerError::IllegalTransition { .. }));
    assert_eq!(invoker.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_retrigger_unknown_id() {
    let (_store, _invoker, tracker) = test_tracker();
    let err = tracker.retrigger("ghost").await.unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
}

// ============================================================================
// delete_asset
// ============================================================================

#[tokio::test]
async fn test_delete_asset_removes_both_objects() {
    let (store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();
    tracker
        .complete_processing(
            &record.id,
            ProcessingOutcome::Completed {
                processed_url: "https://bucket/processed/cat.jpg".to_string(),
                annotations: Vec::new(),
            },
        )
        .unwrap();

    tracker.delete_asset(&record.id).await.unwrap();

    let deletes = store.deletes.lock().unwrap();
    assert_eq!(
        *deletes,
        vec![
            format!("uploads/{}-cat.jpg", record.id),
            format!("processed/{}-cat.jpg", record.id),
        ]
    );
    drop(deletes);

    // The id is unknown afterward
    assert!(matches!(
        tracker.get_status(&record.id),
        Err(TrackerError::NotFound(_))
    ));
    assert!(tracker.list_all().is_empty());
}

#[tokio::test]
async fn test_delete_asset_without_processed_object() {
    let (store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    tracker.delete_asset(&record.id).await.unwrap();
    assert_eq!(store.deletes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_asset_unlinks_record_before_blob_deletes() {
    let (_store, _invoker, tracker) = test_tracker();
    let record = tracker
        .begin_upload("cat.jpg", Bytes::from("data"), "image/jpeg")
        .await
        .unwrap();

    tracker.delete_asset(&record.id).await.unwrap();

    // A completion report racing the delete finds the id already gone
    // instead of writing a processed location the deletes never saw
    let err = tracker
        .complete_processing(
            &record.id,
            ProcessingOutcome::Completed {
                processed_url: "https://bucket/processed/late".to_string(),
                annotations: Vec::new(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_asset_unknown_id() {
    let (store, _invoker, tracker) = test_tracker();
    let err = tracker.delete_asset("ghost").await.unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
    assert!(store.deletes.lock().unwrap().is_empty());
}
