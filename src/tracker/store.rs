use std::collections::HashMap;
use std::sync::Mutex;

use super::models::{TrackerError, UploadRecord, UploadStatus};

/// Mutex-guarded index of upload records.
///
/// Every read-modify-write runs as a single closure under the lock, so two
/// concurrent transitions against the same record can never interleave their
/// field writes. The lock is never held across an await point; callers that
/// need to talk to collaborators between transitions re-acquire it per step.
/// Reads hand out clones, never references into the map.
pub struct RecordStore {
    inner: Mutex<Inner>,
}

struct Inner {
    records: HashMap<String, UploadRecord>,
    /// Insertion order of ids, for stable listing.
    order: Vec<String>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Insert a freshly created record. The id is a v4 UUID assigned by the
    /// tracker, so collisions are not expected; an existing entry is a bug
    /// and is left untouched.
    pub fn insert(&self, record: UploadRecord) {
        let mut inner = self.inner.lock().expect("record store lock poisoned");
        if inner.records.contains_key(&record.id) {
            tracing::error!(upload_id = %record.id, "Duplicate upload id, insert ignored");
            return;
        }
        inner.order.push(record.id.clone());
        inner.records.insert(record.id.clone(), record);
    }

    /// Snapshot of a single record.
    pub fn get(&self, id: &str) -> Option<UploadRecord> {
        let inner = self.inner.lock().expect("record store lock poisoned");
        inner.records.get(id).cloned()
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<UploadRecord> {
        let inner = self.inner.lock().expect("record store lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    /// Validate and apply a status transition, mutating the record through
    /// `apply` only if the edge is legal. Returns the updated snapshot.
    ///
    /// Rejected transitions leave the record untouched.
    pub fn transition<F>(
        &self,
        id: &str,
        to: UploadStatus,
        apply: F,
    ) -> Result<UploadRecord, TrackerError>
    where
        F: FnOnce(&mut UploadRecord),
    {
        let mut inner = self.inner.lock().expect("record store lock poisoned");
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;

        if !record.status.can_transition(to) {
            return Err(TrackerError::IllegalTransition {
                id: id.to_string(),
                from: record.status,
                to,
            });
        }

        record.status = to;
        apply(record);
        Ok(record.clone())
    }

    /// Remove a record from the index. Returns the removed snapshot, or
    /// `None` if the id was unknown.
    pub fn remove(&self, id: &str) -> Option<UploadRecord> {
        let mut inner = self.inner.lock().expect("record store lock poisoned");
        let removed = inner.records.remove(id)?;
        inner.order.retain(|entry| entry != id);
        Some(removed)
    }
}
