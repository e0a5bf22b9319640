//! In-memory record store
//!
//! Same contract as the redb backend, for engine unit tests and the dev
//! sweeper. The mutex stands in for the store's per-write serialization.

use crate::store::{CreateOutcome, RecordStore};
use async_trait::async_trait;
use docio_common::{DocumentId, DocumentRecord, Error, RecordPatch, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// HashMap-backed record store
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<DocumentId, DocumentRecord>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        Ok(self.records.lock().get(id).cloned())
    }

    async fn conditional_create(&self, record: DocumentRecord) -> Result<CreateOutcome> {
        let mut records = self.records.lock();
        if records.contains_key(&record.document_id) {
            Ok(CreateOutcome::AlreadyExists)
        } else {
            records.insert(record.document_id.clone(), record);
            Ok(CreateOutcome::Created)
        }
    }

    async fn update(&self, id: &DocumentId, patch: &RecordPatch) -> Result<DocumentRecord> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        record.apply(patch);
        Ok(record.clone())
    }

    async fn delete(&self, id: &DocumentId) -> Result<()> {
        self.records.lock().remove(id);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<DocumentRecord>> {
        Ok(self.records.lock().values().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_update() {
        let store = MemoryRecordStore::new();
        let id = DocumentId::new("abc");
        assert_eq!(
            store
                .conditional_create(DocumentRecord::new(id.clone()))
                .await
                .unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            store
                .conditional_create(DocumentRecord::new(id.clone()))
                .await
                .unwrap(),
            CreateOutcome::AlreadyExists
        );

        let patch = RecordPatch {
            has_content: Some(true),
            ..Default::default()
        };
        assert!(store.update(&id, &patch).await.unwrap().has_content);
    }
}
