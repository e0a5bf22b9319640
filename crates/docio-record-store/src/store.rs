//! Persistent record store backed by redb.
//!
//! All writes are synchronous (write txn + commit). The write transaction
//! is what makes `conditional_create` a compare-and-create: existence is
//! checked and the row inserted inside one txn, so at most one of two
//! racing creators can ever commit a row for the same document id.

use crate::tables;
use async_trait::async_trait;
use docio_common::{DocumentId, DocumentRecord, Error, RecordPatch, Result};
use redb::{Database, ReadableTable};
use std::path::Path;

/// Error type for record store operations
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for RecordStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<RecordStoreError> for Error {
    fn from(e: RecordStoreError) -> Self {
        Self::Store(e.to_string())
    }
}

type StoreResult<T> = std::result::Result<T, RecordStoreError>;

/// Outcome of a conditional create: a typed result, not an exception.
/// `AlreadyExists` is the expected result of losing a create race and is
/// handled by the caller as the update branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The record did not exist and was written
    Created,
    /// A record with this id already exists; nothing was written
    AlreadyExists,
}

/// Key-value store of document records with conditional (optimistic)
/// creation and partial-field updates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up a record by document id
    async fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>>;

    /// Create the record only if no record with its id exists yet
    async fn conditional_create(&self, record: DocumentRecord) -> Result<CreateOutcome>;

    /// Apply a partial update to an existing record, returning the merged
    /// record. Fails with [`Error::DocumentNotFound`] if it is absent.
    async fn update(&self, id: &DocumentId, patch: &RecordPatch) -> Result<DocumentRecord>;

    /// Remove a record; removing a missing record is not an error
    async fn delete(&self, id: &DocumentId) -> Result<()>;

    /// Up to `limit` records, for the reconcile sweep
    async fn list(&self, limit: usize) -> Result<Vec<DocumentRecord>>;
}

/// Persistent record store backed by redb
pub struct RedbRecordStore {
    db: Database,
}

impl RedbRecordStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::open_inner(path.as_ref())?)
    }

    fn open_inner(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::RECORDS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn get_sync(&self, id: &DocumentId) -> StoreResult<Option<DocumentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORDS)?;
        match table.get(id.as_str())? {
            Some(val) => Ok(Some(serde_json::from_slice(val.value())?)),
            None => Ok(None),
        }
    }

    fn conditional_create_sync(&self, record: &DocumentRecord) -> StoreResult<CreateOutcome> {
        let write_txn = self.db.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(tables::RECORDS)?;
            // Read and compare, then drop the guard before mutating
            let exists = table.get(record.document_id.as_str())?.is_some();
            if exists {
                false
            } else {
                let bytes = serde_json::to_vec(record)?;
                table.insert(record.document_id.as_str(), bytes.as_slice())?;
                true
            }
        };
        if created {
            write_txn.commit()?;
            Ok(CreateOutcome::Created)
        } else {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    fn update_sync(
        &self,
        id: &DocumentId,
        patch: &RecordPatch,
    ) -> StoreResult<Option<DocumentRecord>> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(tables::RECORDS)?;
            let current: Option<DocumentRecord> = match table.get(id.as_str())? {
                Some(val) => Some(serde_json::from_slice(val.value())?),
                None => None,
            };
            match current {
                Some(mut record) => {
                    record.apply(patch);
                    let bytes = serde_json::to_vec(&record)?;
                    table.insert(id.as_str(), bytes.as_slice())?;
                    Some(record)
                }
                None => None,
            }
        };
        if updated.is_some() {
            write_txn.commit()?;
        }
        Ok(updated)
    }

    fn delete_sync(&self, id: &DocumentId) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::RECORDS)?;
            table.remove(id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_sync(&self, limit: usize) -> StoreResult<Vec<DocumentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORDS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            if result.len() >= limit {
                break;
            }
            let entry = entry?;
            result.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(result)
    }
}

#[async_trait]
impl RecordStore for RedbRecordStore {
    async fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        Ok(self.get_sync(id)?)
    }

    async fn conditional_create(&self, record: DocumentRecord) -> Result<CreateOutcome> {
        Ok(self.conditional_create_sync(&record)?)
    }

    async fn update(&self, id: &DocumentId, patch: &RecordPatch) -> Result<DocumentRecord> {
        self.update_sync(id, patch)?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    async fn delete(&self, id: &DocumentId) -> Result<()> {
        Ok(self.delete_sync(id)?)
    }

    async fn list(&self, limit: usize) -> Result<Vec<DocumentRecord>> {
        Ok(self.list_sync(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docio_common::{RestoreStatus, StorageTier};

    fn open_store() -> (tempfile::TempDir, RedbRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbRecordStore::open(dir.path().join("records.redb")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_conditional_create_once() {
        let (_dir, store) = open_store();
        let record = DocumentRecord::new(DocumentId::new("abc"));

        assert_eq!(
            store.conditional_create(record.clone()).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            store.conditional_create(record).await.unwrap(),
            CreateOutcome::AlreadyExists
        );

        let loaded = store.get(&DocumentId::new("abc")).await.unwrap().unwrap();
        assert_eq!(loaded.document_id.as_str(), "abc");
    }

    #[tokio::test]
    async fn test_lost_create_does_not_clobber() {
        let (_dir, store) = open_store();
        let mut winner = DocumentRecord::new(DocumentId::new("abc"));
        winner.has_metadata = true;
        winner
            .metadata_fields
            .insert("author".into(), serde_json::json!("x"));
        store.conditional_create(winner).await.unwrap();

        let mut loser = DocumentRecord::new(DocumentId::new("abc"));
        loser.has_content = true;
        assert_eq!(
            store.conditional_create(loser).await.unwrap(),
            CreateOutcome::AlreadyExists
        );

        let loaded = store.get(&DocumentId::new("abc")).await.unwrap().unwrap();
        assert!(loaded.has_metadata);
        assert!(!loaded.has_content);
        assert_eq!(loaded.metadata_fields["author"], serde_json::json!("x"));
    }

    #[tokio::test]
    async fn test_update_merges_partial_fields() {
        let (_dir, store) = open_store();
        let mut record = DocumentRecord::new(DocumentId::new("abc"));
        record.has_metadata = true;
        record
            .metadata_fields
            .insert("author".into(), serde_json::json!("x"));
        store.conditional_create(record).await.unwrap();

        let patch = RecordPatch {
            content_key: Some("docs/abc.pdf".into()),
            content_type: Some("application/pdf".into()),
            size: Some(42),
            has_content: Some(true),
            ..Default::default()
        };
        let merged = store.update(&DocumentId::new("abc"), &patch).await.unwrap();

        assert!(merged.has_content);
        assert!(merged.has_metadata);
        assert_eq!(merged.content_key.as_deref(), Some("docs/abc.pdf"));
        assert_eq!(merged.metadata_fields["author"], serde_json::json!("x"));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let (_dir, store) = open_store();
        let err = store
            .update(&DocumentId::new("ghost"), &RecordPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.redb");
        {
            let store = RedbRecordStore::open(&path).unwrap();
            let mut record = DocumentRecord::new(DocumentId::new("abc"));
            record.storage_tier = StorageTier::Archived;
            record.restore_status = RestoreStatus::InProgress;
            store.conditional_create(record).await.unwrap();
        }
        let store = RedbRecordStore::open(&path).unwrap();
        let loaded = store.get(&DocumentId::new("abc")).await.unwrap().unwrap();
        assert_eq!(loaded.storage_tier, StorageTier::Archived);
        assert_eq!(loaded.restore_status, RestoreStatus::InProgress);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let (_dir, store) = open_store();
        for id in ["a", "b", "c"] {
            store
                .conditional_create(DocumentRecord::new(DocumentId::new(id)))
                .await
                .unwrap();
        }
        assert_eq!(store.list(10).await.unwrap().len(), 3);
        assert_eq!(store.list(2).await.unwrap().len(), 2);

        store.delete(&DocumentId::new("b")).await.unwrap();
        store.delete(&DocumentId::new("b")).await.unwrap();
        assert_eq!(store.list(10).await.unwrap().len(), 2);
    }
}
