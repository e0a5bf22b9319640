//! Lifecycle state machine
//!
//! Drives a document's storage tier through Standard -> Archived ->
//! restore-in-progress -> Restored. The record is a cache of tier and
//! restore state; the object store is authoritative. Every operation
//! tolerates a stale record, and the read path re-derives tier and
//! restore status from the live store, healing the record as it goes.
//!
//! A lifecycle operation whose cold-storage action succeeded but whose
//! record write failed is still reported successful: retrying would
//! re-issue an already-completed tier move, and the record converges on
//! the next read instead.

use docio_common::{
    DocumentId, DocumentRecord, Error, RecordPatch, RestoreStatus, RestoreTier, Result,
    StorageTier, now_millis,
};
use docio_object_store::{ObjectRestore, ObjectStat, ObjectStore};
use docio_record_store::RecordStore;
use std::sync::Arc;
use tracing::{info, warn};

/// TTL for presigned download URLs handed out by the read path
const PRESIGN_TTL_SECS: u64 = 60;

/// Successful archive result
#[derive(Clone, Debug)]
pub struct ArchiveReceipt {
    pub document_id: DocumentId,
    pub tier: StorageTier,
    pub archived_at: u64,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

/// Successful restore-request result
#[derive(Clone, Debug)]
pub struct RestoreReceipt {
    pub document_id: DocumentId,
    pub tier: RestoreTier,
    pub days: u32,
    /// Rough wall-clock window until the restore completes
    pub estimated_completion: &'static str,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

/// Read access granted by [`LifecycleEngine::resolve`]
#[derive(Clone, Debug)]
pub struct ResolvedDocument {
    /// The record after healing against the live object store
    pub record: DocumentRecord,
    /// Time-limited download URL
    pub presigned_url: String,
}

/// Result of one background reconcile sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileSweepReport {
    pub examined: usize,
    pub healed: usize,
    pub orphans_removed: usize,
}

/// Archive/restore state machine over the two stores
pub struct LifecycleEngine {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    /// Bucket holding document content
    bucket: String,
}

impl LifecycleEngine {
    /// Create an engine for documents stored in `bucket`
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            records,
            objects,
            bucket: bucket.into(),
        }
    }

    /// Object key holding the document's content; falls back to the raw
    /// id for records created before the content event arrived.
    fn content_key(record: &DocumentRecord) -> &str {
        record
            .content_key
            .as_deref()
            .unwrap_or_else(|| record.document_id.as_str())
    }

    async fn fetch_record(&self, id: &DocumentId) -> Result<DocumentRecord> {
        self.records
            .get(id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    /// Move a document to the archived tier.
    ///
    /// Fails with [`Error::AlreadyArchived`] when the record shows a cold
    /// tier, without touching the object store.
    pub async fn archive(&self, id: &DocumentId) -> Result<ArchiveReceipt> {
        let record = self.fetch_record(id).await?;

        if record.storage_tier.is_cold() {
            return Err(Error::AlreadyArchived {
                tier: record.storage_tier.to_string(),
            });
        }

        let key = Self::content_key(&record);
        self.objects
            .change_tier(&self.bucket, key, StorageTier::Archived)
            .await?;
        info!(document_id = %id, key, "moved document to archive tier");

        let archived_at = now_millis();
        let patch = RecordPatch {
            storage_tier: Some(StorageTier::Archived),
            restore_status: Some(RestoreStatus::None),
            archived_at: Some(archived_at),
            ..Default::default()
        };
        // The tier move already happened; a failed record write leaves a
        // stale record that the read path heals, so this is not fatal.
        if let Err(e) = self.records.update(id, &patch).await {
            warn!(document_id = %id, "record update failed after archive, will self-heal on read: {e}");
        }

        Ok(ArchiveReceipt {
            document_id: id.clone(),
            tier: StorageTier::Archived,
            archived_at,
            file_name: record.file_name,
            size: record.size,
        })
    }

    /// Request a temporary restore of an archived document.
    pub async fn request_restore(
        &self,
        id: &DocumentId,
        days: u32,
        tier: &str,
    ) -> Result<RestoreReceipt> {
        if !(1..=365).contains(&days) {
            return Err(Error::invalid_parameter(format!(
                "restore days must be between 1 and 365, got {days}"
            )));
        }
        let tier = RestoreTier::parse(tier)?;

        let record = self.fetch_record(id).await?;
        if !record.storage_tier.is_cold() {
            return Err(Error::NotArchived);
        }
        if record.restore_status == RestoreStatus::InProgress {
            return Err(Error::RestoreAlreadyInProgress);
        }

        let key = Self::content_key(&record);
        // The store may also report an in-flight restore the record has
        // not caught up with; that surfaces as the same business outcome.
        self.objects
            .request_restore(&self.bucket, key, days, tier)
            .await?;
        info!(document_id = %id, key, days, %tier, "restore requested");

        let patch = RecordPatch {
            restore_status: Some(RestoreStatus::InProgress),
            restore_days: Some(days),
            ..Default::default()
        };
        if let Err(e) = self.records.update(id, &patch).await {
            warn!(document_id = %id, "record update failed after restore request, will self-heal on read: {e}");
        }

        Ok(RestoreReceipt {
            document_id: id.clone(),
            tier,
            days,
            estimated_completion: tier.estimated_completion(),
            file_name: record.file_name,
            size: record.size,
        })
    }

    /// Apply a restore-completed event from the object store.
    /// Idempotent: replaying the event re-applies the same state.
    pub async fn on_restore_completed(
        &self,
        _bucket: &str,
        key: &str,
        expiry: Option<String>,
    ) -> Result<()> {
        if key.ends_with('/') {
            return Ok(());
        }
        let id = DocumentId::from_object_key(key);
        let patch = RecordPatch {
            restore_status: Some(RestoreStatus::Restored),
            restore_expiry: expiry.clone(),
            ..Default::default()
        };
        self.records.update(&id, &patch).await?;
        info!(document_id = %id, ?expiry, "restore completed");
        Ok(())
    }

    /// Resolve read access for a document.
    ///
    /// Tier and restore state come from the live object store, not the
    /// record, since tier changes can happen out-of-band. The observed
    /// state is written back into the record opportunistically, then cold
    /// unrestored documents are refused with [`Error::NotRestored`] and
    /// in-flight restores with [`Error::RestoreInProgress`].
    pub async fn resolve(&self, id: &DocumentId) -> Result<ResolvedDocument> {
        let mut record = self.fetch_record(id).await?;
        let key = Self::content_key(&record).to_string();

        let stat = self.objects.stat(&self.bucket, &key).await?;

        if let Some(patch) = heal_patch(&record, &stat) {
            match self.records.update(id, &patch).await {
                Ok(healed) => record = healed,
                Err(e) => {
                    warn!(document_id = %id, "opportunistic heal failed: {e}");
                    record.apply(&patch);
                }
            }
        }

        if stat.tier.is_cold() {
            match stat.restore {
                ObjectRestore::None => {
                    return Err(Error::NotRestored {
                        tier: stat.tier.to_string(),
                    });
                }
                ObjectRestore::InProgress => return Err(Error::RestoreInProgress),
                ObjectRestore::Restored { .. } => {}
            }
        }

        let download_name = record
            .file_name
            .clone()
            .unwrap_or_else(|| id.to_string());
        let presigned_url = self
            .objects
            .presigned_get_url(&self.bucket, &key, PRESIGN_TTL_SECS, &download_name)
            .await?;

        Ok(ResolvedDocument {
            record,
            presigned_url,
        })
    }

    /// Background reconcile sweep: heal records against the live object
    /// store and reclaim records whose content object is gone.
    ///
    /// Optional by configuration; read-time resolution already self-heals,
    /// this just bounds how long out-of-band drift can linger.
    pub async fn reconcile_sweep(&self, limit: usize) -> Result<ReconcileSweepReport> {
        let mut report = ReconcileSweepReport::default();

        for record in self.records.list(limit).await? {
            report.examined += 1;

            // Metadata-only records have no content object to compare against
            let Some(key) = record.content_key.as_deref() else {
                continue;
            };

            match self.objects.stat(&self.bucket, key).await {
                Ok(stat) => {
                    if let Some(patch) = heal_patch(&record, &stat) {
                        match self.records.update(&record.document_id, &patch).await {
                            Ok(_) => report.healed += 1,
                            Err(e) => {
                                warn!(document_id = %record.document_id, "sweep heal failed: {e}");
                            }
                        }
                    }
                }
                Err(Error::ObjectMissing { .. }) => {
                    warn!(document_id = %record.document_id, key, "removing orphaned record");
                    self.records.delete(&record.document_id).await?;
                    report.orphans_removed += 1;
                }
                Err(e) => {
                    warn!(document_id = %record.document_id, key, "sweep stat failed: {e}");
                }
            }
        }

        Ok(report)
    }
}

/// Patch bringing a record in line with the observed object state, or
/// `None` when the record already matches.
fn heal_patch(record: &DocumentRecord, stat: &ObjectStat) -> Option<RecordPatch> {
    let live_status = match &stat.restore {
        _ if !stat.tier.is_cold() => RestoreStatus::None,
        ObjectRestore::None => RestoreStatus::None,
        ObjectRestore::InProgress => RestoreStatus::InProgress,
        ObjectRestore::Restored { .. } => RestoreStatus::Restored,
    };
    let live_expiry = match &stat.restore {
        ObjectRestore::Restored { expiry } => expiry.clone(),
        _ => None,
    };

    let tier_stale = record.storage_tier != stat.tier;
    let status_stale = record.restore_status != live_status;
    if !tier_stale && !status_stale {
        return None;
    }

    Some(RecordPatch {
        storage_tier: tier_stale.then_some(stat.tier),
        restore_status: status_stale.then_some(live_status),
        restore_expiry: live_expiry,
        ..Default::default()
    })
}
