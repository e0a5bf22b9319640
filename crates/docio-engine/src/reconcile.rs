//! Reconciliation engine
//!
//! A document's content and its metadata arrive as two independent
//! object-created events, in either order, possibly concurrently on
//! separate workers. Both handlers follow the same create-or-update
//! policy: look up the record, conditionally create it if absent, and
//! fall back to an update when the create loses the race. The record
//! store's conditional create is the only mutual-exclusion mechanism;
//! there are no locks to hold across the store calls.
//!
//! Both paths are commutative and idempotent, so any interleaving
//! converges to the same merged record with both paths' fields intact.

use docio_common::{
    key_basename, retry_with_backoff, BackoffConfig, DocumentId, DocumentRecord, Error,
    RecordPatch, Result, METADATA_SUFFIX,
};
use docio_object_store::{ObjectStat, ObjectStore};
use docio_record_store::{CreateOutcome, RecordStore};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// How an event was applied to the record store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// This event created the record
    Created,
    /// A record already existed and was updated
    Updated,
    /// The conditional create lost a race and converged via update
    MergedAfterRace,
}

/// Result of processing one object-created event
#[derive(Clone, Debug)]
pub enum ReconcileOutcome {
    /// Directory markers and other non-document keys are ignored
    Skipped,
    /// The event was merged into the record store
    Applied {
        disposition: Disposition,
        /// The record after this event's fields were merged in
        record: DocumentRecord,
    },
}

impl ReconcileOutcome {
    /// The merged record, if the event was applied
    #[must_use]
    pub fn record(&self) -> Option<&DocumentRecord> {
        match self {
            Self::Skipped => None,
            Self::Applied { record, .. } => Some(record),
        }
    }
}

/// Merges object-created events into the record store
pub struct ReconcileEngine {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    backoff: BackoffConfig,
}

impl ReconcileEngine {
    /// Create an engine over the given stores
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            records,
            objects,
            backoff,
        }
    }

    /// Route an object-created event to the content or metadata handler
    /// based on the key's suffix.
    pub async fn on_object_created(&self, bucket: &str, key: &str) -> Result<ReconcileOutcome> {
        if key.ends_with(METADATA_SUFFIX) {
            self.on_metadata_created(bucket, key).await
        } else {
            self.on_content_created(bucket, key).await
        }
    }

    /// Handle a content-object creation event.
    ///
    /// Fetches content-derived fields (type, size, hash) from the object
    /// store and merges them into the record, creating it if this path
    /// arrived first. Metadata fields already present are preserved, and
    /// a display name set by the metadata path is never overwritten.
    pub async fn on_content_created(&self, bucket: &str, key: &str) -> Result<ReconcileOutcome> {
        if key.ends_with('/') {
            debug!(key, "ignoring directory marker event");
            return Ok(ReconcileOutcome::Skipped);
        }

        let id = DocumentId::from_object_key(key);
        let stat = self.objects.stat(bucket, key).await?;
        let patch = content_patch(key, &stat);

        self.merge(&id, &patch, "content").await
    }

    /// Handle a metadata-object creation event.
    ///
    /// Downloads and parses the JSON payload into the record's open
    /// metadata map. A `file_name` field in the payload becomes the
    /// document's display name and takes precedence over the basename
    /// the content path fills in. Content-derived fields are untouched.
    pub async fn on_metadata_created(&self, bucket: &str, key: &str) -> Result<ReconcileOutcome> {
        if key.ends_with('/') {
            debug!(key, "ignoring directory marker event");
            return Ok(ReconcileOutcome::Skipped);
        }

        let id = DocumentId::from_metadata_key(key);
        let payload = self.objects.get(bucket, key).await?;
        let mut fields = parse_metadata(&payload)?;

        let display_name = match fields.remove("file_name") {
            Some(Value::String(name)) => Some(name),
            Some(other) => {
                // Keep non-string values in the open map rather than
                // inventing a display name from them
                fields.insert("file_name".to_string(), other);
                None
            }
            None => None,
        };

        let patch = RecordPatch {
            metadata_key: Some(key.to_string()),
            metadata_fields: fields,
            file_name: display_name,
            has_metadata: Some(true),
            ..Default::default()
        };

        self.merge(&id, &patch, "metadata").await
    }

    /// Create-or-update with race fallback, shared by both paths.
    async fn merge(&self, id: &DocumentId, patch: &RecordPatch, path: &str) -> Result<ReconcileOutcome> {
        if self.records.get(id).await?.is_some() {
            let record = self.records.update(id, patch).await?;
            debug!(document_id = %id, path, "updated existing record");
            return Ok(ReconcileOutcome::Applied {
                disposition: Disposition::Updated,
                record,
            });
        }

        let mut fresh = DocumentRecord::new(id.clone());
        fresh.apply(patch);

        match self.records.conditional_create(fresh).await? {
            CreateOutcome::Created => {
                debug!(document_id = %id, path, "created new record");
                Ok(ReconcileOutcome::Applied {
                    disposition: Disposition::Created,
                    record: self
                        .records
                        .get(id)
                        .await?
                        .ok_or_else(|| Error::store("record vanished after create"))?,
                })
            }
            CreateOutcome::AlreadyExists => {
                // Expected race: the other path created the record between
                // our lookup and our create. Converge by re-reading and
                // updating; the retry absorbs the store's settling time.
                info!(document_id = %id, path, "create race lost, merging as update");
                let record = retry_with_backoff(
                    || async {
                        match self.records.get(id).await? {
                            Some(_) => self.records.update(id, patch).await,
                            None => Err(Error::store(format!(
                                "record for {id} disappeared during race recovery"
                            ))),
                        }
                    },
                    self.backoff.max_attempts,
                    self.backoff.initial_delay(),
                )
                .await?;
                Ok(ReconcileOutcome::Applied {
                    disposition: Disposition::MergedAfterRace,
                    record,
                })
            }
        }
    }
}

/// Content-derived record fields for an observed object
fn content_patch(key: &str, stat: &ObjectStat) -> RecordPatch {
    RecordPatch {
        content_key: Some(key.to_string()),
        content_type: Some(stat.content_type.clone()),
        size: Some(stat.size),
        content_hash: Some(stat.checksum.clone()),
        // Basename as display name, but only when nothing is set yet
        file_name: Some(key_basename(key).to_string()),
        file_name_if_unset: true,
        has_content: Some(true),
        ..Default::default()
    }
}

/// Parse a metadata payload into the open field map.
/// The payload must be a JSON object; keys are dynamic.
fn parse_metadata(payload: &[u8]) -> Result<BTreeMap<String, Value>> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(Error::Serialization(format!(
            "metadata payload must be a JSON object, got {other}"
        ))),
        Err(e) => Err(Error::Serialization(format!(
            "metadata payload is not valid JSON: {e}"
        ))),
    }
}
