//! Core type definitions for DocIO
//!
//! This module defines the fundamental types used throughout the system:
//! document identifiers, storage tiers, restore state and the document
//! record that the reconciliation engine keeps as the unit of truth.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Suffix that marks an object as a metadata payload rather than content
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Current time as epoch milliseconds
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Unique identifier for a logical document
///
/// Derived deterministically from the object key so that the content and
/// metadata upload paths agree on the identity of the document they are
/// both describing.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct DocumentId(String);

impl DocumentId {
    /// Create from a raw identifier string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the document id from a content object key: strip the path
    /// prefix and the final extension (`docs/abc.pdf` -> `abc`).
    #[must_use]
    pub fn from_object_key(key: &str) -> Self {
        let basename = key.rsplit('/').next().unwrap_or(key);
        let stem = match basename.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => basename,
        };
        Self(stem.to_string())
    }

    /// Derive the document id from a metadata object key: strip the
    /// `.meta.json` suffix first, then derive as for a content key.
    #[must_use]
    pub fn from_metadata_key(key: &str) -> Self {
        let trimmed = key.strip_suffix(METADATA_SUFFIX).unwrap_or(key);
        Self::from_object_key(trimmed)
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({:?})", self.0)
    }
}

/// Basename of an object key (the display name for the content path)
#[must_use]
pub fn key_basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Storage tier of the underlying object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum StorageTier {
    /// Immediately readable
    Standard,
    /// Cold storage, requires a restore before read access
    Archived,
    /// Deep cold storage, same access rules as `Archived`
    DeepArchived,
}

impl StorageTier {
    /// Cold tiers require an explicit restore before the object is readable
    #[must_use]
    pub const fn is_cold(self) -> bool {
        matches!(self, Self::Archived | Self::DeepArchived)
    }
}

impl Default for StorageTier {
    fn default() -> Self {
        Self::Standard
    }
}

/// Restore progress for an archived document
///
/// Only meaningful while the storage tier is cold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
pub enum RestoreStatus {
    /// No restore requested
    #[default]
    None,
    /// Restore issued, object not yet readable
    InProgress,
    /// Restore finished, object temporarily readable
    Restored,
}

/// Retrieval speed class for a restore request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RestoreTier {
    Standard,
    Expedited,
    Bulk,
}

impl RestoreTier {
    /// Parse from the wire representation used by restore requests
    pub fn parse(s: &str) -> Result<Self, crate::Error> {
        match s {
            "Standard" => Ok(Self::Standard),
            "Expedited" => Ok(Self::Expedited),
            "Bulk" => Ok(Self::Bulk),
            other => Err(crate::Error::invalid_parameter(format!(
                "restore tier must be Standard, Expedited or Bulk, got {other:?}"
            ))),
        }
    }

    /// Rough completion window reported back to restore callers
    #[must_use]
    pub const fn estimated_completion(self) -> &'static str {
        match self {
            Self::Expedited => "1-5 minutes",
            Self::Standard => "3-5 hours",
            Self::Bulk => "5-12 hours",
        }
    }
}

/// The merged metadata+content entry for one logical document.
///
/// Created exactly once by whichever of the two upload paths arrives first;
/// every later write is an update. `metadata_fields` is an open map with no
/// fixed schema, merged in from the metadata payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    /// Object-store key of the file payload, set by the content path
    pub content_key: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub content_hash: Option<String>,
    /// Display name; the metadata path wins, the content path only fills
    /// it in when nothing is set yet
    pub file_name: Option<String>,
    /// Object-store key of the metadata payload, set by the metadata path
    pub metadata_key: Option<String>,
    pub metadata_fields: BTreeMap<String, serde_json::Value>,
    pub has_content: bool,
    pub has_metadata: bool,
    pub storage_tier: StorageTier,
    pub restore_status: RestoreStatus,
    pub restore_days: Option<u32>,
    /// Expiry of the restored copy, as reported by the object store
    pub restore_expiry: Option<String>,
    pub archived_at: Option<u64>,
    pub updated_at: u64,
}

impl DocumentRecord {
    /// Fresh record with no upload path observed yet
    #[must_use]
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            content_key: None,
            content_type: None,
            size: None,
            content_hash: None,
            file_name: None,
            metadata_key: None,
            metadata_fields: BTreeMap::new(),
            has_content: false,
            has_metadata: false,
            storage_tier: StorageTier::Standard,
            restore_status: RestoreStatus::None,
            restore_days: None,
            restore_expiry: None,
            archived_at: None,
            updated_at: now_millis(),
        }
    }

    /// Apply a partial update in place, bumping `updated_at`.
    ///
    /// Metadata fields are merged key-wise; fields absent from the patch
    /// are left untouched so the two upload paths cannot clobber each
    /// other's data.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(key) = &patch.content_key {
            self.content_key = Some(key.clone());
        }
        if let Some(ct) = &patch.content_type {
            self.content_type = Some(ct.clone());
        }
        if let Some(size) = patch.size {
            self.size = Some(size);
        }
        if let Some(hash) = &patch.content_hash {
            self.content_hash = Some(hash.clone());
        }
        match &patch.file_name {
            Some(name) if patch.file_name_if_unset => {
                if self.file_name.is_none() {
                    self.file_name = Some(name.clone());
                }
            }
            Some(name) => self.file_name = Some(name.clone()),
            None => {}
        }
        if let Some(key) = &patch.metadata_key {
            self.metadata_key = Some(key.clone());
        }
        for (k, v) in &patch.metadata_fields {
            self.metadata_fields.insert(k.clone(), v.clone());
        }
        if let Some(has) = patch.has_content {
            self.has_content = has;
        }
        if let Some(has) = patch.has_metadata {
            self.has_metadata = has;
        }
        if let Some(tier) = patch.storage_tier {
            self.storage_tier = tier;
        }
        if let Some(status) = patch.restore_status {
            self.restore_status = status;
        }
        if let Some(days) = patch.restore_days {
            self.restore_days = Some(days);
        }
        if let Some(expiry) = &patch.restore_expiry {
            self.restore_expiry = Some(expiry.clone());
        }
        if let Some(at) = patch.archived_at {
            self.archived_at = Some(at);
        }
        self.updated_at = now_millis();
    }
}

/// Partial-field update for a [`DocumentRecord`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    pub content_key: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub content_hash: Option<String>,
    pub file_name: Option<String>,
    /// When set, `file_name` only applies if the record has none yet
    pub file_name_if_unset: bool,
    pub metadata_key: Option<String>,
    pub metadata_fields: BTreeMap<String, serde_json::Value>,
    pub has_content: Option<bool>,
    pub has_metadata: Option<bool>,
    pub storage_tier: Option<StorageTier>,
    pub restore_status: Option<RestoreStatus>,
    pub restore_days: Option<u32>,
    pub restore_expiry: Option<String>,
    pub archived_at: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_from_object_key() {
        assert_eq!(DocumentId::from_object_key("docs/abc.pdf").as_str(), "abc");
        assert_eq!(DocumentId::from_object_key("abc.pdf").as_str(), "abc");
        assert_eq!(DocumentId::from_object_key("a/b/c/report.tar").as_str(), "report");
        assert_eq!(DocumentId::from_object_key("noext").as_str(), "noext");
        // A leading dot is not an extension separator
        assert_eq!(DocumentId::from_object_key("docs/.hidden").as_str(), ".hidden");
    }

    #[test]
    fn test_document_id_from_metadata_key() {
        assert_eq!(
            DocumentId::from_metadata_key("docs/abc.meta.json").as_str(),
            "abc"
        );
        assert_eq!(DocumentId::from_metadata_key("abc.meta.json").as_str(), "abc");
    }

    #[test]
    fn test_content_and_metadata_keys_agree() {
        let from_content = DocumentId::from_object_key("docs/abc.pdf");
        let from_meta = DocumentId::from_metadata_key("docs/abc.meta.json");
        assert_eq!(from_content, from_meta);
    }

    #[test]
    fn test_patch_merges_metadata_fields() {
        let mut record = DocumentRecord::new(DocumentId::new("abc"));
        record
            .metadata_fields
            .insert("author".into(), serde_json::json!("x"));

        let mut patch = RecordPatch::default();
        patch.metadata_fields.insert("title".into(), serde_json::json!("t"));
        record.apply(&patch);

        assert_eq!(record.metadata_fields.len(), 2);
        assert_eq!(record.metadata_fields["author"], serde_json::json!("x"));
    }

    #[test]
    fn test_patch_file_name_if_unset() {
        let mut record = DocumentRecord::new(DocumentId::new("abc"));
        record.file_name = Some("From Metadata.pdf".into());

        let patch = RecordPatch {
            file_name: Some("abc.pdf".into()),
            file_name_if_unset: true,
            ..Default::default()
        };
        record.apply(&patch);
        // The metadata-provided display name is never overwritten
        assert_eq!(record.file_name.as_deref(), Some("From Metadata.pdf"));

        let mut empty = DocumentRecord::new(DocumentId::new("def"));
        empty.apply(&patch);
        assert_eq!(empty.file_name.as_deref(), Some("abc.pdf"));
    }

    #[test]
    fn test_cold_tiers() {
        assert!(!StorageTier::Standard.is_cold());
        assert!(StorageTier::Archived.is_cold());
        assert!(StorageTier::DeepArchived.is_cold());
    }

    #[test]
    fn test_restore_tier_parse() {
        assert_eq!(RestoreTier::parse("Bulk").unwrap(), RestoreTier::Bulk);
        assert!(RestoreTier::parse("bulk").is_err());
        assert!(RestoreTier::parse("Glacier").is_err());
    }
}
