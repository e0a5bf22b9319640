//! Object store trait and observation types

use async_trait::async_trait;
use bytes::Bytes;
use docio_common::{Result, RestoreTier, StorageTier};
use serde::{Deserialize, Serialize};

/// Live restore state of an object, as observed from the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ObjectRestore {
    /// No restore requested
    #[default]
    None,
    /// A restore has been issued and is still running
    InProgress,
    /// The object is temporarily readable again
    Restored {
        /// When the restored copy expires, if the store reports it
        expiry: Option<String>,
    },
}

/// Metadata observed for a stored object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    pub content_type: String,
    pub size: u64,
    /// Content hash (hex); the object store's integrity tag
    pub checksum: String,
    pub tier: StorageTier,
    pub restore: ObjectRestore,
}

/// Byte storage keyed by (bucket, key) with storage-tier metadata and
/// asynchronous restore.
///
/// Implementations may block on I/O for multiple seconds, especially the
/// cold-storage operations; callers must not hold locks across calls.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Observe an object's metadata without reading its bytes.
    /// Returns [`docio_common::Error::ObjectMissing`] if it does not exist.
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat>;

    /// Read an object's bytes
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Store an object at the standard tier
    async fn put(&self, bucket: &str, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Delete an object; deleting a missing object is not an error
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Move an object to another storage tier. Moving to a cold tier
    /// invalidates any previous restore.
    async fn change_tier(&self, bucket: &str, key: &str, tier: StorageTier) -> Result<()>;

    /// Ask the store to temporarily restore a cold object for `days` days.
    /// Fails with [`docio_common::Error::RestoreAlreadyInProgress`] if a
    /// restore is already running.
    async fn request_restore(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RestoreTier,
    ) -> Result<()>;

    /// Time-limited read URL with an attachment disposition
    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        ttl_secs: u64,
        download_name: &str,
    ) -> Result<String>;
}
