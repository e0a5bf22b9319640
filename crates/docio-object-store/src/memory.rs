//! In-memory object store backend
//!
//! Backs the engine's tests and the dev sweeper. Restore is modeled in
//! two steps: `request_restore` marks the restore in progress and a
//! completion hook flips it to restored, the way a real cold store
//! delivers completion asynchronously.

use crate::store::{ObjectRestore, ObjectStat, ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use docio_common::{Error, ReadThroughCache, Result, RestoreTier, StorageTier};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    checksum: String,
    tier: StorageTier,
    restore: ObjectRestore,
}

/// DashMap-backed object store
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<(String, String), StoredObject>,
    /// Presign signing secret, loaded on first use and rotatable
    signing_secret: ReadThroughCache<String>,
}

impl MemoryObjectStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate the presign signing secret; outstanding URLs stop verifying
    pub async fn rotate_signing_secret(&self) {
        self.signing_secret.invalidate().await;
    }

    /// Flip an in-progress restore to restored. Test/dev stand-in for the
    /// store's asynchronous restore-completed notification.
    pub fn complete_restore(&self, bucket: &str, key: &str, expiry: Option<String>) -> Result<()> {
        let mut entry = self
            .objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| Error::ObjectMissing {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        entry.restore = ObjectRestore::Restored { expiry };
        Ok(())
    }

    fn entry_key(bucket: &str, key: &str) -> (String, String) {
        (bucket.to_string(), key.to_string())
    }

    fn missing(bucket: &str, key: &str) -> Error {
        Error::ObjectMissing {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        let entry = self
            .objects
            .get(&Self::entry_key(bucket, key))
            .ok_or_else(|| Self::missing(bucket, key))?;
        Ok(ObjectStat {
            content_type: entry.content_type.clone(),
            size: entry.data.len() as u64,
            checksum: entry.checksum.clone(),
            tier: entry.tier,
            restore: entry.restore.clone(),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let entry = self
            .objects
            .get(&Self::entry_key(bucket, key))
            .ok_or_else(|| Self::missing(bucket, key))?;
        Ok(entry.data.clone())
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let checksum = hex::encode(Sha256::digest(&data));
        self.objects.insert(
            Self::entry_key(bucket, key),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                checksum,
                tier: StorageTier::Standard,
                restore: ObjectRestore::None,
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects.remove(&Self::entry_key(bucket, key));
        Ok(())
    }

    async fn change_tier(&self, bucket: &str, key: &str, tier: StorageTier) -> Result<()> {
        let mut entry = self
            .objects
            .get_mut(&Self::entry_key(bucket, key))
            .ok_or_else(|| Self::missing(bucket, key))?;
        debug!(bucket, key, from = %entry.tier, to = %tier, "changing storage tier");
        entry.tier = tier;
        // A tier move supersedes any earlier restore
        entry.restore = ObjectRestore::None;
        Ok(())
    }

    async fn request_restore(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RestoreTier,
    ) -> Result<()> {
        let mut entry = self
            .objects
            .get_mut(&Self::entry_key(bucket, key))
            .ok_or_else(|| Self::missing(bucket, key))?;
        if !entry.tier.is_cold() {
            return Err(Error::object_store(format!(
                "object {bucket}/{key} is not in a cold tier"
            )));
        }
        if entry.restore == ObjectRestore::InProgress {
            return Err(Error::RestoreAlreadyInProgress);
        }
        debug!(bucket, key, days, %tier, "restore requested");
        entry.restore = ObjectRestore::InProgress;
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        ttl_secs: u64,
        download_name: &str,
    ) -> Result<String> {
        if !self.objects.contains_key(&Self::entry_key(bucket, key)) {
            return Err(Self::missing(bucket, key));
        }
        let secret = self
            .signing_secret
            .get_or_try_load(|| async {
                let mut raw = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut raw);
                Ok::<_, Error>(hex::encode(raw))
            })
            .await?;
        let signature = hex::encode(Sha256::digest(
            format!("{secret}:{bucket}:{key}:{ttl_secs}").as_bytes(),
        ));
        Ok(format!(
            "memory://{bucket}/{key}?expires={ttl_secs}&filename={download_name}&sig={signature}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_stat_roundtrip() {
        let store = MemoryObjectStore::new();
        store
            .put("docs", "docs/abc.pdf", Bytes::from_static(b"hello"), "application/pdf")
            .await
            .unwrap();

        let stat = store.stat("docs", "docs/abc.pdf").await.unwrap();
        assert_eq!(stat.content_type, "application/pdf");
        assert_eq!(stat.size, 5);
        assert_eq!(stat.tier, StorageTier::Standard);
        assert_eq!(stat.restore, ObjectRestore::None);
        assert_eq!(stat.checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_stat_missing_object() {
        let store = MemoryObjectStore::new();
        let err = store.stat("docs", "nope.pdf").await.unwrap_err();
        assert!(matches!(err, Error::ObjectMissing { .. }));
    }

    #[tokio::test]
    async fn test_restore_cycle() {
        let store = MemoryObjectStore::new();
        store
            .put("docs", "docs/abc.pdf", Bytes::from_static(b"x"), "application/pdf")
            .await
            .unwrap();

        // Restore of a standard-tier object is refused
        let err = store
            .request_restore("docs", "docs/abc.pdf", 1, RestoreTier::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ObjectStore(_)));

        store
            .change_tier("docs", "docs/abc.pdf", StorageTier::Archived)
            .await
            .unwrap();
        store
            .request_restore("docs", "docs/abc.pdf", 1, RestoreTier::Expedited)
            .await
            .unwrap();

        let err = store
            .request_restore("docs", "docs/abc.pdf", 1, RestoreTier::Expedited)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RestoreAlreadyInProgress));

        store
            .complete_restore("docs", "docs/abc.pdf", Some("2026-09-01T00:00:00Z".into()))
            .unwrap();
        let stat = store.stat("docs", "docs/abc.pdf").await.unwrap();
        assert!(matches!(stat.restore, ObjectRestore::Restored { .. }));
        // Still archived: restore grants temporary access, not a tier change
        assert_eq!(stat.tier, StorageTier::Archived);
    }

    #[tokio::test]
    async fn test_tier_change_clears_restore() {
        let store = MemoryObjectStore::new();
        store
            .put("docs", "k", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        store.change_tier("docs", "k", StorageTier::Archived).await.unwrap();
        store
            .request_restore("docs", "k", 2, RestoreTier::Bulk)
            .await
            .unwrap();
        store.complete_restore("docs", "k", None).unwrap();

        store.change_tier("docs", "k", StorageTier::DeepArchived).await.unwrap();
        let stat = store.stat("docs", "k").await.unwrap();
        assert_eq!(stat.restore, ObjectRestore::None);
    }

    #[tokio::test]
    async fn test_presigned_url_stable_until_rotation() {
        let store = MemoryObjectStore::new();
        store
            .put("docs", "k", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();

        let a = store.presigned_get_url("docs", "k", 60, "k").await.unwrap();
        let b = store.presigned_get_url("docs", "k", 60, "k").await.unwrap();
        assert_eq!(a, b);

        store.rotate_signing_secret().await;
        let c = store.presigned_get_url("docs", "k", 60, "k").await.unwrap();
        assert_ne!(a, c);
    }
}
