//! Process-scoped read-through cache
//!
//! A lazily-initialized cell for values that are expensive to look up
//! (signing secrets, resolved endpoints) and occasionally rotated. The
//! value is loaded on first access and kept until [`invalidate`] is
//! called. No ambient global: owners embed the cache in their context
//! object and hand out clones.
//!
//! [`invalidate`]: ReadThroughCache::invalidate

use std::sync::Arc;
use tokio::sync::RwLock;

/// Lazily-initialized read-through cache with an explicit invalidation hook
#[derive(Clone, Default)]
pub struct ReadThroughCache<T: Clone> {
    slot: Arc<RwLock<Option<T>>>,
}

impl<T: Clone> ReadThroughCache<T> {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Return the cached value, loading it through `loader` on a miss.
    ///
    /// Concurrent callers during a miss may race to load; the first
    /// writer wins and later loads are discarded, which is fine for the
    /// idempotent lookups this cache is meant for.
    pub async fn get_or_try_load<E, F, Fut>(&self, loader: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.slot.read().await.as_ref() {
            return Ok(value.clone());
        }
        let loaded = loader().await?;
        let mut slot = self.slot.write().await;
        match slot.as_ref() {
            Some(existing) => Ok(existing.clone()),
            None => {
                *slot = Some(loaded.clone());
                Ok(loaded)
            }
        }
    }

    /// Drop the cached value; the next access loads a fresh one
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}
