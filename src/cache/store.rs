use crate::cache::fetch::{CacheEntry, DataFetchCache};
use crate::core::models::ResourceKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide registry of resource caches. Every reader of a key shares the
/// same [`DataFetchCache`], so fetches for that key coalesce across views.
pub struct CacheStore<T> {
    inner: Arc<RwLock<HashMap<ResourceKey, Arc<DataFetchCache<T>>>>>,
}

impl<T> Clone for CacheStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for CacheStore<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T> CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &ResourceKey) -> Arc<DataFetchCache<T>> {
        if let Some(cache) = self.inner.read().await.get(key) {
            return Arc::clone(cache);
        }

        let mut caches = self.inner.write().await;
        Arc::clone(
            caches
                .entry(key.clone())
                .or_insert_with(|| Arc::new(DataFetchCache::new(key.clone()))),
        )
    }

    pub async fn snapshot(&self, key: &ResourceKey) -> Option<CacheEntry<T>> {
        let cache = self.inner.read().await.get(key).cloned()?;
        Some(cache.entry().await)
    }

    /// Resets every cached resource. Caches stay registered so views holding
    /// them keep sharing the same entry.
    pub async fn clear_all(&self) {
        let caches: Vec<_> = self.inner.read().await.values().cloned().collect();
        for cache in &caches {
            cache.reset().await;
        }
        tracing::info!(count = caches.len(), "Cleared resource caches");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fetch::tests::ScriptedSource;
    use crate::cache::CachePhase;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_shares_cache() {
        let store = CacheStore::<i32>::new();
        let a = store.get(&ResourceKey::Sites).await;
        let b = store.get(&ResourceKey::Sites).await;
        let c = store.get(&ResourceKey::Site("1".into())).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_snapshot_and_clear_all() {
        let store = CacheStore::<i32>::new();
        assert!(store.snapshot(&ResourceKey::Alerts).await.is_none());

        let source = ScriptedSource::new(Duration::ZERO, vec![Ok(11)]);
        let cache = store.get(&ResourceKey::Alerts).await;
        cache.fetch(source).await;

        let entry = store.snapshot(&ResourceKey::Alerts).await.unwrap();
        assert_eq!(entry.data, Some(11));

        store.clear_all().await;
        let entry = store.snapshot(&ResourceKey::Alerts).await.unwrap();
        assert_eq!(entry.phase, CachePhase::Idle);
        assert!(entry.data.is_none());
    }
}
