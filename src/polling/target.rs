use crate::cache::DataFetchCache;
use crate::sources::DataSource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Why the controller is asking for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Initial,
    Scheduled,
    Manual,
}

/// Whatever a polling controller refreshes. Failures come back as the
/// message to show next to the stale data.
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    fn describe(&self) -> String;
    async fn poll(&self, kind: PollKind) -> Result<(), String>;
}

/// Polls a data source through its shared cache. The initial poll is served
/// from a cache entry younger than `ttl`, so a new view can reuse data another
/// view just fetched; scheduled and manual polls always fetch.
pub struct CachedResource<T> {
    cache: Arc<DataFetchCache<T>>,
    source: Arc<dyn DataSource<T>>,
    ttl: Duration,
}

impl<T> CachedResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        cache: Arc<DataFetchCache<T>>,
        source: Arc<dyn DataSource<T>>,
        ttl: Duration,
    ) -> Self {
        Self { cache, source, ttl }
    }
}

#[async_trait]
impl<T> PollTarget for CachedResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn describe(&self) -> String {
        self.cache.key().to_string()
    }

    async fn poll(&self, kind: PollKind) -> Result<(), String> {
        let entry = match kind {
            PollKind::Initial => {
                self.cache
                    .ensure_fresh(Arc::clone(&self.source), self.ttl)
                    .await
            }
            PollKind::Scheduled | PollKind::Manual => {
                self.cache.fetch(Arc::clone(&self.source)).await
            }
        };

        match entry.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
