use crate::core::models::ResourceKey;
use crate::sources::{DataSource, SourceError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePhase {
    Idle,
    Loading,
    Success,
    Refreshing,
    Error,
}

/// Snapshot of one cached resource as readers see it.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub staleness: Option<DateTime<Utc>>,
    pub phase: CachePhase,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            staleness: None,
            phase: CachePhase::Idle,
        }
    }
}

impl<T> CacheEntry<T> {
    /// True when there is no successful fetch younger than `ttl`.
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let Some(fetched_at) = self.staleness else {
            return true;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - fetched_at >= ttl,
            Err(_) => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, CachePhase::Loading | CachePhase::Refreshing)
    }
}

type Completion<T> = watch::Receiver<Option<CacheEntry<T>>>;

struct CacheInner<T> {
    entry: CacheEntry<T>,
    generation: u64,
    in_flight: Option<Completion<T>>,
}

/// Stale-while-revalidate cache for a single resource.
///
/// At most one fetch runs per cache at a time; concurrent callers join it and
/// all observe the same outcome. A failed refresh keeps the previous data and
/// only records the error. Every fetch carries a generation number so an
/// outcome that arrives after [`reset`](Self::reset) is dropped.
pub struct DataFetchCache<T> {
    key: ResourceKey,
    inner: RwLock<CacheInner<T>>,
}

impl<T> DataFetchCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            inner: RwLock::new(CacheInner {
                entry: CacheEntry::default(),
                generation: 0,
                in_flight: None,
            }),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub async fn entry(&self) -> CacheEntry<T> {
        self.inner.read().await.entry.clone()
    }

    /// Fetches the resource, or joins the fetch already in flight, and
    /// returns the entry as it stood when that fetch completed.
    pub async fn fetch(self: &Arc<Self>, source: Arc<dyn DataSource<T>>) -> CacheEntry<T> {
        let mut completion = {
            let mut inner = self.inner.write().await;
            match inner.in_flight.clone() {
                Some(completion) => {
                    tracing::debug!(resource = %self.key, "Joining in-flight fetch");
                    completion
                }
                None => self.begin_fetch(&mut inner, source),
            }
        };

        let completed = completion
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|done| (*done).clone());

        match completed {
            Some(entry) => entry,
            None => self.entry().await,
        }
    }

    /// Serves the cached entry while it is younger than `ttl` and its last
    /// refresh succeeded, fetching otherwise.
    pub async fn ensure_fresh(
        self: &Arc<Self>,
        source: Arc<dyn DataSource<T>>,
        ttl: Duration,
    ) -> CacheEntry<T> {
        let current = self.entry().await;
        if current.phase == CachePhase::Success
            && current.error.is_none()
            && !current.is_stale(ttl, Utc::now())
        {
            tracing::debug!(resource = %self.key, "Serving cached data within TTL");
            return current;
        }
        self.fetch(source).await
    }

    /// Drops all cached state. Outcomes of fetches started before the reset
    /// are discarded.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.generation = inner.generation.wrapping_add(1);
        inner.entry = CacheEntry::default();
        inner.in_flight = None;
        tracing::debug!(resource = %self.key, "Cache entry reset");
    }

    fn begin_fetch(
        self: &Arc<Self>,
        inner: &mut CacheInner<T>,
        source: Arc<dyn DataSource<T>>,
    ) -> Completion<T> {
        inner.generation = inner.generation.wrapping_add(1);
        let generation = inner.generation;

        inner.entry.phase = match inner.entry.phase {
            CachePhase::Success => CachePhase::Refreshing,
            _ => CachePhase::Loading,
        };

        let (done_tx, done_rx) = watch::channel(None);
        inner.in_flight = Some(done_rx.clone());

        // Detached so a cancelled caller cannot leave the entry stuck in flight.
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let result = source.fetch(&cache.key).await;
            let entry = cache.complete(generation, result).await;
            let _ = done_tx.send(Some(entry));
        });

        done_rx
    }

    async fn complete(&self, generation: u64, result: Result<T, SourceError>) -> CacheEntry<T> {
        let mut inner = self.inner.write().await;

        if inner.generation != generation {
            tracing::debug!(resource = %self.key, "Discarding outcome of superseded fetch");
            return inner.entry.clone();
        }
        inner.in_flight = None;

        let entry = &mut inner.entry;
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
                entry.staleness = Some(Utc::now());
                entry.phase = CachePhase::Success;
                tracing::debug!(resource = %self.key, "Fetch succeeded");
            }
            Err(e) => {
                let message = e.to_string();
                if entry.phase == CachePhase::Refreshing {
                    tracing::warn!(
                        resource = %self.key,
                        error = %message,
                        "Refresh failed, keeping stale data"
                    );
                    entry.phase = CachePhase::Success;
                } else {
                    tracing::warn!(resource = %self.key, error = %message, "Fetch failed");
                    entry.phase = CachePhase::Error;
                }
                entry.error = Some(message);
            }
        }

        entry.clone()
    }
}
