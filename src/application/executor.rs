//! Query executor: runs fetches through the resource cache.
//!
//! Fetches run on their own task. A requester that goes away stops waiting,
//! but the fetch still settles into the cache for everyone else.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use metrics::{counter, histogram};
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cache::{
    Begin, CacheEntry, Epoch, ErrorInfo, ErrorKind, QueryKey, QueryStatus, ResourceCache, Tag,
};
use crate::infra::transport::{ClientError, Transport};

const METRIC_FETCH: &str = "catalog_fetch_total";
const METRIC_FETCH_ERROR: &str = "catalog_fetch_error_total";
const METRIC_FETCH_MS: &str = "catalog_fetch_ms";

/// A cacheable read against the catalog API.
#[async_trait]
pub trait Query: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn key(&self) -> QueryKey;

    /// Tags known before the fetch runs.
    fn tags(&self) -> HashSet<Tag>;

    /// Tags derived from the fetched data, e.g. one per returned entity.
    fn result_tags(&self, _output: &Self::Output) -> HashSet<Tag> {
        HashSet::new()
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Self::Output, ClientError>;
}

type Fetched<T> = Result<(T, HashSet<Tag>), ClientError>;

#[derive(Clone)]
pub struct QueryExecutor {
    cache: Arc<ResourceCache>,
    transport: Arc<dyn Transport>,
}

impl QueryExecutor {
    pub fn new(cache: Arc<ResourceCache>, transport: Arc<dyn Transport>) -> Self {
        Self { cache, transport }
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Fetch `key` unless a fetch for it is already in flight, then wait for
    /// the entry to settle.
    ///
    /// Dropping the returned future stops delivery only; the fetch itself
    /// keeps running and still commits to the cache.
    pub async fn execute_with<T, F, Fut>(
        &self,
        key: QueryKey,
        tags: HashSet<Tag>,
        fetch: F,
    ) -> CacheEntry
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Fetched<T>> + Send + 'static,
    {
        let mut rx = self.cache.subscribe(&key);
        self.start(&key, tags, fetch);
        wait_settled(&mut rx, &self.cache, &key).await
    }

    pub async fn execute<Q: Query>(&self, query: Q) -> CacheEntry {
        let key = query.key();
        let tags = query.tags();
        let fetch = self.fetcher(query);
        self.execute_with(key, tags, fetch).await
    }

    /// Re-run a query on demand, e.g. after it settled with an error.
    pub async fn refetch<Q: Query>(&self, query: Q) -> CacheEntry {
        info!(key = %query.key(), "Refetch requested");
        self.execute(query).await
    }

    /// Return the cached entry when it is fresh, otherwise fetch.
    pub async fn ensure<Q: Query>(&self, query: Q) -> CacheEntry {
        let entry = self.cache.read(&query.key());
        if entry.is_fresh() {
            return entry;
        }
        self.execute(query).await
    }

    /// Typed result of [`ensure`](Self::ensure).
    pub async fn load<Q: Query>(&self, query: Q) -> Result<Arc<Q::Output>, ErrorInfo> {
        let entry = self.ensure(query).await;
        match entry.status {
            QueryStatus::Success => entry.data::<Q::Output>().ok_or_else(|| {
                ErrorInfo::new(ErrorKind::Decode, "cached payload has an unexpected type")
            }),
            QueryStatus::Error => Err(entry.error.unwrap_or_else(|| {
                ErrorInfo::new(ErrorKind::Network, "fetch failed without detail")
            })),
            QueryStatus::Idle | QueryStatus::Loading => Err(ErrorInfo::new(
                ErrorKind::Network,
                "fetch was discarded before settling",
            )),
        }
    }

    /// Start a background fetch without waiting. Returns `false` when one
    /// was already in flight.
    pub fn prefetch<Q: Query>(&self, query: Q) -> bool {
        let key = query.key();
        let tags = query.tags();
        let fetch = self.fetcher(query);
        self.start(&key, tags, fetch)
    }

    /// Declare interest in `key`. The observer is notified of every
    /// transition of that key and no other.
    pub fn subscribe(&self, key: QueryKey) -> QueryObserver {
        let rx = self.cache.subscribe(&key);
        QueryObserver {
            key,
            rx,
            revalidated_for: None,
        }
    }

    /// Current entry for the observer's key, starting a background fetch
    /// when the entry has never been loaded or has gone stale.
    ///
    /// A stale entry triggers one revalidation per invalidation, however
    /// often it is observed. Errors are not retried here; see
    /// [`refetch`](Self::refetch). Must be called within a Tokio runtime.
    pub fn observe<Q: Query>(&self, observer: &mut QueryObserver, query: Q) -> CacheEntry {
        let entry = self.cache.read(&observer.key);
        if entry.is_fresh() {
            observer.revalidated_for = None;
        }

        let trigger = match entry.status {
            QueryStatus::Idle => true,
            QueryStatus::Loading => false,
            QueryStatus::Success | QueryStatus::Error => {
                entry.stale && observer.revalidated_for != Some(entry.invalidated_at)
            }
        };
        if !trigger {
            return entry;
        }

        if entry.stale {
            observer.revalidated_for = Some(entry.invalidated_at);
            debug!(key = %observer.key, "Revalidating stale entry");
        }
        self.prefetch(query);
        self.cache.read(&observer.key)
    }

    fn fetcher<Q: Query>(
        &self,
        query: Q,
    ) -> impl FnOnce() -> BoxFuture<'static, Fetched<Q::Output>> + Send + 'static {
        let transport = Arc::clone(&self.transport);
        move || {
            Box::pin(async move {
                let output = query.fetch(transport.as_ref()).await?;
                let tags = query.result_tags(&output);
                Ok((output, tags))
            })
        }
    }

    fn start<T, F, Fut>(&self, key: &QueryKey, tags: HashSet<Tag>, fetch: F) -> bool
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Fetched<T>> + Send + 'static,
    {
        let ticket = match self.cache.begin(key, tags) {
            Begin::Started(ticket) => ticket,
            Begin::Coalesced => {
                debug!(key = %key, "Attached to in-flight fetch");
                return false;
            }
        };

        let cache = Arc::clone(&self.cache);
        let span = info_span!("catalog.fetch", key = %key, epoch = ticket.epoch());
        tokio::spawn(
            async move {
                counter!(METRIC_FETCH).increment(1);
                let started = Instant::now();
                let outcome = fetch().await;
                histogram!(METRIC_FETCH_MS).record(started.elapsed().as_secs_f64() * 1_000.0);

                match outcome {
                    Ok((data, extra_tags)) => {
                        cache.complete(&ticket, data, extra_tags);
                    }
                    Err(err) => {
                        counter!(METRIC_FETCH_ERROR).increment(1);
                        warn!(error = %err, "Fetch failed");
                        cache.fail(&ticket, ErrorInfo::from(&err));
                    }
                }
            }
            .instrument(span),
        );
        true
    }
}

/// A consumer's subscription to one query key.
pub struct QueryObserver {
    key: QueryKey,
    rx: watch::Receiver<CacheEntry>,
    revalidated_for: Option<Option<Epoch>>,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Latest entry delivered to this observer.
    pub fn latest(&self) -> CacheEntry {
        self.rx.borrow().clone()
    }

    /// Wait for the next transition of this key. `false` once the cache
    /// dropped the entry.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the entry is no longer loading.
    pub async fn settled(&mut self, cache: &ResourceCache) -> CacheEntry {
        wait_settled(&mut self.rx, cache, &self.key).await
    }
}

impl std::fmt::Debug for QueryObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .field("revalidated_for", &self.revalidated_for)
            .finish_non_exhaustive()
    }
}

async fn wait_settled(
    rx: &mut watch::Receiver<CacheEntry>,
    cache: &ResourceCache,
    key: &QueryKey,
) -> CacheEntry {
    match rx.wait_for(|entry| !entry.is_loading()).await {
        Ok(entry) => entry.clone(),
        Err(_) => cache.read(key),
    }
}
