//! Query cache with request coalescing
//!
//! Every read goes through [`QueryCache::get`]:
//!
//! ```text
//!   get(key, fetcher, enabled)
//!        │
//!        ├── disabled ────────────────► snapshot (no fetch, state untouched)
//!        ├── superseded fetch ────────► wait for it, then read again
//!        ├── fetch in flight ─────────► subscribe to its broadcast, await
//!        ├── fresh value ─────────────► snapshot (hit)
//!        └── missing / stale / failed ► spawn fetch, register ticket, await
//! ```
//!
//! Fetches run on a spawned task so a dropped caller never strands the other
//! waiters, and a panicking fetcher settles as a failed fetch. At most one
//! fetch per key is outstanding. `invalidate`, `evict`, `clear` and direct
//! writes mark the in-flight fetch superseded: its result is delivered to the
//! callers already waiting on it but never written into the entry, and later
//! reads wait for it to settle before fetching again.

use super::key::QueryKey;
use super::state::{QueryState, QueryStatus};
use crate::error::{Result, SdkError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a query cache
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// Name used in log fields
    pub name: String,
    /// Age after which a resolved value is re-fetched on the next read.
    /// `None` keeps values fresh until invalidated.
    pub stale_time: Option<Duration>,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            name: "query".to_string(),
            stale_time: None,
        }
    }
}

impl QueryCacheConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_stale_time(mut self, stale_time: Option<Duration>) -> Self {
        self.stale_time = stale_time;
        self
    }
}

// =============================================================================
// Entries
// =============================================================================

type FetchResult<V> = Result<V>;

/// Fetch currently attached to an entry
struct InFlight<V> {
    ticket: u64,
    sender: broadcast::Sender<FetchResult<V>>,
    started_at: Instant,
    /// The entry was invalidated, evicted or written while this ran
    superseded: bool,
}

struct Entry<V> {
    value: Option<V>,
    error: Option<SdkError>,
    stale: bool,
    updated_at: Option<Instant>,
    fetch: Option<InFlight<V>>,
}

impl<V: Clone> Entry<V> {
    fn empty() -> Self {
        Self {
            value: None,
            error: None,
            stale: false,
            updated_at: None,
            fetch: None,
        }
    }

    fn is_fresh(&self, stale_time: Option<Duration>) -> bool {
        if self.value.is_none() || self.stale || self.error.is_some() {
            return false;
        }
        match (stale_time, self.updated_at) {
            (Some(ttl), Some(at)) => at.elapsed() < ttl,
            _ => true,
        }
    }

    /// A read now would wait on, or start, a fetch
    fn is_loading(&self, stale_time: Option<Duration>) -> bool {
        match &self.fetch {
            Some(fetch) => !fetch.superseded || !self.is_fresh(stale_time),
            None => false,
        }
    }

    fn snapshot(&self, stale_time: Option<Duration>) -> QueryState<V> {
        let status = if self.is_loading(stale_time) {
            QueryStatus::Loading
        } else if self.error.is_some() {
            QueryStatus::Error
        } else if self.value.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        };

        QueryState {
            data: self.value.clone(),
            status,
            error: self.error.clone(),
            is_stale: self.value.is_some() && !self.is_fresh(stale_time),
        }
    }

    fn write(&mut self, value: V) {
        self.value = Some(value);
        self.error = None;
        self.stale = false;
        self.updated_at = Some(Instant::now());
    }

    fn supersede_fetch(&mut self) {
        if let Some(fetch) = self.fetch.as_mut() {
            fetch.superseded = true;
        }
    }

    /// Drop held state. Returns `false` when nothing is in flight and the
    /// entry can be removed; otherwise it stays as a placeholder that
    /// carries the superseded fetch.
    fn release(&mut self) -> bool {
        match self.fetch.as_mut() {
            Some(fetch) => fetch.superseded = true,
            None => return false,
        }
        self.value = None;
        self.error = None;
        self.stale = false;
        self.updated_at = None;
        true
    }
}

/// What a `get` does after inspecting the entry
enum Step<V> {
    Ready(QueryState<V>),
    Await(broadcast::Receiver<FetchResult<V>>, u64),
    WaitSuperseded(broadcast::Receiver<FetchResult<V>>, u64),
}

// =============================================================================
// Statistics
// =============================================================================

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct QueryCacheStats {
    /// Number of entries held
    pub entries: usize,
    /// Reads answered from a fresh value
    pub hits: u64,
    /// Reads that started a fetch
    pub misses: u64,
    /// Fetches started (equals misses)
    pub fetches: u64,
    /// Reads that attached to an in-flight fetch
    pub coalesced: u64,
}

impl QueryCacheStats {
    /// Calculate hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

// =============================================================================
// Query Cache
// =============================================================================

struct Shared<V> {
    config: QueryCacheConfig,
    entries: RwLock<HashMap<QueryKey, Entry<V>>>,
    next_ticket: AtomicU64,
    version: watch::Sender<u64>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

/// Keyed cache of asynchronously fetched values
///
/// Cloning is cheap and yields a handle to the same store.
///
/// # Example
///
/// ```rust,ignore
/// let cache: QueryCache<Profile> = QueryCache::new(QueryCacheConfig::named("profile"));
/// let key = QueryKey::new("profile").with("u1");
///
/// let state = cache.get(&key, move || async move { client.fetch_profile("u1").await }, true).await;
/// if let Some(profile) = state.data { /* ... */ }
///
/// cache.invalidate(&QueryKey::new("profile")).await; // next get re-fetches
/// ```
pub struct QueryCache<V> {
    inner: Arc<Shared<V>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache
    pub fn new(config: QueryCacheConfig) -> Self {
        debug!(cache = %config.name, stale_time = ?config.stale_time, "QueryCache initialized");
        let (version, _) = watch::channel(0);

        Self {
            inner: Arc::new(Shared {
                config,
                entries: RwLock::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
                version,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
            }),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(QueryCacheConfig::default())
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.inner.config
    }

    /// Read `key`, fetching with `fetcher` when enabled and no fresh value
    /// exists.
    ///
    /// With `enabled == false` this is [`peek`](Self::peek): nothing is
    /// fetched and prior state is left untouched. Concurrent reads of the
    /// same key share one fetch. A failed fetch is not retried; the next
    /// enabled read starts a new one.
    pub async fn get<F, Fut>(&self, key: &QueryKey, fetcher: F, enabled: bool) -> QueryState<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if !enabled {
            debug!(cache = %self.inner.config.name, key = %key, "Query disabled, skipping fetch");
            return self.peek(key).await;
        }

        let mut fetcher = Some(fetcher);
        loop {
            match self.plan(key, &mut fetcher).await {
                Step::Ready(state) => return state,
                Step::WaitSuperseded(mut receiver, ticket) => {
                    if receiver.recv().await.is_err() {
                        self.inner.abandon(key, ticket).await;
                    }
                }
                Step::Await(mut receiver, ticket) => {
                    return match receiver.recv().await {
                        Ok(Ok(value)) => QueryState::success(value),
                        Ok(Err(error)) => QueryState::failed(self.peek(key).await.data, error),
                        Err(_) => {
                            self.inner.abandon(key, ticket).await;
                            QueryState::failed(
                                self.peek(key).await.data,
                                SdkError::Fetch(format!("fetch for {} was abandoned", key)),
                            )
                        }
                    };
                }
            }
        }
    }

    /// Decide under the entries lock whether to answer, attach or fetch
    async fn plan<F, Fut>(&self, key: &QueryKey, fetcher: &mut Option<F>) -> Step<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let stale_time = self.inner.config.stale_time;
        let mut entries = self.inner.entries.write().await;
        let entry = entries.entry(key.clone()).or_insert_with(Entry::empty);

        match &entry.fetch {
            Some(fetch) if fetch.superseded => {
                if entry.is_fresh(stale_time) {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    return Step::Ready(entry.snapshot(stale_time));
                }
                debug!(
                    cache = %self.inner.config.name,
                    key = %key,
                    ticket = fetch.ticket,
                    "Waiting for superseded fetch before refetching"
                );
                return Step::WaitSuperseded(fetch.sender.subscribe(), fetch.ticket);
            }
            Some(fetch) => {
                self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(
                    cache = %self.inner.config.name,
                    key = %key,
                    ticket = fetch.ticket,
                    waiting = fetch.sender.receiver_count(),
                    "Attaching to in-flight fetch"
                );
                return Step::Await(fetch.sender.subscribe(), fetch.ticket);
            }
            None if entry.is_fresh(stale_time) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.inner.config.name, key = %key, "Query cache hit");
                return Step::Ready(entry.snapshot(stale_time));
            }
            None => {}
        }

        let Some(fetcher) = fetcher.take() else {
            return Step::Ready(entry.snapshot(stale_time));
        };

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = broadcast::channel(1);
        entry.fetch = Some(InFlight {
            ticket,
            sender: sender.clone(),
            started_at: Instant::now(),
            superseded: false,
        });
        debug!(cache = %self.inner.config.name, key = %key, ticket = ticket, "Query cache miss, fetching");

        let future = fetcher();
        let shared = Arc::clone(&self.inner);
        let key = key.clone();
        tokio::spawn(async move {
            let result = match tokio::spawn(future).await {
                Ok(result) => result,
                Err(e) => {
                    error!(cache = %shared.config.name, key = %key, error = %e, "Fetch task failed");
                    Err(SdkError::Fetch(format!("fetch for {} failed: {}", key, e)))
                }
            };
            shared.complete(&key, ticket, result, sender).await;
        });

        Step::Await(receiver, ticket)
    }

    /// Current state of `key` without fetching
    pub async fn peek(&self, key: &QueryKey) -> QueryState<V> {
        let entries = self.inner.entries.read().await;
        entries
            .get(key)
            .map(|entry| entry.snapshot(self.inner.config.stale_time))
            .unwrap_or_default()
    }

    /// Write a value directly, without a fetch
    ///
    /// An in-flight fetch for the key is superseded so its result cannot
    /// overwrite this write.
    pub async fn set_value(&self, key: &QueryKey, value: V) {
        self.update(key, |_| value).await;
    }

    /// Replace the value of `key` with `f(current)`, atomically
    pub async fn update<F>(&self, key: &QueryKey, f: F)
    where
        F: FnOnce(Option<V>) -> V,
    {
        let mut entries = self.inner.entries.write().await;
        let entry = entries.entry(key.clone()).or_insert_with(Entry::empty);
        let next = f(entry.value.take());
        entry.write(next);
        entry.supersede_fetch();
        debug!(cache = %self.inner.config.name, key = %key, "Direct cache write");
        drop(entries);
        self.inner.bump_version();
    }

    /// Modify the value of `key` in place if one has resolved
    ///
    /// Returns `false`, leaving the entry and any pending fetch untouched,
    /// when there is no value yet.
    pub async fn update_existing<F>(&self, key: &QueryKey, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        let mut entries = self.inner.entries.write().await;
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let Some(mut value) = entry.value.take() else {
            return false;
        };
        f(&mut value);
        entry.write(value);
        entry.supersede_fetch();
        debug!(cache = %self.inner.config.name, key = %key, "Patched cached value");
        drop(entries);
        self.inner.bump_version();
        true
    }

    /// Mark every entry under `prefix` stale; returns how many matched
    ///
    /// Values are kept for display but the next enabled `get` re-fetches.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.inner.entries.write().await;
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                entry.supersede_fetch();
                count += 1;
            }
        }
        drop(entries);

        if count > 0 {
            debug!(cache = %self.inner.config.name, prefix = %prefix, count = count, "Invalidated entries");
            self.inner.bump_version();
        }
        count
    }

    /// Remove every entry under `prefix`, dropping held values
    pub async fn evict(&self, prefix: &QueryKey) -> usize {
        let evicted = self.inner.release_where(|key| key.starts_with(prefix)).await;
        if evicted > 0 {
            debug!(cache = %self.inner.config.name, prefix = %prefix, evicted = evicted, "Evicted entries");
        }
        evicted
    }

    /// Remove all entries
    pub async fn clear(&self) {
        let evicted = self.inner.release_where(|_| true).await;
        if evicted > 0 {
            info!(cache = %self.inner.config.name, evicted = evicted, "Query cache cleared");
        }
    }

    /// Version counter, bumped on every change to stored state
    pub fn version(&self) -> u64 {
        *self.inner.version.borrow()
    }

    /// Subscribe to version changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Number of fetches currently in flight
    pub async fn in_flight_count(&self) -> usize {
        let entries = self.inner.entries.read().await;
        entries.values().filter(|e| e.fetch.is_some()).count()
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> QueryCacheStats {
        let misses = self.inner.misses.load(Ordering::Relaxed);
        QueryCacheStats {
            entries: self.len().await,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses,
            fetches: misses,
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
        }
    }
}

impl<V: Clone> Shared<V> {
    /// Settle a finished fetch, then wake its waiters. The result is stored
    /// only if the fetch is still attached and was not superseded. Sending
    /// under the lock keeps subscribe/complete ordered.
    async fn complete(&self, key: &QueryKey, ticket: u64, result: FetchResult<V>, sender: broadcast::Sender<FetchResult<V>>) {
        let mut entries = self.entries.write().await;
        let mut remove_placeholder = false;

        match entries
            .get_mut(key)
            .filter(|entry| entry.fetch.as_ref().map(|f| f.ticket) == Some(ticket))
        {
            Some(entry) => {
                let (superseded, duration_ms) = entry
                    .fetch
                    .take()
                    .map(|f| (f.superseded, f.started_at.elapsed().as_millis()))
                    .unwrap_or_default();

                if superseded {
                    debug!(cache = %self.config.name, key = %key, ticket = ticket, "Discarding superseded fetch result");
                    remove_placeholder = entry.value.is_none() && entry.error.is_none();
                } else {
                    match &result {
                        Ok(value) => {
                            entry.write(value.clone());
                            debug!(cache = %self.config.name, key = %key, duration_ms = duration_ms, "Fetch stored");
                        }
                        Err(e) => {
                            entry.error = Some(e.clone());
                            warn!(cache = %self.config.name, key = %key, error = %e, "Fetch failed");
                        }
                    }
                }
                self.bump_version();
            }
            None => {
                debug!(cache = %self.config.name, key = %key, ticket = ticket, "Discarding result of a released fetch");
            }
        }

        if remove_placeholder {
            entries.remove(key);
        }

        // Receivers may have dropped
        let _ = sender.send(result);
    }

    /// Detach a fetch whose task went away without settling
    async fn abandon(&self, key: &QueryKey, ticket: u64) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            if entry.fetch.as_ref().map(|f| f.ticket) == Some(ticket) {
                entry.fetch = None;
                warn!(cache = %self.config.name, key = %key, ticket = ticket, "Fetch abandoned without a result");
            }
        }
    }

    /// Drop the values of matching entries. Entries with a fetch in flight
    /// stay as placeholders until it settles.
    async fn release_where(&self, matches: impl Fn(&QueryKey) -> bool) -> usize {
        let mut entries = self.entries.write().await;
        let mut released = 0;
        entries.retain(|key, entry| {
            if !matches(key) {
                return true;
            }
            released += 1;
            entry.release()
        });
        drop(entries);

        if released > 0 {
            self.bump_version();
        }
        released
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_fetch(
        counter: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<String>> + Send>> {
        let counter = Arc::clone(counter);
        move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(value.to_string())
            })
        }
    }

    #[tokio::test]
    async fn test_get_fetches_then_hits() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing").with(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get(&key, counting_fetch(&calls, "a"), true).await;
        assert_eq!(first.data.as_deref(), Some("a"));
        assert!(first.is_success());

        let second = cache.get(&key, counting_fetch(&calls, "b"), true).await;
        assert_eq!(second.data.as_deref(), Some("a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.fetches, 1);
    }

    #[tokio::test]
    async fn test_disabled_get_does_not_fetch() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing");
        let calls = Arc::new(AtomicUsize::new(0));

        let state = cache.get(&key, counting_fetch(&calls, "a"), false).await;
        assert_eq!(state.status, QueryStatus::Idle);
        assert!(state.data.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_disabled_get_keeps_prior_value() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing");
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get(&key, counting_fetch(&calls, "a"), true).await;
        cache.invalidate(&key).await;

        let state = cache.get(&key, counting_fetch(&calls, "b"), false).await;
        assert_eq!(state.data.as_deref(), Some("a"));
        assert!(state.is_stale);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing").with("shared");
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            cache.get(&key, counting_fetch(&calls, "first"), true),
            cache.get(&key, counting_fetch(&calls, "second"), true),
            cache.get(&key, counting_fetch(&calls, "third"), true),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data.as_deref(), Some("first"));
        assert_eq!(b.data.as_deref(), Some("first"));
        assert_eq!(c.data.as_deref(), Some("first"));
        assert_eq!(cache.stats().await.coalesced, 2);
        assert_eq!(cache.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("profile").with("u1");
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get(&key, counting_fetch(&calls, "v1"), true).await;
        assert_eq!(cache.invalidate(&QueryKey::new("profile")).await, 1);

        let state = cache.get(&key, counting_fetch(&calls, "v2"), true).await;
        assert_eq!(state.data.as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_value_and_does_not_retry() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing");
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get(&key, counting_fetch(&calls, "good"), true).await;
        cache.invalidate(&key).await;

        let failed = cache
            .get(&key, || async { Err::<String, _>(SdkError::Fetch("boom".into())) }, true)
            .await;
        assert!(failed.is_error());
        assert_eq!(failed.data.as_deref(), Some("good"));
        assert_eq!(failed.error, Some(SdkError::Fetch("boom".into())));

        let peeked = cache.peek(&key).await;
        assert!(peeked.is_error());
        assert_eq!(cache.in_flight_count().await, 0);

        // An explicit get re-attempts
        let recovered = cache.get(&key, counting_fetch(&calls, "again"), true).await;
        assert_eq!(recovered.data.as_deref(), Some("again"));
        assert!(recovered.is_success());
    }

    #[tokio::test]
    async fn test_set_value_is_not_overwritten_by_late_fetch() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing");

        let slow = cache.get(
            &key,
            || async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok("late".to_string())
            },
            true,
        );
        let write = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cache.set_value(&key, "optimistic".to_string()).await;
        };
        let (late, _) = tokio::join!(slow, write);

        // The waiter still receives what it asked for...
        assert_eq!(late.data.as_deref(), Some("late"));
        // ...but the entry keeps the direct write
        assert_eq!(cache.peek(&key).await.data.as_deref(), Some("optimistic"));
    }

    #[tokio::test]
    async fn test_stale_time_expires_values() {
        let cache: QueryCache<String> = QueryCache::new(
            QueryCacheConfig::named("short").with_stale_time(Some(Duration::from_millis(10))),
        );
        let key = QueryKey::new("thing");
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get(&key, counting_fetch(&calls, "a"), true).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.peek(&key).await.is_stale);

        cache.get(&key, counting_fetch(&calls, "b"), true).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_evict_and_version() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let mut versions = cache.subscribe();
        let start = cache.version();

        cache.set_value(&QueryKey::new("pdf").with("a"), "x".into()).await;
        cache.set_value(&QueryKey::new("pdf").with("b"), "y".into()).await;
        cache.set_value(&QueryKey::new("other"), "z".into()).await;
        assert!(versions.has_changed().unwrap());
        assert_eq!(cache.version(), start + 3);

        assert_eq!(cache.evict(&QueryKey::new("pdf")).await, 2);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
        versions.borrow_and_update();
        assert!(!versions.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_panicking_fetch_settles_as_error() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing");
        let calls = Arc::new(AtomicUsize::new(0));

        let explode = true;
        let crashed = cache
            .get(
                &key,
                move || async move {
                    if explode {
                        panic!("fetcher blew up");
                    }
                    Ok::<_, SdkError>("never".to_string())
                },
                true,
            )
            .await;
        assert!(crashed.is_error());
        assert!(matches!(crashed.error, Some(SdkError::Fetch(_))));
        assert_eq!(cache.in_flight_count().await, 0);

        let recovered = tokio::time::timeout(
            Duration::from_millis(500),
            cache.get(&key, counting_fetch(&calls, "ok"), true),
        )
        .await
        .expect("key must not stay wedged");
        assert_eq!(recovered.data.as_deref(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Fetcher that records how many fetches for the key run at once
    fn tracked_fetch(
        running: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<String>> + Send>> {
        let running = Arc::clone(running);
        let peak = Arc::clone(peak);
        let calls = Arc::clone(calls);
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(40)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(value.to_string())
            })
        }
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_keeps_one_outstanding() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing");
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get(&key, tracked_fetch(&running, &peak, &calls, "v1"), true);
        let second = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(cache.invalidate(&key).await, 1);
            cache.get(&key, tracked_fetch(&running, &peak, &calls, "v2"), true).await
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.data.as_deref(), Some("v1"));
        assert_eq!(second.data.as_deref(), Some("v2"));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.peek(&key).await.data.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_evict_during_fetch_refetches_after_it_settles() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("pdf").with("a");
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get(&key, tracked_fetch(&running, &peak, &calls, "old"), true);
        let second = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(cache.evict(&QueryKey::new("pdf")).await, 1);
            assert!(cache.peek(&key).await.data.is_none());
            cache.get(&key, tracked_fetch(&running, &peak, &calls, "new"), true).await
        };
        let (_, second) = tokio::join!(first, second);

        assert_eq!(second.data.as_deref(), Some("new"));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_existing_requires_a_value() {
        let cache: QueryCache<String> = QueryCache::with_defaults();
        let key = QueryKey::new("thing");
        let calls = Arc::new(AtomicUsize::new(0));

        let pending = cache.get(&key, counting_fetch(&calls, "fetched"), true);
        let patch = async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            cache.update_existing(&key, |v| v.push('!')).await
        };
        let (resolved, patched) = tokio::join!(pending, patch);

        // Nothing to patch yet, and the pending fetch still lands
        assert!(!patched);
        assert_eq!(resolved.data.as_deref(), Some("fetched"));
        assert_eq!(cache.peek(&key).await.data.as_deref(), Some("fetched"));

        assert!(cache.update_existing(&key, |v| v.push('!')).await);
        assert_eq!(cache.peek(&key).await.data.as_deref(), Some("fetched!"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
