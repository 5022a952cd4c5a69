//! Per-key query cache with request deduplication and background refresh.
//!
//! Every `(endpoint, filters)` pair owns one slot holding a
//! [`watch`] channel of [`CacheEntry`] values. Transitions are decided under
//! the slot map lock, which is what guarantees at most one fetch in flight per
//! key; the fetch itself runs on a spawned task and publishes its outcome by
//! replacing the entry. Consumers either take a snapshot ([`QueryCache::access`]),
//! await a result ([`QueryCache::get`], [`QueryCache::load`]), or watch the
//! entry change over time ([`QueryCache::subscribe`]).
//!
//! All methods that may start a fetch must be called inside a Tokio runtime.

use crate::config::ClientConfig;
use crate::error::CacheError;
use crate::error::GatewayError;
use crate::error::Result;
use crate::gateway::MetricsSource;
use crate::request;
use lru::LruCache;
use nftel_protocol::Endpoint;
use nftel_protocol::FilterValue;
use nftel_protocol::MetricsPayload;
use nftel_protocol::MetricsResponse;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);
const DEFAULT_CAPACITY: usize = 256;

/// Identity of a cached response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub endpoint: Endpoint,
    pub filters: FilterValue,
}

impl CacheKey {
    pub fn new(endpoint: Endpoint, filters: FilterValue) -> Self {
        Self { endpoint, filters }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// Nothing fetched yet.
    Empty,
    /// First fetch in flight; no payload to show.
    Loading,
    /// Payload present and younger than the staleness window.
    Fresh,
    /// Payload present but older than the staleness window.
    Stale,
    /// Fetch in flight while the previous payload stays visible.
    Refreshing,
    /// Fetch failed and there is no payload to fall back on.
    Failed,
    /// Refresh failed; the previous payload is still served.
    FailedWithStaleData,
}

impl CacheState {
    pub fn is_fetching(self) -> bool {
        matches!(self, CacheState::Loading | CacheState::Refreshing)
    }
}

/// Snapshot of one key. Each transition publishes a new value.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub state: CacheState,
    pub data: Option<Arc<MetricsPayload>>,
    pub fetched_at: Option<Instant>,
    pub error: Option<GatewayError>,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            state: CacheState::Empty,
            data: None,
            fetched_at: None,
            error: None,
        }
    }

    fn with_state(&self, state: CacheState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Nothing to render yet and a fetch is on its way.
    pub fn is_loading(&self) -> bool {
        self.state == CacheState::Loading
    }

    /// Typed view of the payload, if any.
    pub fn payload<R: MetricsResponse>(&self) -> Option<&R> {
        self.data.as_deref().and_then(R::from_payload)
    }

    /// Stale data wins over the error when both are present.
    pub fn result(&self) -> Option<Result<Arc<MetricsPayload>>> {
        match (&self.data, &self.error) {
            (Some(data), _) => Some(Ok(Arc::clone(data))),
            (None, Some(err)) => Some(Err(CacheError::Fetch(err.clone()))),
            (None, None) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheOptions {
    pub stale_after: Duration,
    pub capacity: NonZeroUsize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY)
                .unwrap_or_else(|| unreachable!("cache capacity must be non-zero")),
        }
    }
}

impl From<&ClientConfig> for CacheOptions {
    fn from(config: &ClientConfig) -> Self {
        let defaults = Self::default();
        Self {
            stale_after: config.stale_after(),
            capacity: NonZeroUsize::new(config.cache_capacity).unwrap_or(defaults.capacity),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Accesses answered from a fresh entry.
    pub hits: u64,
    /// Accesses that attached to a fetch already in flight.
    pub joins: u64,
    /// Fetches started.
    pub fetches: u64,
    /// Idle entries dropped to stay within capacity.
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    joins: AtomicU64,
    fetches: AtomicU64,
    evictions: AtomicU64,
}

type Slot = Arc<watch::Sender<CacheEntry>>;

struct Inner<S> {
    source: S,
    options: CacheOptions,
    slots: Mutex<LruCache<CacheKey, Slot>>,
    counters: Counters,
}

/// Explicitly constructed query cache. Clones share the same entries.
pub struct QueryCache<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for QueryCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// How an access was resolved, decided under the slot lock.
enum Resolution {
    Hit,
    Join,
    Fetch,
    Idle,
}

impl<S: MetricsSource> QueryCache<S> {
    pub fn new(source: S, options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                options,
                slots: Mutex::new(LruCache::unbounded()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn options(&self) -> CacheOptions {
        self.inner.options
    }

    /// Resolve `key` without waiting and return what consumers should show.
    ///
    /// Starts a fetch when the key is empty, and a background refresh when
    /// the payload has gone stale. Failed entries are left alone; use
    /// [`QueryCache::refresh`] to try again.
    pub fn access(&self, endpoint: Endpoint, filters: &FilterValue) -> CacheEntry {
        self.resolve(CacheKey::new(endpoint, *filters), false).1
    }

    /// Fetch again unless a fetch is already in flight, keeping any payload
    /// visible meanwhile.
    pub fn refresh(&self, endpoint: Endpoint, filters: &FilterValue) -> CacheEntry {
        self.resolve(CacheKey::new(endpoint, *filters), true).1
    }

    /// Watch one key. Counts as an access.
    pub fn subscribe(
        &self,
        endpoint: Endpoint,
        filters: &FilterValue,
    ) -> watch::Receiver<CacheEntry> {
        self.resolve(CacheKey::new(endpoint, *filters), false)
            .0
            .subscribe()
    }

    /// Current snapshot without touching recency or starting a fetch.
    pub fn peek(&self, endpoint: Endpoint, filters: &FilterValue) -> CacheEntry {
        let key = CacheKey::new(endpoint, *filters);
        let entry = self
            .lock()
            .peek(&key)
            .map(|slot| slot.borrow().clone());
        match entry {
            Some(entry) => self.aged(entry, Instant::now()),
            None => CacheEntry::empty(),
        }
    }

    /// Payload for `key`, waiting for the first fetch if there is none yet.
    pub async fn get(&self, endpoint: Endpoint, filters: &FilterValue) -> Result<Arc<MetricsPayload>> {
        let (slot, entry) = self.resolve(CacheKey::new(endpoint, *filters), false);
        if let Some(result) = entry.result()
            && !entry.is_loading()
        {
            return result;
        }
        let mut rx = slot.subscribe();
        drop(slot);
        let settled = rx
            .wait_for(|entry| !entry.is_loading())
            .await
            .map_err(|_| CacheError::Interrupted(endpoint))?
            .clone();
        settled.result().unwrap_or(Err(CacheError::Interrupted(endpoint)))
    }

    /// Typed form of [`QueryCache::get`].
    pub async fn load<R: MetricsResponse>(&self, filters: &FilterValue) -> Result<R> {
        let payload = self.get(R::ENDPOINT, filters).await?;
        R::from_payload(&payload)
            .cloned()
            .ok_or(CacheError::PayloadMismatch {
                expected: R::ENDPOINT,
                actual: payload.endpoint(),
            })
    }

    /// Forget every cached payload and error. Entries with a fetch in flight
    /// keep their slot as `Loading` without data, so the fetch is still
    /// joined and at most one runs per key.
    pub fn reset(&self) {
        let mut slots = self.lock();
        let idle: Vec<CacheKey> = slots
            .iter()
            .filter(|(_, slot)| !slot.borrow().state.is_fetching())
            .map(|(key, _)| *key)
            .collect();
        for key in idle {
            slots.pop(&key);
        }
        for (_, slot) in slots.iter() {
            slot.send_replace(CacheEntry::empty().with_state(CacheState::Loading));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            joins: counters.joins.load(Ordering::Relaxed),
            fetches: counters.fetches.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
        }
    }

    fn resolve(&self, key: CacheKey, force: bool) -> (Slot, CacheEntry) {
        let now = Instant::now();
        let mut slots = self.lock();
        let slot = match slots.get(&key) {
            Some(slot) => Arc::clone(slot),
            None => {
                self.make_room(&mut slots);
                let (tx, _rx) = watch::channel(CacheEntry::empty());
                let slot = Arc::new(tx);
                slots.put(key, Arc::clone(&slot));
                slot
            }
        };

        let current = slot.borrow().clone();
        let (resolution, next_state) = match current.state {
            CacheState::Loading | CacheState::Refreshing => (Resolution::Join, None),
            CacheState::Empty => (Resolution::Fetch, Some(CacheState::Loading)),
            CacheState::Fresh | CacheState::Stale
                if force || self.is_stale(&current, now) =>
            {
                (Resolution::Fetch, Some(CacheState::Refreshing))
            }
            CacheState::Fresh | CacheState::Stale => (Resolution::Hit, None),
            CacheState::Failed if force => (Resolution::Fetch, Some(CacheState::Loading)),
            CacheState::FailedWithStaleData if force => {
                (Resolution::Fetch, Some(CacheState::Refreshing))
            }
            CacheState::Failed | CacheState::FailedWithStaleData => (Resolution::Idle, None),
        };

        let counters = &self.inner.counters;
        match resolution {
            Resolution::Hit => {
                counters.hits.fetch_add(1, Ordering::Relaxed);
            }
            Resolution::Join => {
                counters.joins.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint = %key.endpoint, "joining in-flight fetch");
            }
            Resolution::Fetch | Resolution::Idle => {}
        }

        let Some(state) = next_state else {
            drop(slots);
            return (slot, self.aged(current, now));
        };

        let next = CacheEntry {
            state,
            error: None,
            ..current
        };
        slot.send_replace(next.clone());
        drop(slots);
        self.spawn_fetch(key, Arc::clone(&slot));
        (slot, next)
    }

    fn spawn_fetch(&self, key: CacheKey, slot: Slot) {
        self.inner.counters.fetches.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let request = request::build(key.endpoint, &key.filters);
        debug!(
            endpoint = %key.endpoint,
            request = %request.path_and_query(),
            "starting fetch"
        );
        tokio::spawn(async move {
            let outcome = inner.source.fetch(&request).await;
            let previous = slot.borrow().clone();
            let next = match outcome {
                Ok(payload) => CacheEntry {
                    state: CacheState::Fresh,
                    data: Some(Arc::new(payload)),
                    fetched_at: Some(Instant::now()),
                    error: None,
                },
                Err(err) => {
                    warn!(
                        endpoint = %key.endpoint,
                        request = %request.path_and_query(),
                        "fetch failed: {err}"
                    );
                    match previous.data {
                        Some(data) => CacheEntry {
                            state: CacheState::FailedWithStaleData,
                            data: Some(data),
                            fetched_at: previous.fetched_at,
                            error: Some(err),
                        },
                        None => CacheEntry {
                            state: CacheState::Failed,
                            data: None,
                            fetched_at: None,
                            error: Some(err),
                        },
                    }
                }
            };
            slot.send_replace(next);
        });
    }

    /// Evict least recently used idle entries until there is room for one
    /// more. Entries with a fetch in flight are never evicted.
    fn make_room(&self, slots: &mut LruCache<CacheKey, Slot>) {
        while slots.len() >= self.inner.options.capacity.get() {
            let victim = slots
                .iter()
                .rev()
                .find(|(_, slot)| !slot.borrow().state.is_fetching())
                .map(|(key, _)| *key);
            let Some(victim) = victim else {
                break;
            };
            slots.pop(&victim);
            self.inner.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(endpoint = %victim.endpoint, "evicted cache entry");
        }
    }

    fn is_stale(&self, entry: &CacheEntry, now: Instant) -> bool {
        entry
            .fetched_at
            .is_some_and(|at| now.saturating_duration_since(at) >= self.inner.options.stale_after)
    }

    fn aged(&self, entry: CacheEntry, now: Instant) -> CacheEntry {
        if entry.state == CacheState::Fresh && self.is_stale(&entry, now) {
            entry.with_state(CacheState::Stale)
        } else {
            entry
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Slot>> {
        match self.inner.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
