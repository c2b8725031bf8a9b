//! In-memory query cache with freshness windows, request de-duplication and
//! explicit invalidation. One instance is created per session and passed
//! around explicitly so tests can run isolated caches side by side.
use crate::error::ApiError;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Logical identifier of a cached resource: a resource name plus an optional
/// id/params segment, e.g. `categories` or `article/{uuid}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: String,
    param: Option<String>,
}

impl QueryKey {
    pub fn resource(name: impl Into<String>) -> Self {
        Self {
            resource: name.into(),
            param: None,
        }
    }

    pub fn item(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            resource: name.into(),
            param: Some(param.into()),
        }
    }

    pub fn resource_name(&self) -> &str {
        &self.resource
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}/{}", self.resource, param),
            None => f.write_str(&self.resource),
        }
    }
}

/// Freshness and retention configuration, per resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub default_window: Duration,
    pub retention: Duration,
    pub windows: HashMap<String, Duration>,
}

impl CachePolicy {
    pub fn window_for(&self, resource: &str) -> Duration {
        self.windows
            .get(resource)
            .copied()
            .unwrap_or(self.default_window)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            default_window: Duration::from_secs(300),
            retention: Duration::from_secs(600),
            windows: HashMap::new(),
        }
    }
}

/// Synchronous result-or-pending view of a cache entry. Never fetches.
#[derive(Debug)]
pub enum Snapshot<T> {
    Missing,
    Pending,
    /// Present and within its freshness window.
    Ready(Arc<T>),
    /// Present but invalidated or past its window; a refetch is due.
    Stale(Arc<T>),
}

impl<T> Snapshot<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Snapshot::Pending)
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            Snapshot::Ready(v) | Snapshot::Stale(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Callers that attached to an already in-flight fetch.
    pub coalesced: u64,
    pub evictions: u64,
}

type Payload = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<Payload, ApiError>>>;

struct Entry {
    payload: Option<Payload>,
    fetched_at: Instant,
    last_used: Instant,
    invalidated: bool,
    /// Bumped on every invalidation. A fetch records the generation it started
    /// at; a completion from an older generation must not clear `invalidated`.
    generation: u64,
    in_flight: Option<InFlight>,
}

struct InFlight {
    generation: u64,
    shared: SharedFetch,
}

impl Entry {
    fn new(now: Instant) -> Self {
        Self {
            payload: None,
            fetched_at: now,
            last_used: now,
            invalidated: false,
            generation: 0,
            in_flight: None,
        }
    }
}

struct State {
    entries: HashMap<QueryKey, Entry>,
    stats: CacheStats,
}

/// Cheaply cloneable handle to the shared cache. All mutation happens under
/// one short-lived lock that is never held across an await point.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    policy: CachePolicy,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    stats: CacheStats::default(),
                }),
                policy,
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Serve `key` from cache if fresh, otherwise run `fetch` and store the
    /// result. The freshness window comes from the policy by resource name.
    pub async fn get<T, F>(&self, key: QueryKey, fetch: F) -> Result<Arc<T>, ApiError>
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let window = self.inner.policy.window_for(key.resource_name());
        self.get_with_window(key, window, fetch).await
    }

    /// Like [`get`](Self::get) with an explicit freshness window.
    ///
    /// Concurrent callers for the same key attach to a single in-flight fetch
    /// and all observe the same value or the same error. The fetch itself runs
    /// in a spawned task, so abandoning every waiter does not cancel it and
    /// its result still lands in the cache.
    pub async fn get_with_window<T, F>(
        &self,
        key: QueryKey,
        window: Duration,
        fetch: F,
    ) -> Result<Arc<T>, ApiError>
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let shared = {
            let mut guard = self.inner.state.lock().expect("cache lock poisoned");
            let state = &mut *guard;
            let now = Instant::now();
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            entry.last_used = now;

            if !entry.invalidated {
                if let Some(payload) = &entry.payload {
                    if now.duration_since(entry.fetched_at) < window {
                        state.stats.hits += 1;
                        debug!(key = %key, "cache hit");
                        return Ok(downcast::<T>(&key, payload.clone()));
                    }
                }
            }

            // An in-flight fetch started before an invalidation carries
            // pre-invalidation data; only join one from the current generation.
            let current = entry
                .in_flight
                .as_ref()
                .filter(|f| f.generation == entry.generation);
            if let Some(in_flight) = current {
                state.stats.coalesced += 1;
                debug!(key = %key, "joining in-flight fetch");
                in_flight.shared.clone()
            } else {
                state.stats.misses += 1;
                debug!(key = %key, "cache miss; fetching");
                let cache = self.clone();
                let task_key = key.clone();
                let generation = entry.generation;
                let handle = tokio::spawn(async move {
                    let result = fetch.await.map(|value| Arc::new(value) as Payload);
                    cache.complete(&task_key, generation, &result);
                    result
                });
                let shared = handle
                    .map(|joined| {
                        joined.unwrap_or_else(|err| {
                            Err(ApiError::network(format!("fetch task failed: {err}")))
                        })
                    })
                    .boxed()
                    .shared();
                entry.in_flight = Some(InFlight {
                    generation,
                    shared: shared.clone(),
                });
                shared
            }
        };

        match shared.await {
            Ok(payload) => Ok(downcast::<T>(&key, payload)),
            Err(err) => {
                // A failed fetch never blanks previously valid data.
                let stale = {
                    let guard = self.inner.state.lock().expect("cache lock poisoned");
                    guard.entries.get(&key).and_then(|e| e.payload.clone())
                };
                match stale {
                    Some(payload) => {
                        warn!(key = %key, error = %err, "fetch failed; serving stale payload");
                        Ok(downcast::<T>(&key, payload))
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Record the outcome of a fetch task. Runs inside the spawned task so the
    /// result is stored even when every waiter has gone away.
    ///
    /// `generation` is the entry generation the fetch started at. A result
    /// from an older generation was fetched before an invalidation landed, so
    /// the entry stays invalidated and the payload is kept only as stale data.
    fn complete(&self, key: &QueryKey, generation: u64, result: &Result<Payload, ApiError>) {
        let mut guard = self.inner.state.lock().expect("cache lock poisoned");
        let state = &mut *guard;
        let now = Instant::now();
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now));
        if entry
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation)
        {
            entry.in_flight = None;
        }
        match result {
            Ok(payload) => {
                entry.last_used = now;
                if entry.generation == generation {
                    entry.payload = Some(payload.clone());
                    entry.fetched_at = now;
                    entry.invalidated = false;
                } else if entry.payload.is_none() {
                    entry.payload = Some(payload.clone());
                    entry.fetched_at = now;
                    debug!(key = %key, "superseded fetch stored as stale payload");
                } else {
                    debug!(key = %key, "superseded fetch discarded");
                }
            }
            Err(err) => {
                // Keep any previous payload; the entry stays due for refetch.
                debug!(key = %key, error = %err, "fetch failed; entry unchanged");
            }
        }
    }

    /// Result-or-pending read for views; never triggers a fetch.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Snapshot<T> {
        let guard = self.inner.state.lock().expect("cache lock poisoned");
        let Some(entry) = guard.entries.get(key) else {
            return Snapshot::Missing;
        };
        let window = self.inner.policy.window_for(key.resource_name());
        let now = Instant::now();
        match &entry.payload {
            Some(payload)
                if !entry.invalidated && now.duration_since(entry.fetched_at) < window =>
            {
                Snapshot::Ready(downcast::<T>(key, payload.clone()))
            }
            Some(payload) => Snapshot::Stale(downcast::<T>(key, payload.clone())),
            None if entry.in_flight.is_some() => Snapshot::Pending,
            None => Snapshot::Missing,
        }
    }

    /// Mark one entry stale; the next `get` refetches regardless of window.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut guard = self.inner.state.lock().expect("cache lock poisoned");
        if let Some(entry) = guard.entries.get_mut(key) {
            entry.invalidated = true;
            entry.generation += 1;
            debug!(key = %key, "invalidated");
        }
    }

    /// Mark every entry of a resource stale (all article-list pages at once).
    pub fn invalidate_resource(&self, resource: &str) {
        let mut guard = self.inner.state.lock().expect("cache lock poisoned");
        let mut count = 0usize;
        for (key, entry) in guard.entries.iter_mut() {
            if key.resource == resource {
                entry.invalidated = true;
                entry.generation += 1;
                count += 1;
            }
        }
        debug!(resource, count, "invalidated resource");
    }

    /// Drop entries unused past the retention window. Best-effort
    /// housekeeping; a dropped entry simply refetches on next access.
    pub fn evict_idle(&self) -> usize {
        let mut guard = self.inner.state.lock().expect("cache lock poisoned");
        let state = &mut *guard;
        let now = Instant::now();
        let retention = self.inner.policy.retention;
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.in_flight.is_some() || now.duration_since(entry.last_used) < retention);
        let evicted = before - state.entries.len();
        if evicted > 0 {
            state.stats.evictions += evicted as u64;
            debug!(evicted, "evicted idle cache entries");
        }
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.state.lock().expect("cache lock poisoned").stats
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, payload: Payload) -> Arc<T> {
    payload
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("cache payload type mismatch for key {key}"))
}
