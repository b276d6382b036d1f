use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::FetchError;

pub type FetchResult<V> = Result<Arc<V>, FetchError>;
type SharedFetch<V> = Shared<BoxFuture<'static, FetchResult<V>>>;

struct Stored<V> {
    value: Arc<V>,
    fetched_at: Instant,
}

struct InFlight<V> {
    ticket: u64,
    future: SharedFetch<V>,
}

struct Slot<V> {
    stored: Option<Stored<V>>,
    in_flight: Option<InFlight<V>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            stored: None,
            in_flight: None,
        }
    }
}

type Slots<K, V> = Arc<Mutex<HashMap<K, Slot<V>>>>;

enum Lookup<V> {
    Fresh(Arc<V>),
    Stale(Arc<V>),
    Wait(SharedFetch<V>),
}

/// Keyed query cache with time-based staleness and at most one request in flight per key.
///
/// A stale entry is served immediately while one background refetch runs. Every fetch
/// is driven by its own task, so it lands even when all of its callers go away. Errors
/// are shared with every waiter but never stored; a stored value survives a failed
/// refetch.
pub struct QueryCache<K, V> {
    name: &'static str,
    fresh_for: Duration,
    slots: Slots<K, V>,
    tickets: AtomicU64,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(name: &'static str, fresh_for: Duration) -> Self {
        Self {
            name,
            fresh_for,
            slots: Arc::new(Mutex::new(HashMap::new())),
            tickets: AtomicU64::new(0),
        }
    }

    pub fn fresh_for(&self) -> Duration {
        self.fresh_for
    }

    /// Returns the cached value for `key`, fetching with `fetch` only when needed.
    pub async fn get<F, Fut>(&self, key: K, fetch: F) -> FetchResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let lookup = {
            let mut slots = lock(&self.slots);
            let slot = slots.entry(key.clone()).or_default();
            let stored = slot.stored.as_ref().map(|stored| {
                (
                    Arc::clone(&stored.value),
                    stored.fetched_at.elapsed() < self.fresh_for,
                )
            });
            let joined = slot
                .in_flight
                .as_ref()
                .map(|in_flight| in_flight.future.clone());
            match (stored, joined) {
                (Some((value, true)), _) => {
                    trace!(cache = self.name, ?key, "cache hit");
                    Lookup::Fresh(value)
                }
                (Some((value, false)), Some(_)) => Lookup::Stale(value),
                (Some((value, false)), None) => {
                    debug!(cache = self.name, ?key, "entry is stale; refetching in background");
                    let _ = self.start(slot, &key, fetch);
                    Lookup::Stale(value)
                }
                (None, Some(future)) => {
                    trace!(cache = self.name, ?key, "joining in-flight request");
                    Lookup::Wait(future)
                }
                (None, None) => Lookup::Wait(self.start(slot, &key, fetch)),
            }
        };

        match lookup {
            Lookup::Fresh(value) | Lookup::Stale(value) => Ok(value),
            Lookup::Wait(future) => future.await,
        }
    }

    /// Fetches regardless of freshness, joining a request that is already in flight.
    pub async fn refetch<F, Fut>(&self, key: K, fetch: F) -> FetchResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let future = {
            let mut slots = lock(&self.slots);
            let slot = slots.entry(key.clone()).or_default();
            match &slot.in_flight {
                Some(in_flight) => in_flight.future.clone(),
                None => self.start(slot, &key, fetch),
            }
        };
        future.await
    }

    /// Stored value for `key`, fresh or not, without fetching.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        lock(&self.slots)
            .get(key)
            .and_then(|slot| slot.stored.as_ref())
            .map(|stored| Arc::clone(&stored.value))
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.slots)
            .get(key)
            .is_some_and(|slot| slot.in_flight.is_some())
    }

    /// Drops the stored value; a request already in flight still lands.
    pub fn invalidate(&self, key: &K) {
        if let Some(slot) = lock(&self.slots).get_mut(key) {
            slot.stored = None;
        }
    }

    pub fn invalidate_all(&self) {
        for slot in lock(&self.slots).values_mut() {
            slot.stored = None;
        }
    }

    fn start<F, Fut>(&self, slot: &mut Slot<V>, key: &K, fetch: F) -> SharedFetch<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let request = fetch();
        let slots = Arc::clone(&self.slots);
        let key = key.clone();
        let name = self.name;
        let future = async move {
            let result = request.await.map(Arc::new);
            complete(&slots, &key, ticket, &result);
            if let Err(err) = &result {
                debug!(cache = name, ?key, error = %err, "fetch failed");
            }
            result
        }
        .boxed()
        .shared();
        tokio::spawn(future.clone().map(drop));
        slot.in_flight = Some(InFlight {
            ticket,
            future: future.clone(),
        });
        future
    }
}

fn complete<K, V>(slots: &Slots<K, V>, key: &K, ticket: u64, result: &FetchResult<V>)
where
    K: Eq + Hash,
{
    let mut slots = lock(slots);
    let Some(slot) = slots.get_mut(key) else {
        return;
    };
    if slot
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| in_flight.ticket == ticket)
    {
        slot.in_flight = None;
    }
    if let Ok(value) = result {
        slot.stored = Some(Stored {
            value: Arc::clone(value),
            fetched_at: Instant::now(),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
