//! An async, single-flight, TTL- and LRU-bounded cache.
//!
//! [`AsyncCache`] coalesces concurrent lookups for the same key into one
//! in-flight computation, serves cached results until they expire, evicts
//! the least-recently-*accessed* entry when over capacity, and forgets an
//! entry immediately if its supplier fails so the next call retries instead
//! of replaying the error forever.
//!
//! The supplier's own future is always polled outside the cache's internal
//! lock, so lookups for distinct keys make progress concurrently; only the
//! bookkeeping around the map is ever serialized.
//!
//! The supplier also runs detached from the calling [`AsyncCache::get`]
//! future, in its own [`tokio::spawn`]ed task: if the caller that happened
//! to become the initializer is cancelled (its future dropped) while the
//! supplier is in flight, the computation keeps running and still settles
//! the entry for every other waiter, per spec.md §5's "cancellation of one
//! waiter must not cancel the computation while others remain."

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex as AsyncMutex};

/// Preconditions for [`AsyncCache::new`] were violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CacheConfigError {
    #[error("cache capacity must be at least 1")]
    ZeroCapacity,
    #[error("cache ttl must be greater than zero")]
    NonPositiveTtl,
}

/// Parameters for an [`AsyncCache`]: `{ ttl, capacity }` from spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheParams {
    pub ttl: Duration,
    pub capacity: usize,
}

impl CacheParams {
    pub fn validate(self) -> Result<Self, CacheConfigError> {
        if self.capacity == 0 {
            return Err(CacheConfigError::ZeroCapacity);
        }
        if self.ttl.is_zero() {
            return Err(CacheConfigError::NonPositiveTtl);
        }
        Ok(self)
    }
}

enum Slot<V, E> {
    /// A computation for this key is in flight; late arrivals subscribe.
    InFlight(broadcast::Sender<Result<V, E>>),
    Ready { value: V, created_at: Instant },
}

/// The outcome of racing to claim a key in [`AsyncCache::acquire_lead`].
enum Lead<V, E> {
    /// A fresh value was already cached; no computation needed.
    Cached(V),
    /// Someone else is computing this key; await their broadcast.
    Follower(broadcast::Receiver<Result<V, E>>),
    /// The caller is now responsible for computing and settling this key.
    Initializer(broadcast::Sender<Result<V, E>>),
}

/// Recency bookkeeping for LRU eviction, kept separate from the value map so
/// "access updates recency" doesn't need to touch the (possibly large)
/// cached value itself.
struct Recency<K> {
    tick: u64,
    last_seen: HashMap<K, u64>,
    by_tick: BTreeMap<u64, K>,
}

impl<K: Eq + Hash + Clone + Ord> Recency<K> {
    fn new() -> Self {
        Recency {
            tick: 0,
            last_seen: HashMap::new(),
            by_tick: BTreeMap::new(),
        }
    }

    /// Marks `key` as just-accessed, returning the newly evicted key (if
    /// inserting made the recency set exceed `capacity`).
    fn touch(&mut self, key: K) {
        if let Some(old_tick) = self.last_seen.get(&key) {
            self.by_tick.remove(old_tick);
        }
        self.tick += 1;
        self.last_seen.insert(key.clone(), self.tick);
        self.by_tick.insert(self.tick, key);
    }

    fn forget(&mut self, key: &K) {
        if let Some(old_tick) = self.last_seen.remove(key) {
            self.by_tick.remove(&old_tick);
        }
    }

    /// Pops the least-recently-accessed key, if any.
    fn pop_lru(&mut self) -> Option<K> {
        let (&tick, _) = self.by_tick.iter().next()?;
        let key = self.by_tick.remove(&tick).expect("tick just observed");
        self.last_seen.remove(&key);
        Some(key)
    }

    fn len(&self) -> usize {
        self.last_seen.len()
    }
}

/// The state shared between an [`AsyncCache`] handle and the detached tasks
/// it spawns to run suppliers. Split out from [`AsyncCache`] itself so a
/// supplier task can hold its own `Arc<Inner<..>>` and keep settling the
/// entry after the `get` call that spawned it has been dropped.
struct Inner<K, V, E> {
    entries: DashMap<K, Slot<V, E>>,
    recency: AsyncMutex<Recency<K>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V, E> Inner<K, V, E>
where
    K: Eq + Hash + Clone + Ord + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Atomically decides whether the caller should serve a cached value,
    /// follow an in-flight computation, or become the initializer.
    fn acquire_lead(&self, key: &K) -> Lead<V, E> {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let fresh = match occupied.get() {
                    Slot::Ready { value, created_at } if created_at.elapsed() < self.ttl => {
                        Some(value.clone())
                    }
                    _ => None,
                };
                if let Some(value) = fresh {
                    return Lead::Cached(value);
                }
                match occupied.get() {
                    Slot::InFlight(tx) => Lead::Follower(tx.subscribe()),
                    Slot::Ready { .. } => {
                        let (tx, _rx) = broadcast::channel(1);
                        let handed_out = tx.clone();
                        occupied.insert(Slot::InFlight(tx));
                        Lead::Initializer(handed_out)
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let (tx, _rx) = broadcast::channel(1);
                let handed_out = tx.clone();
                vacant.insert(Slot::InFlight(tx));
                Lead::Initializer(handed_out)
            }
        }
    }

    /// Installs the outcome of a completed `f(key)` call: a fresh `Ready`
    /// slot on success (subject to the LRU bound), or removal on failure
    /// (spec.md §4.A "Failure eviction").
    async fn settle(&self, key: &K, result: &Result<V, E>) {
        match result {
            Ok(value) => {
                self.entries.insert(
                    key.clone(),
                    Slot::Ready {
                        value: value.clone(),
                        created_at: Instant::now(),
                    },
                );
                self.enforce_capacity(key.clone()).await;
            }
            Err(_) => {
                self.entries.remove(key);
                self.recency.lock().await.forget(key);
            }
        }
    }

    async fn enforce_capacity(&self, just_inserted: K) {
        let mut recency = self.recency.lock().await;
        recency.touch(just_inserted);
        while recency.len() > self.capacity {
            if let Some(evicted) = recency.pop_lru() {
                self.entries.remove(&evicted);
            } else {
                break;
            }
        }
    }
}

/// An async, bounded, single-flight, TTL-expiring cache.
///
/// `K` is the lookup key, `V` the cached value, `E` the error `f` may
/// produce. `E` must be `Clone`: when `f(k)` fails, every current waiter for
/// `k` observes the *same* error value (spec.md §4.A "Failure eviction").
pub struct AsyncCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> AsyncCache<K, V, E>
where
    K: Eq + Hash + Clone + Ord + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(params: CacheParams) -> Result<Self, CacheConfigError> {
        let params = params.validate()?;
        Ok(AsyncCache {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                recency: AsyncMutex::new(Recency::new()),
                ttl: params.ttl,
                capacity: params.capacity,
            }),
        })
    }

    /// Returns `f(k)`, coalescing concurrent callers for the same `k` into a
    /// single invocation of `f`, and serving a fresh cached value when one
    /// exists.
    ///
    /// `f` runs in a detached task, not on this call's own future: if this
    /// particular `get` is cancelled while `f` is in flight, the computation
    /// still runs to completion and still settles the entry, so any other
    /// waiter for the same key is never left blocked forever.
    pub async fn get<F, Fut>(&self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce(K) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        loop {
            let mut rx = match self.inner.acquire_lead(&key) {
                Lead::Cached(value) => {
                    self.inner.recency.lock().await.touch(key);
                    return Ok(value);
                }
                Lead::Follower(rx) => rx,
                Lead::Initializer(tx) => {
                    // Subscribe before spawning: a receiver created after
                    // `tx.send` would miss the broadcast entirely, and
                    // `settle` (which the spawned task runs before sending)
                    // already makes the result visible to late arrivals via
                    // the map, so subscribing first is the only ordering
                    // that can't drop a message.
                    let rx = tx.subscribe();
                    let inner = self.inner.clone();
                    let spawn_key = key.clone();
                    tokio::spawn(async move {
                        let result = f(spawn_key.clone()).await;
                        inner.settle(&spawn_key, &result).await;
                        let _ = tx.send(result);
                    });
                    rx
                }
            };

            match rx.recv().await {
                Ok(result) => return result,
                // The initializer task was dropped (panicked) before
                // settling and sending; loop around and race to become the
                // initializer ourselves.
                Err(_) => continue,
            }
        }
    }

    /// Number of entries currently cached (ready or in-flight). Exposed for
    /// tests asserting on LRU behavior.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn params(capacity: usize, ttl_ms: u64) -> CacheParams {
        CacheParams {
            ttl: Duration::from_millis(ttl_ms),
            capacity,
        }
    }

    #[tokio::test]
    async fn single_flight_coalesces_concurrent_callers() {
        let cache: Arc<AsyncCache<&'static str, u32, ()>> =
            Arc::new(AsyncCache::new(params(8, 10_000)).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get("x", |_| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<u32, ()>(7)
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let cache: AsyncCache<&'static str, u32, &'static str> =
            AsyncCache::new(params(8, 10_000)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get("x", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>("boom")
                }
            })
            .await;
        assert_eq!(first, Err("boom"));

        let second = cache
            .get("x", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, &'static str>(42)
                }
            })
            .await;
        assert_eq!(second, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache: AsyncCache<&'static str, u32, ()> =
            AsyncCache::new(params(8, 20)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let supplier = |calls: Arc<AtomicUsize>| {
            move |_: &'static str| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, ()>(1)
                }
            }
        };

        cache.get("x", supplier(calls.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get("x", supplier(calls.clone())).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lru_evicts_the_least_recently_accessed() {
        let cache: AsyncCache<i32, i32, ()> = AsyncCache::new(params(2, 10_000)).unwrap();

        cache.get(1, |k| async move { Ok::<i32, ()>(k) }).await.unwrap();
        cache.get(2, |k| async move { Ok::<i32, ()>(k) }).await.unwrap();
        // Touch 1 again so 2 becomes the least-recently-accessed.
        cache.get(1, |k| async move { Ok::<i32, ()>(k) }).await.unwrap();
        cache.get(3, |k| async move { Ok::<i32, ()>(k) }).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.inner.entries.contains_key(&1));
        assert!(cache.inner.entries.contains_key(&3));
        assert!(!cache.inner.entries.contains_key(&2));
    }

    #[tokio::test]
    async fn dropping_the_initializer_does_not_wedge_other_waiters() {
        let cache: Arc<AsyncCache<&'static str, u32, ()>> =
            Arc::new(AsyncCache::new(params(8, 10_000)).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        // The initializer's own `get` future is dropped (simulated by
        // aborting its task) while its supplier is still sleeping. A
        // follower started concurrently must still receive a value instead
        // of hanging forever (the bug this test guards against: the
        // supplier used to run inline on the initializer's future, so
        // cancelling it left the slot permanently `InFlight`).
        let initializer_cache = cache.clone();
        let initializer_calls = calls.clone();
        let initializer = tokio::spawn(async move {
            initializer_cache
                .get("x", move |_| {
                    let calls = initializer_calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok::<u32, ()>(99)
                    }
                })
                .await
        });

        // Give the initializer a moment to claim the slot and spawn its
        // supplier task, then abort the initializer's own future.
        tokio::time::sleep(Duration::from_millis(20)).await;
        initializer.abort();

        let follower = cache
            .get("x", |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ()>(0)
            })
            .await;

        assert_eq!(follower, Ok(99));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_non_positive_parameters() {
        assert_eq!(
            CacheParams { ttl: Duration::from_secs(1), capacity: 0 }.validate(),
            Err(CacheConfigError::ZeroCapacity)
        );
        assert_eq!(
            CacheParams { ttl: Duration::ZERO, capacity: 1 }.validate(),
            Err(CacheConfigError::NonPositiveTtl)
        );
    }

    proptest::proptest! {
        #[test]
        fn capacity_is_never_exceeded(
            keys in proptest::collection::vec(0u32..10, 1..60),
            capacity in 1usize..5,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let within_bound = rt.block_on(async {
                let cache: AsyncCache<u32, u32, ()> = AsyncCache::new(params(capacity, 10_000)).unwrap();
                for k in keys {
                    cache.get(k, |k| async move { Ok::<u32, ()>(k) }).await.unwrap();
                    if cache.len() > capacity {
                        return false;
                    }
                }
                true
            });
            proptest::prop_assert!(within_bound);
        }

        #[test]
        fn lru_eviction_matches_a_naive_recency_model(
            keys in proptest::collection::vec(0u32..8, 1..40),
        ) {
            let capacity = 3usize;
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (expected, actual) = rt.block_on(async {
                let cache: AsyncCache<u32, u32, ()> = AsyncCache::new(params(capacity, 10_000)).unwrap();
                let mut naive: Vec<u32> = Vec::new();
                for k in keys {
                    cache.get(k, |k| async move { Ok::<u32, ()>(k) }).await.unwrap();
                    naive.retain(|&x| x != k);
                    naive.push(k);
                    if naive.len() > capacity {
                        naive.remove(0);
                    }
                }
                let expected: std::collections::HashSet<u32> = naive.into_iter().collect();
                let actual: std::collections::HashSet<u32> =
                    (0u32..8).filter(|k| cache.inner.entries.contains_key(k)).collect();
                (expected, actual)
            });
            proptest::prop_assert_eq!(expected, actual);
        }
    }
}
