//! Single-flight freshness cache.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{CacheConfig, StalePolicy};
use crate::error::{CacheError, FetchFailure};

type Outcome<V> = Result<Lookup<V>, CacheError>;
type SharedOutcome<V> = Shared<BoxFuture<'static, Outcome<V>>>;

/// Where the value of a [`Lookup`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    /// Fresh entry; no upstream call was made.
    Cached,
    /// Produced by an upstream fetch this caller started or joined.
    Fetched,
    /// The refresh failed and an older value was served instead.
    Stale,
}

/// A value returned by [`FreshnessCache::get`].
#[derive(Clone, Debug)]
pub struct Lookup<V> {
    /// The cached or freshly fetched value
    pub value: V,
    /// How the value was obtained
    pub source: LookupSource,
    /// Age of the value when this lookup was produced
    pub age: Duration,
    /// The masked failure, set only when `source` is `Stale`
    pub stale_reason: Option<String>,
}

/// Last successful fetch for a key.
struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

impl<V: Clone> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }

    fn lookup(&self, source: LookupSource) -> Lookup<V> {
        Lookup {
            value: self.value.clone(),
            source,
            age: self.fetched_at.elapsed(),
            stale_reason: None,
        }
    }
}

/// Per-key state: the installed entry and the fetch currently refreshing it.
///
/// `invalidate` and `clear` never drop a slot with a fetch in flight, so the
/// marker a fetch installs is still its own when the fetch completes.
struct Slot<V> {
    entry: Option<CacheEntry<V>>,
    in_flight: Option<SharedOutcome<V>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            entry: None,
            in_flight: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    shared_waits: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    stale_served: AtomicU64,
}

struct Inner<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    config: CacheConfig,
    counters: Counters,
}

enum Claim<V> {
    Hit(Lookup<V>),
    Wait(SharedOutcome<V>),
    /// This caller owns the new fetch and must start it.
    Start {
        outcome: SharedOutcome<V>,
        done: oneshot::Sender<Outcome<V>>,
    },
}

/// In-memory cache in front of a slow or rate-limited upstream.
///
/// Thread-safe and cheap to clone; clones share the same entries.
///
/// # Guarantees
///
/// - A fresh entry (`age < ttl`) is returned without calling the fetcher.
/// - At most one fetch per key is in flight; concurrent callers for that
///   key wait on it and all receive its outcome.
/// - The lock is held only to claim a key and to install a result. The
///   fetcher is called and its future run with the lock released, so slow
///   keys never block other keys and a caller that gives up does not
///   cancel the fetch.
/// - Every fetch is bounded by the configured timeout.
pub struct FreshnessCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for FreshnessCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> FreshnessCache<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates an empty cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                config,
                counters: Counters::default(),
            }),
        }
    }

    /// Returns the freshest known value for `key`.
    ///
    /// `fetcher` is invoked only if this caller is the one that starts a
    /// new fetch. A fetcher error whose [`FetchFailure::is_timeout`] is true
    /// surfaces as [`CacheError::UpstreamTimeout`]. A failed fetch is never
    /// retried within the call.
    pub async fn get<F, Fut, E>(&self, key: K, fetcher: F) -> Result<Lookup<V>, CacheError>
    where
        F: FnOnce(K) -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: FetchFailure + Send + 'static,
    {
        match self.claim(&key) {
            Claim::Hit(lookup) => Ok(lookup),
            Claim::Wait(outcome) => outcome.await,
            Claim::Start { outcome, done } => {
                match std::panic::catch_unwind(AssertUnwindSafe(|| fetcher(key.clone()))) {
                    Ok(fetch) => Inner::spawn_fetch(&self.inner, key, fetch, done),
                    Err(_) => {
                        let failed = Err(CacheError::UpstreamUnavailable {
                            key: key.to_string(),
                            reason: "fetcher panicked".into(),
                        });
                        let _ = done.send(self.inner.complete(&key, failed));
                    }
                }
                outcome.await
            }
        }
    }

    fn claim(&self, key: &K) -> Claim<V> {
        let counters = &self.inner.counters;
        let mut slots = self.inner.slots.lock();
        let slot = slots.entry(key.clone()).or_default();

        if let Some(entry) = slot.entry.as_ref().filter(|e| e.is_fresh(self.inner.config.ttl())) {
            counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "cache hit");
            return Claim::Hit(entry.lookup(LookupSource::Cached));
        }

        if let Some(in_flight) = &slot.in_flight {
            counters.shared_waits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "joining in-flight fetch");
            return Claim::Wait(in_flight.clone());
        }

        counters.misses.fetch_add(1, Ordering::Relaxed);
        let (done, result) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let outcome = async move {
            match result.await {
                Ok(outcome) => outcome,
                // Runtime shutdown or abort; the fetch never reached `complete`.
                Err(_) => {
                    let err = CacheError::UpstreamUnavailable {
                        key: owned_key.to_string(),
                        reason: "fetch task did not finish".into(),
                    };
                    inner.complete(&owned_key, Err(err))
                }
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(outcome.clone());
        Claim::Start { outcome, done }
    }

    /// Returns the entry for `key` if it is fresh, without fetching.
    pub fn peek(&self, key: &K) -> Option<Lookup<V>> {
        let ttl = self.inner.config.ttl();
        self.inner
            .slots
            .lock()
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| entry.lookup(LookupSource::Cached))
    }

    /// Drops the entry for `key`. An in-flight fetch is left running and
    /// will install its result when it completes.
    ///
    /// Returns true if an entry was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut slots = self.inner.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };

        let removed = slot.entry.take().is_some();
        if slot.in_flight.is_none() {
            slots.remove(key);
        }
        removed
    }

    /// Drops every entry. In-flight fetches keep running.
    pub fn clear(&self) {
        self.inner.slots.lock().retain(|_, slot| {
            slot.entry = None;
            slot.in_flight.is_some()
        });
    }

    /// Returns the number of installed entries (fresh or stale).
    pub fn len(&self) -> usize {
        self.inner
            .slots
            .lock()
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    /// Returns true if no entry is installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner
            .slots
            .lock()
            .values()
            .filter(|slot| slot.in_flight.is_some())
            .count()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let ttl = self.inner.config.ttl();
        let (mut fresh, mut stale, mut in_flight) = (0, 0, 0);

        for slot in self.inner.slots.lock().values() {
            match &slot.entry {
                Some(entry) if entry.is_fresh(ttl) => fresh += 1,
                Some(_) => stale += 1,
                None => {}
            }
            if slot.in_flight.is_some() {
                in_flight += 1;
            }
        }

        let counters = &self.inner.counters;
        CacheStats {
            total_entries: fresh + stale,
            fresh_entries: fresh,
            stale_entries: stale,
            in_flight,
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            shared_waits: counters.shared_waits.load(Ordering::Relaxed),
            fetches: counters.fetches.load(Ordering::Relaxed),
            fetch_failures: counters.fetch_failures.load(Ordering::Relaxed),
            stale_served: counters.stale_served.load(Ordering::Relaxed),
            ttl_seconds: self.inner.config.ttl_seconds,
        }
    }
}

impl<K, V> Default for FreshnessCache<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Runs the fetch on its own task and hands the outcome to `done`.
    fn spawn_fetch<Fut, E>(self: &Arc<Self>, key: K, fetch: Fut, done: oneshot::Sender<Outcome<V>>)
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: FetchFailure + Send + 'static,
    {
        let timeout = self.config.fetch_timeout();
        let inner = Arc::clone(self);

        debug!(key = %key, "starting upstream fetch");

        tokio::spawn(async move {
            inner.counters.fetches.fetch_add(1, Ordering::Relaxed);

            let guarded = AssertUnwindSafe(fetch).catch_unwind();
            let result = match tokio::time::timeout(timeout, guarded).await {
                Ok(Ok(Ok(value))) => Ok(value),
                Ok(Ok(Err(err))) if err.is_timeout() => Err(CacheError::UpstreamTimeout {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
                Ok(Ok(Err(err))) => Err(CacheError::UpstreamUnavailable {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
                Ok(Err(_)) => Err(CacheError::UpstreamUnavailable {
                    key: key.to_string(),
                    reason: "fetcher panicked".into(),
                }),
                Err(_) => Err(CacheError::UpstreamTimeout {
                    key: key.to_string(),
                    reason: format!("no response within {}ms", timeout.as_millis()),
                }),
            };

            // Nobody may be waiting any more; the result is installed regardless.
            let _ = done.send(inner.complete(&key, result));
        });
    }

    /// Clears the in-flight marker and installs a successful result.
    fn complete(&self, key: &K, result: Result<V, CacheError>) -> Outcome<V> {
        let mut slots = self.slots.lock();
        let mut slot = slots.get_mut(key);
        if let Some(slot) = slot.as_deref_mut() {
            slot.in_flight = None;
        }

        let outcome = match result {
            Ok(value) => {
                if let Some(slot) = slot {
                    slot.entry = Some(CacheEntry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    });
                    debug!(key = %key, "installed fetched value");
                }

                Ok(Lookup {
                    value,
                    source: LookupSource::Fetched,
                    age: Duration::ZERO,
                    stale_reason: None,
                })
            }
            Err(err) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);

                let fallback = match self.config.stale_policy {
                    StalePolicy::ServeStale => slot.and_then(|slot| {
                        slot.entry.as_ref().map(|entry| entry.lookup(LookupSource::Stale))
                    }),
                    StalePolicy::Fail => None,
                };

                match fallback {
                    Some(mut lookup) => {
                        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            key = %key,
                            error = %err,
                            age_ms = lookup.age.as_millis() as u64,
                            "Upstream fetch failed, serving stale value"
                        );
                        lookup.stale_reason = Some(err.to_string());
                        Ok(lookup)
                    }
                    None => {
                        warn!(key = %key, error = %err, "Upstream fetch failed");
                        Err(err)
                    }
                }
            }
        };

        // Drop slots left with neither an entry nor a fetch.
        if slots
            .get(key)
            .is_some_and(|slot| slot.entry.is_none() && slot.in_flight.is_none())
        {
            slots.remove(key);
        }

        outcome
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheStats {
    /// Installed entries (fresh and stale)
    pub total_entries: usize,
    /// Entries younger than the TTL
    pub fresh_entries: usize,
    /// Entries awaiting lazy replacement
    pub stale_entries: usize,
    /// Fetches currently running
    pub in_flight: usize,
    /// Lookups answered from a fresh entry
    pub hits: u64,
    /// Lookups that started a fetch
    pub misses: u64,
    /// Lookups that joined a fetch another caller started
    pub shared_waits: u64,
    /// Upstream fetches started
    pub fetches: u64,
    /// Fetches that failed, timed out, or panicked
    pub fetch_failures: u64,
    /// Failed fetches answered with a stale value
    pub stale_served: u64,
    /// Configured freshness window
    pub ttl_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use cryptomancer_core::error::CryptomancerError;

    type Fetcher = Box<dyn FnOnce(String) -> BoxFuture<'static, Result<&'static str, String>> + Send>;

    fn ok_after(calls: &Arc<AtomicUsize>, delay: Duration, value: &'static str) -> Fetcher {
        let calls = Arc::clone(calls);
        Box::new(move |_key: String| {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, String>(value)
            }
            .boxed()
        })
    }

    fn fail_after(calls: &Arc<AtomicUsize>, delay: Duration, reason: &'static str) -> Fetcher {
        let calls = Arc::clone(calls);
        Box::new(move |_key: String| {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Err::<&'static str, _>(reason.to_string())
            }
            .boxed()
        })
    }

    fn ok(calls: &Arc<AtomicUsize>, value: &'static str) -> Fetcher {
        ok_after(calls, Duration::ZERO, value)
    }

    fn fail(calls: &Arc<AtomicUsize>, reason: &'static str) -> Fetcher {
        fail_after(calls, Duration::ZERO, reason)
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn cache_with_ttl(ttl_seconds: u64) -> FreshnessCache<String, &'static str> {
        FreshnessCache::with_config(CacheConfig::default().with_ttl_seconds(ttl_seconds))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_skips_fetch() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        let first = cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        assert_eq!(first.value, "V1");
        assert_eq!(first.source, LookupSource::Fetched);

        let second = cache.get("usd:20".into(), ok(&calls, "V2")).await.unwrap();
        assert_eq!(second.value, "V1");
        assert_eq!(second.source, LookupSource::Cached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_scenario() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        let v = cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        assert_eq!(v.value, "V1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        let v = cache.get("usd:20".into(), ok(&calls, "V2")).await.unwrap();
        assert_eq!(v.value, "V1");
        assert!(v.age >= Duration::from_secs(30));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        let v = cache.get("usd:20".into(), ok(&calls, "V2")).await.unwrap();
        assert_eq!(v.value, "V2");
        assert_eq!(v.source, LookupSource::Fetched);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_concurrent_callers() {
        let cache = cache_with_ttl(60);
        let calls = counter();
        let start = Instant::now();

        let lookups = futures::future::join_all(
            (0..10).map(|_| cache.get("usd:20".into(), ok_after(&calls, Duration::from_millis(200), "V1"))),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookups.len(), 10);
        for lookup in lookups {
            let lookup = lookup.unwrap();
            assert_eq!(lookup.value, "V1");
            assert_eq!(lookup.source, LookupSource::Fetched);
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(300));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.shared_waits, 9);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_failure() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        let outcomes = futures::future::join_all(
            (0..5).map(|_| cache.get("usd:20".into(), fail_after(&calls, Duration::from_millis(50), "HTTP 503"))),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = outcomes[0].clone().unwrap_err();
        assert!(matches!(first, CacheError::UpstreamUnavailable { ref reason, .. } if reason == "HTTP 503"));
        for outcome in outcomes {
            assert_eq!(outcome.unwrap_err(), first);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_do_not_block() {
        let cache = cache_with_ttl(60);
        let slow_calls = counter();
        let fast_calls = counter();

        let slow = tokio::spawn({
            let cache = cache.clone();
            let fetcher = ok_after(&slow_calls, Duration::from_secs(10), "slow");
            async move { cache.get("btc:20".into(), fetcher).await }
        });
        while cache.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let fast = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get("usd:20".into(), ok(&fast_calls, "fast")),
        )
        .await
        .expect("fast key blocked behind slow key")
        .unwrap();

        assert_eq!(fast.value, "fast");
        assert!(!slow.is_finished());

        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow.value, "slow");
        assert_eq!(slow_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fast_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_always_fetches() {
        let cache = cache_with_ttl(0);
        let calls = counter();

        let a = cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        let b = cache.get("usd:20".into(), ok(&calls, "V2")).await.unwrap();

        assert_eq!(a.value, "V1");
        assert_eq!(b.value, "V2");
        assert_eq!(b.source, LookupSource::Fetched);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.peek(&"usd:20".to_string()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_entry_is_unavailable() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        for attempt in 1..=3 {
            let err = cache.get("usd:20".into(), fail(&calls, "connection refused")).await.unwrap_err();
            assert!(matches!(err, CacheError::UpstreamUnavailable { .. }));
            assert_eq!(err.key(), "usd:20");
            assert_eq!(calls.load(Ordering::SeqCst), attempt);
        }

        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().fetch_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clears_in_flight_marker() {
        let cache: FreshnessCache<String, &'static str> = FreshnessCache::with_config(
            CacheConfig::default().with_fetch_timeout_ms(100),
        );
        let calls = counter();

        let err = cache
            .get("usd:20".into(), ok_after(&calls, Duration::from_secs(1), "late"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::UpstreamTimeout {
                key: "usd:20".into(),
                reason: "no response within 100ms".into(),
            }
        );
        assert_eq!(cache.in_flight(), 0);

        let retry = cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        assert_eq!(retry.value, "V1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_served_on_failure() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let lookup = cache.get("usd:20".into(), fail(&calls, "HTTP 429")).await.unwrap();
        assert_eq!(lookup.value, "V1");
        assert_eq!(lookup.source, LookupSource::Stale);
        assert!(lookup.stale_reason.as_deref().unwrap().contains("HTTP 429"));
        assert!(lookup.age >= Duration::from_secs(61));

        let stats = cache.stats();
        assert_eq!(stats.stale_served, 1);
        assert_eq!(stats.stale_entries, 1);

        // Still stale, so the next call tries the upstream again.
        let lookup = cache.get("usd:20".into(), ok(&calls, "V2")).await.unwrap();
        assert_eq!(lookup.value, "V2");
        assert_eq!(lookup.source, LookupSource::Fetched);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_policy_surfaces_error_over_stale_value() {
        let cache: FreshnessCache<String, &'static str> = FreshnessCache::with_config(
            CacheConfig::default().with_stale_policy(StalePolicy::Fail),
        );
        let calls = counter();

        cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let err = cache.get("usd:20".into(), fail(&calls, "HTTP 500")).await.unwrap_err();
        assert!(matches!(err, CacheError::UpstreamUnavailable { .. }));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().stale_served, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetcher_is_a_failure() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        let err = cache
            .get("usd:20".to_string(), |key: String| {
                async move {
                    if !key.is_empty() {
                        panic!("upstream client bug");
                    }
                    Ok::<_, String>("never")
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::UpstreamUnavailable { ref reason, .. } if reason.contains("panicked")));
        assert_eq!(cache.in_flight(), 0);

        let retry = cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        assert_eq!(retry.value, "V1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_does_not_cancel_fetch() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        let waiter = tokio::spawn({
            let cache = cache.clone();
            let fetcher = ok_after(&calls, Duration::from_millis(200), "V1");
            async move { cache.get("usd:20".into(), fetcher).await }
        });
        while cache.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        waiter.abort();

        tokio::time::sleep(Duration::from_millis(300)).await;

        let lookup = cache.get("usd:20".into(), ok(&calls, "V2")).await.unwrap();
        assert_eq!(lookup.value, "V1");
        assert_eq!(lookup.source, LookupSource::Cached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_invalidate_clear() {
        let cache = cache_with_ttl(60);
        let calls = counter();
        let usd = "usd:20".to_string();
        let eur = "eur:20".to_string();

        assert!(cache.peek(&usd).is_none());
        cache.get(usd.clone(), ok(&calls, "V1")).await.unwrap();
        cache.get(eur.clone(), ok(&calls, "E1")).await.unwrap();
        assert_eq!(cache.peek(&usd).unwrap().value, "V1");
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate(&usd));
        assert!(!cache.invalidate(&usd));
        assert!(cache.peek(&usd).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());

        let lookup = cache.get(eur, ok(&calls, "E2")).await.unwrap();
        assert_eq!(lookup.value, "E2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_counters() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        let _ = cache.get("eur:20".into(), fail(&calls, "down")).await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.fetches, 2);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.fresh_entries, 1);
        assert_eq!(stats.ttl_seconds, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetcher_runs_without_the_lock() {
        let cache = cache_with_ttl(60);
        let observer = cache.clone();

        let lookup = cache
            .get("usd:20".into(), move |_key: String| {
                // Synchronous work here may touch the cache itself.
                let in_flight = observer.in_flight();
                let other = observer.peek(&"eur:20".to_string());
                async move {
                    assert_eq!(in_flight, 1);
                    assert!(other.is_none());
                    Ok::<_, String>("V1")
                }
            })
            .await
            .unwrap();

        assert_eq!(lookup.value, "V1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetcher_panicking_before_its_future() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        let err = cache
            .get("usd:20".to_string(), |_key: String| -> BoxFuture<'static, Result<&'static str, String>> {
                panic!("request builder bug")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::UpstreamUnavailable { ref reason, .. } if reason.contains("panicked")));
        assert_eq!(cache.in_flight(), 0);

        let retry = cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        assert_eq!(retry.value, "V1");
        assert_eq!(retry.source, LookupSource::Fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetcher_reported_timeout_is_upstream_timeout() {
        let cache = cache_with_ttl(60);

        let err = cache
            .get("usd:20".into(), |_key: String| async {
                Err::<&'static str, _>(CryptomancerError::ConnectionTimeout("read timed out".into()))
            })
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(matches!(err, CacheError::UpstreamTimeout { ref reason, .. } if reason.contains("read timed out")));
        assert_eq!(cache.stats().fetch_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_keeps_in_flight_fetch() {
        let cache = cache_with_ttl(60);
        let calls = counter();

        cache.get("usd:20".into(), ok(&calls, "V1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let refresh = tokio::spawn({
            let cache = cache.clone();
            let fetcher = ok_after(&calls, Duration::from_millis(200), "V2");
            async move { cache.get("usd:20".into(), fetcher).await }
        });
        while cache.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 1);

        // Joins the surviving fetch instead of starting another.
        let joined = cache.get("usd:20".into(), ok(&calls, "V3")).await.unwrap();
        assert_eq!(joined.value, "V2");
        assert_eq!(refresh.await.unwrap().unwrap().value, "V2");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.peek(&"usd:20".to_string()).unwrap().value, "V2");
        assert_eq!(cache.stats().shared_waits, 1);
    }
}
