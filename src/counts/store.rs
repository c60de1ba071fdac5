//! The in-memory map of cache entries and its lifecycle.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const LOG_TARGET: &str = "     store";

/// Ten years, used in place of expiry times that would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// The handle of a fetch in flight. Every clone resolves to the same count.
pub type SharedCount = Shared<BoxFuture<'static, i64>>;

/// Identifies one cache entry: a network together with a URL, compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    network: Arc<str>,
    url: Arc<str>,
}

impl CacheKey {
    #[must_use]
    pub fn new(network: &str, url: &str) -> Self {
        Self {
            network: network.into(),
            url: url.into(),
        }
    }

    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.network, self.url)
    }
}

enum CacheEntry {
    Pending { fetch: SharedCount, expires_at: Instant },
    Resolved { count: i64, expires_at: Instant },
}

impl CacheEntry {
    const fn expires_at(&self) -> Instant {
        match self {
            Self::Pending { expires_at, .. } | Self::Resolved { expires_at, .. } => *expires_at,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at() > now
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { expires_at, .. } => f.debug_struct("Pending").field("expires_at", expires_at).finish_non_exhaustive(),
            Self::Resolved { count, expires_at } => f
                .debug_struct("Resolved")
                .field("count", count)
                .field("expires_at", expires_at)
                .finish(),
        }
    }
}

/// The outcome of [`CountStore::lookup_or_install`].
pub enum Lookup {
    /// A live resolved count.
    Cached(i64),

    /// A live fetch started by an earlier request.
    Joined(SharedCount),

    /// A fetch just started and installed by this request.
    Started(SharedCount),
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached(count) => f.debug_tuple("Cached").field(count).finish(),
            Self::Joined(_) => f.write_str("Joined(..)"),
            Self::Started(_) => f.write_str("Started(..)"),
        }
    }
}

/// Cache entries keyed by network and URL.
///
/// One mutex covers lookup, install, resolve and eviction, so at most one live pending
/// fetch exists per key. The store is created explicitly and shared by reference; there is
/// no process-wide instance.
#[derive(Debug, Default)]
pub struct CountStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    closed: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweeper(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key` and, when it has no live entry, install a pending entry for the fetch
    /// returned by `start`.
    ///
    /// The lookup and the install happen under one lock, so concurrent callers for the same
    /// key observe either the live entry or the fetch installed by the first of them.
    /// `start` is only invoked on a miss. Once the store is shut down nothing is installed
    /// anymore and every lookup starts its own fetch.
    pub fn lookup_or_install(
        &self,
        key: &CacheKey,
        now: Instant,
        pending_ttl: Duration,
        start: impl FnOnce() -> SharedCount,
    ) -> Lookup {
        let mut entries = self.entries();

        match entries.get(key) {
            Some(CacheEntry::Resolved { count, expires_at }) if *expires_at > now => return Lookup::Cached(*count),
            Some(CacheEntry::Pending { fetch, expires_at }) if *expires_at > now => return Lookup::Joined(fetch.clone()),
            _ => {}
        }

        let fetch = start();
        if !self.is_closed() {
            let _ = entries.insert(
                key.clone(),
                CacheEntry::Pending {
                    fetch: fetch.clone(),
                    expires_at: deadline(now, pending_ttl),
                },
            );
        }

        Lookup::Started(fetch)
    }

    /// Record the outcome of a fetch, replacing whatever entry `key` has.
    ///
    /// Completions arriving after [`Self::shutdown`] are dropped.
    pub fn resolve(&self, key: CacheKey, count: i64, ttl: Duration, now: Instant) {
        if self.is_closed() {
            log::debug!(target: LOG_TARGET, "Dropping late result for {key}");
            return;
        }

        let _ = self.entries().insert(
            key,
            CacheEntry::Resolved {
                count,
                expires_at: deadline(now, ttl),
            },
        );
    }

    /// The count of a live resolved entry, if any.
    #[must_use]
    pub fn get_live(&self, key: &CacheKey, now: Instant) -> Option<i64> {
        match self.entries().get(key) {
            Some(CacheEntry::Resolved { count, expires_at }) if *expires_at > now => Some(*count),
            _ => None,
        }
    }

    /// Drop stale resolved entries and expired pending entries, returning how many were removed.
    ///
    /// An evicted pending fetch keeps running; its completion is recorded as usual.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Start a task that evicts expired entries every `interval`.
    ///
    /// The task holds a weak reference and ends by itself once the store is dropped. Starting
    /// a new sweeper stops the previous one. A zero interval disables sweeping.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) {
        if interval.is_zero() || self.is_closed() {
            return;
        }

        let store = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // the first tick completes immediately
            let _ = ticker.tick().await;

            loop {
                let _ = ticker.tick().await;

                let Some(store) = store.upgrade() else {
                    break;
                };

                let removed = store.evict_expired(Instant::now());
                if removed > 0 {
                    log::debug!(target: LOG_TARGET, "Evicted {removed} expired entries, {} remaining", store.len());
                }
            }
        });

        if let Some(previous) = self.sweeper().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the sweeper, drop every entry and ignore fetches that complete from now on.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        if let Some(sweeper) = self.sweeper().take() {
            sweeper.abort();
        }

        let mut entries = self.entries();
        log::info!(target: LOG_TARGET, "Shutting down, dropping {} entries", entries.len());
        entries.clear();
    }
}

fn deadline(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn ready(count: i64) -> SharedCount {
        futures::future::ready(count).boxed().shared()
    }

    fn key() -> CacheKey {
        CacheKey::new("twitter", "https://e.com")
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key().to_string(), "twitter 'https://e.com'");
    }

    #[test]
    fn test_keys_compare_exactly() {
        assert_ne!(CacheKey::new("twitter", "https://e.com"), CacheKey::new("twitter", "https://e.com/"));
        assert_ne!(CacheKey::new("twitter", "https://e.com"), CacheKey::new("facebook", "https://e.com"));
    }

    #[tokio::test]
    async fn test_miss_installs_pending_then_joins() {
        let store = CountStore::new();
        let now = Instant::now();
        let ttl = Duration::from_secs(10);

        let Lookup::Started(first) = store.lookup_or_install(&key(), now, ttl, || ready(5)) else {
            panic!("expected a fresh fetch");
        };

        let mut started_again = false;
        let Lookup::Joined(second) = store.lookup_or_install(&key(), now, ttl, || {
            started_again = true;
            ready(6)
        }) else {
            panic!("expected to join the pending fetch");
        };

        assert!(!started_again);
        assert_eq!(first.await, 5);
        assert_eq!(second.await, 5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_pending_allows_new_fetch() {
        let store = CountStore::new();
        let now = Instant::now();
        let ttl = Duration::from_secs(10);

        let _ = store.lookup_or_install(&key(), now, ttl, || ready(1));
        let later = now + Duration::from_secs(10);
        assert!(matches!(store.lookup_or_install(&key(), later, ttl, || ready(2)), Lookup::Started(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resolved_entry_served_until_expiry() {
        let store = CountStore::new();
        let now = Instant::now();
        store.resolve(key(), 42, Duration::from_secs(240), now);

        let almost = now + Duration::from_secs(239);
        assert!(matches!(store.lookup_or_install(&key(), almost, Duration::from_secs(10), || ready(0)), Lookup::Cached(42)));
        assert_eq!(store.get_live(&key(), almost), Some(42));

        let expired = now + Duration::from_secs(240);
        assert_eq!(store.get_live(&key(), expired), None);
        assert!(matches!(store.lookup_or_install(&key(), expired, Duration::from_secs(10), || ready(0)), Lookup::Started(_)));
    }

    #[test]
    fn test_evict_expired_keeps_live_entries() {
        let store = CountStore::new();
        let now = Instant::now();
        store.resolve(CacheKey::new("a", "u"), 1, Duration::from_secs(240), now);
        store.resolve(CacheKey::new("b", "u"), -1, Duration::from_secs(60), now);
        let _ = store.lookup_or_install(&CacheKey::new("c", "u"), now, Duration::from_secs(10), || ready(3));

        assert_eq!(store.evict_expired(now + Duration::from_secs(30)), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.evict_expired(now + Duration::from_secs(120)), 1);
        assert_eq!(store.get_live(&CacheKey::new("a", "u"), now + Duration::from_secs(120)), Some(1));
        assert_eq!(store.evict_expired(now + Duration::from_secs(300)), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let store = CountStore::new();
        store.resolve(key(), 1, Duration::from_secs(240), Instant::now());
        assert!(!store.is_empty());
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_shutdown_ignores_late_results() {
        let store = CountStore::new();
        let now = Instant::now();
        store.resolve(key(), 1, Duration::from_secs(240), now);

        store.shutdown();
        assert!(store.is_closed());
        assert!(store.is_empty());

        store.resolve(key(), 2, Duration::from_secs(240), now);
        assert!(store.is_empty());
        assert!(matches!(store.lookup_or_install(&key(), now, Duration::from_secs(10), || ready(3)), Lookup::Started(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let store = CountStore::new();
        let now = Instant::now();
        store.resolve(key(), 9, Duration::MAX, now);
        assert_eq!(store.get_live(&key(), now + Duration::from_secs(3600)), Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_periodically() {
        let store = Arc::new(CountStore::new());
        store.resolve(key(), 1, Duration::from_secs(60), Instant::now());
        store.spawn_sweeper(Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.is_empty());

        store.shutdown();
    }
}
