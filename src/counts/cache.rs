//! Request-coalescing cache in front of the fetcher.

use super::fetcher::Fetcher;
use super::registry::Registry;
use super::store::{CacheKey, CountStore, Lookup, SharedCount};
use crate::config::Config;
use core::time::Duration;
use futures::FutureExt;
use std::sync::Arc;
use tokio::time::Instant;

const LOG_TARGET: &str = "     cache";

/// How long outcomes stay in the cache, and what a failure is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Lifetime of a successfully fetched count.
    pub good_ttl: Duration,

    /// Lifetime of the unknown count cached after a failed fetch.
    pub bad_ttl: Duration,

    /// How long an in-flight fetch is joined by new requests.
    pub pending_ttl: Duration,

    /// Count reported when a fetch fails.
    pub unknown_count: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            good_ttl: Duration::from_secs(4 * 60),
            bad_ttl: Duration::from_secs(60),
            pending_ttl: Duration::from_secs(10),
            unknown_count: -1,
        }
    }
}

impl From<&Config> for CacheSettings {
    fn from(config: &Config) -> Self {
        Self {
            good_ttl: Duration::from_secs(config.good_result_ttl),
            bad_ttl: Duration::from_secs(config.bad_result_ttl),
            pending_ttl: Duration::from_secs(config.pending_result_ttl),
            unknown_count: config.unknown_count,
        }
    }
}

/// Serves counts from a [`CountStore`], starting at most one fetch per key at a time.
///
/// Concurrent requests for a key that has no live entry share the fetch started by the first
/// of them. Successes are kept for [`CacheSettings::good_ttl`], failures are turned into
/// [`CacheSettings::unknown_count`] and kept for [`CacheSettings::bad_ttl`].
///
/// Every fetch runs on its own task, so it completes and populates the cache even when all
/// the requests waiting for it have gone away.
#[derive(Debug, Clone)]
pub struct CountCache {
    store: Arc<CountStore>,
    fetcher: Fetcher,
    settings: CacheSettings,
}

impl CountCache {
    #[must_use]
    pub const fn new(fetcher: Fetcher, store: Arc<CountStore>, settings: CacheSettings) -> Self {
        Self { store, fetcher, settings }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<CountStore> {
        &self.store
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        self.fetcher.registry()
    }

    #[must_use]
    pub const fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// The count of `url` on `network`. Never fails; a failed fetch yields the unknown count.
    pub async fn get(&self, network: &str, url: &str) -> i64 {
        let key = CacheKey::new(network, url);
        let lookup = self
            .store
            .lookup_or_install(&key, Instant::now(), self.settings.pending_ttl, || self.start_fetch(key.clone()));

        match lookup {
            Lookup::Cached(count) => {
                log::debug!(target: LOG_TARGET, "Cache hit for {key}: {count}");
                count
            }
            Lookup::Joined(fetch) => {
                log::debug!(target: LOG_TARGET, "Joining pending fetch for {key}");
                fetch.await
            }
            Lookup::Started(fetch) => {
                log::debug!(target: LOG_TARGET, "Started fetch for {key}");
                fetch.await
            }
        }
    }

    fn start_fetch(&self, key: CacheKey) -> SharedCount {
        let fetcher = self.fetcher.clone();
        let store = Arc::clone(&self.store);
        let settings = self.settings;
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            let (count, ttl) = match fetcher.fetch(task_key.network(), task_key.url()).await {
                Ok(count) => {
                    log::info!(target: LOG_TARGET, "Fetched good result for {task_key}: {count}");
                    (i64::try_from(count).unwrap_or(i64::MAX), settings.good_ttl)
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Fetched bad result for {task_key}: {e}");
                    (settings.unknown_count, settings.bad_ttl)
                }
            };

            store.resolve(task_key, count, ttl, Instant::now());
            count
        });

        let store = Arc::clone(&self.store);
        async move {
            match task.await {
                Ok(count) => count,
                Err(e) => {
                    log::error!(target: LOG_TARGET, "Fetch task for {key} did not complete: {e}");
                    store.resolve(key, settings.unknown_count, settings.bad_ttl, Instant::now());
                    settings.unknown_count
                }
            }
        }
        .boxed()
        .shared()
    }
}
