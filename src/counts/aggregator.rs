use super::cache::{CacheSettings, CountCache};
use super::error::CountsError;
use super::fetcher::Fetcher;
use super::registry::Registry;
use super::store::CountStore;
use crate::Result;
use crate::config::Config;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const LOG_TARGET: &str = "aggregator";

/// Answers "what are the counts of this URL on these networks" with one cached lookup per network.
#[derive(Debug, Clone)]
pub struct Aggregator {
    cache: CountCache,
}

impl Aggregator {
    #[must_use]
    pub const fn new(cache: CountCache) -> Self {
        Self { cache }
    }

    /// Wire up the built-in providers, a fresh store and the configured cache settings.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Arc::new(Registry::standard(config)?);
        let cache = CountCache::new(Fetcher::new(registry), Arc::new(CountStore::new()), CacheSettings::from(config));
        Ok(Self::new(cache))
    }

    #[must_use]
    pub const fn cache(&self) -> &CountCache {
        &self.cache
    }

    /// Retrieve the count of `url` on each of `networks`, concurrently.
    ///
    /// The result has one entry per distinct network, ordered by network identifier. A
    /// network that could not be queried reports the unknown count; that never fails the
    /// whole request. An empty URL, an empty network list or any unknown network is rejected
    /// before anything is fetched.
    pub async fn retrieve_counts<S: AsRef<str>>(&self, url: &str, networks: &[S]) -> Result<BTreeMap<String, i64>, CountsError> {
        if url.is_empty() {
            return Err(CountsError::InvalidInput("no URL specified".to_string()));
        }

        if networks.is_empty() {
            return Err(CountsError::InvalidInput("no networks specified".to_string()));
        }

        let invalid = self.cache.registry().invalid_networks(networks);
        if !invalid.is_empty() {
            return Err(CountsError::InvalidNetworks(invalid));
        }

        let networks: BTreeSet<&str> = networks.iter().map(AsRef::as_ref).collect();
        log::debug!(target: LOG_TARGET, "Retrieving counts for '{url}' on {} network(s)", networks.len());

        let counts = futures::future::join_all(networks.iter().map(|network| self.cache.get(network, url))).await;

        Ok(networks.into_iter().map(ToString::to_string).zip(counts).collect())
    }

    /// Stop background work and drop every cached entry. Fetches still in flight complete
    /// but are no longer recorded.
    pub fn shutdown(&self) {
        self.cache.store().shutdown();
    }
}

/// Split a comma-separated list of network identifiers, skipping blank items.
#[must_use]
pub fn parse_networks(networks: &str) -> Vec<String> {
    networks
        .split(',')
        .map(str::trim)
        .filter(|network| !network.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Pick the URL to look up: the explicit one if given, otherwise the referring page.
pub fn resolve_url<'a>(url: Option<&'a str>, referer: Option<&'a str>) -> Result<&'a str, CountsError> {
    url.filter(|u| !u.is_empty())
        .or_else(|| referer.filter(|r| !r.is_empty()))
        .ok_or_else(|| {
            CountsError::InvalidInput(
                "You asked for the referring urls stats but there is no referring url, specify one manually (&url=https://example.com/)"
                    .to_string(),
            )
        })
}
