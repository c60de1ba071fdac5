//! The fixed mapping from network identifier to count provider.

use super::network::Network;
use super::providers::{CountProvider, build_client, facebook, googleplus, twitter};
use super::error::CountsError;
use crate::Result;
use crate::config::Config;
use core::time::Duration;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A closed set of networks and the provider that fetches counts for each.
///
/// The set is frozen once built. Lookups of identifiers outside the set fail with
/// [`CountsError::UnknownNetwork`] before any network activity takes place.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    providers: BTreeMap<Box<str>, Arc<dyn CountProvider>>,
}

/// Builder for a [`Registry`] with an arbitrary set of providers.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    providers: BTreeMap<Box<str>, Arc<dyn CountProvider>>,
}

impl RegistryBuilder {
    /// Register `provider` under `network`, replacing any provider already registered there.
    #[must_use]
    pub fn with(mut self, network: impl Into<Box<str>>, provider: impl CountProvider + 'static) -> Self {
        let _ = self.providers.insert(network.into(), Arc::new(provider));
        self
    }

    #[must_use]
    pub fn build(self) -> Registry {
        Registry { providers: self.providers }
    }
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Create the registry of built-in networks, sharing one HTTP client bounded by the
    /// configured request timeout.
    pub fn standard(config: &Config) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.request_timeout))?;
        let urls = &config.providers;

        let mut builder = Self::builder();
        for network in Network::all() {
            builder = match network {
                Network::Facebook => builder.with(network.id(), facebook::Provider::new(client.clone(), Some(&urls.facebook_base_url))),
                Network::GooglePlus => {
                    builder.with(network.id(), googleplus::Provider::new(client.clone(), Some(&urls.googleplus_base_url)))
                }
                Network::Twitter => builder.with(network.id(), twitter::Provider::new(client.clone(), Some(&urls.twitter_base_url))),
            };
        }

        Ok(builder.build())
    }

    /// Look up the provider for `network`.
    pub fn get(&self, network: &str) -> Result<&Arc<dyn CountProvider>, CountsError> {
        self.providers
            .get(network)
            .ok_or_else(|| CountsError::UnknownNetwork(network.to_string()))
    }

    #[must_use]
    pub fn contains(&self, network: &str) -> bool {
        self.providers.contains_key(network)
    }

    /// The registered network identifiers, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(AsRef::as_ref)
    }

    /// The identifiers in `requested` that are not registered, in request order and without duplicates.
    #[must_use]
    pub fn invalid_networks<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        requested
            .iter()
            .map(AsRef::as_ref)
            .filter(|network| !self.contains(network) && seen.insert(*network))
            .map(ToString::to_string)
            .collect()
    }
}
