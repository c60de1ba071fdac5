//! Configuration for the share-counts cache, providers and HTTP front end.

#[expect(clippy::module_inception, reason = "the module holds the `Config` type and nothing else")]
mod config;

pub use config::{Config, DEFAULT_CONFIG_YAML, ProviderConfig};
