//! Share counts of URLs on social networks.
//!
//! The pipeline is layered:
//!
//! - [`Registry`] maps a network identifier to the [`CountProvider`] that speaks its wire format.
//! - [`Fetcher`] invokes one provider for one URL, with no caching and no retries.
//! - [`CountCache`] sits in front of the fetcher. It coalesces concurrent requests for the same
//!   network and URL into one fetch, and keeps successes and failures for different periods.
//! - [`Aggregator`] validates a request and fans it out over the cache, one lookup per network.
//!
//! Cache entries live in a [`CountStore`] owned by the caller, which also controls its lifecycle.

mod aggregator;
mod cache;
mod error;
mod fetcher;
mod network;
pub mod providers;
mod registry;
mod store;

pub use aggregator::{Aggregator, parse_networks, resolve_url};
pub use cache::{CacheSettings, CountCache};
pub use error::{CountsError, FetchError};
pub use fetcher::Fetcher;
pub use network::Network;
pub use providers::CountProvider;
pub use registry::{Registry, RegistryBuilder};
pub use store::{CacheKey, CountStore, Lookup, SharedCount};
