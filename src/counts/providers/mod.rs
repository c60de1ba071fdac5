//! Count providers: one capability per network, turning a URL into a share count.
//!
//! Every provider reports failure as an error. None of them substitutes a count of 0 for
//! a failed request; the coalescing cache decides what a failure is worth.

use crate::Result;
use futures::future::BoxFuture;

pub mod facebook;
pub mod googleplus;
mod http;
pub mod twitter;

pub use http::build_client;

/// Fetches the share count of a URL from a single network.
///
/// The wire format of the upstream is entirely encapsulated behind this trait.
pub trait CountProvider: Send + Sync + core::fmt::Debug {
    /// Fetch the current count for `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<u64>>;
}
