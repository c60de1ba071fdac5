//! share-counts crate
//!
//! Answers "how many times has this URL been shared on network N?" by querying third-party
//! count endpoints through a request-coalescing, differentially-expiring cache.
//!
//! - [`counts`]: provider registry, single-key fetcher, coalescing cache and fan-out aggregator
//! - [`config`]: configuration loading and validation
//! - [`server`]: thin HTTP front end over [`counts::Aggregator`]

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod config;

pub mod counts;

pub mod server;
