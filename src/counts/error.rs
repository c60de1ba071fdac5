//! Errors of the count pipeline.
//!
//! Input errors ([`CountsError::UnknownNetwork`], [`CountsError::InvalidNetworks`],
//! [`CountsError::InvalidInput`]) are reported to the caller. A [`FetchError`] never leaves the
//! coalescing cache: it is logged and replaced by the unknown count.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CountsError {
    /// A single network identifier is not in the registry.
    #[error("unknown network: '{0}'")]
    UnknownNetwork(String),

    /// One or more requested network identifiers are not in the registry.
    #[error("unknown network(s) specified: '{}'", .0.join("', '"))]
    InvalidNetworks(Vec<String>),

    /// The request is structurally invalid, e.g. no URL or no networks.
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl CountsError {
    /// Whether the error was caused by the caller's input rather than by an upstream failure.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::UnknownNetwork(_) | Self::InvalidNetworks(_) | Self::InvalidInput(_))
    }
}

/// A provider failed to produce a count for a URL.
#[derive(Debug, Error)]
#[error("could not fetch {network} count for '{url}': {cause:#}")]
pub struct FetchError {
    pub network: String,
    pub url: String,
    pub cause: ohno::AppError,
}
