use super::error::{CountsError, FetchError};
use super::registry::Registry;
use std::sync::Arc;

const LOG_TARGET: &str = "   fetcher";

/// Invokes one provider for one URL, without caching or retries.
#[derive(Debug, Clone)]
pub struct Fetcher {
    registry: Arc<Registry>,
}

impl Fetcher {
    #[must_use]
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Fetch the count of `url` on `network`.
    ///
    /// Unknown networks fail with [`CountsError::UnknownNetwork`] without any network activity.
    /// Provider failures are logged and returned as [`CountsError::Fetch`].
    pub async fn fetch(&self, network: &str, url: &str) -> Result<u64, CountsError> {
        let provider = self.registry.get(network)?;

        match provider.fetch(url).await {
            Ok(count) => Ok(count),
            Err(cause) => {
                log::error!(target: LOG_TARGET, "Could not fetch count for {network} '{url}': {cause:#}");
                Err(FetchError {
                    network: network.to_string(),
                    url: url.to_string(),
                    cause,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::counts::providers::CountProvider;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use futures::FutureExt;
    use futures::future::BoxFuture;

    #[derive(Debug, Default)]
    struct Flaky {
        calls: AtomicUsize,
    }

    impl CountProvider for Flaky {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<u64>> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if url.contains("broken") {
                Err(ohno::app_err!("no well-formed body in response"))
            } else {
                Ok(7)
            };
            futures::future::ready(result).boxed()
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Arc::new(Registry::builder().with("x", Flaky::default()).build()))
    }

    #[tokio::test]
    async fn test_fetch_success() {
        assert_eq!(fetcher().fetch("x", "https://e.com").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_fetch_wraps_provider_error() {
        let err = fetcher().fetch("x", "https://e.com/broken").await.unwrap_err();
        let CountsError::Fetch(fetch_error) = err else {
            panic!("expected a fetch error, got {err:?}");
        };
        assert_eq!(fetch_error.network, "x");
        assert_eq!(fetch_error.url, "https://e.com/broken");
        assert!(fetch_error.cause.to_string().contains("no well-formed body"));
    }

    #[tokio::test]
    async fn test_fetch_unknown_network() {
        let err = fetcher().fetch("y", "https://e.com").await.unwrap_err();
        assert!(matches!(err, CountsError::UnknownNetwork(n) if n == "y"));
    }
}
