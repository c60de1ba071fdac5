//! Twitter's URL count endpoint, which answers with `{"count": <n>}`.

use super::CountProvider;
use super::http::{get_text, request_url};
use crate::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use ohno::IntoAppError;
use serde::Deserialize;

const LOG_TARGET: &str = "   twitter";

pub const TWITTER_BASE_URL: &str = "http://urls.api.twitter.com";

#[derive(Debug, Deserialize)]
struct UrlCount {
    count: u64,
}

#[derive(Debug, Clone)]
pub struct Provider {
    client: reqwest::Client,
    base_url: String,
}

impl Provider {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(TWITTER_BASE_URL).to_string(),
        }
    }

    async fn fetch_count(&self, url: &str) -> Result<u64> {
        let api_url = request_url(&self.base_url, "/1/urls/count.json", &[("url", url)])?;
        log::debug!(target: LOG_TARGET, "Querying '{api_url}'");

        let body = get_text(&self.client, api_url).await?;
        parse_count(&body)
    }
}

impl CountProvider for Provider {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<u64>> {
        self.fetch_count(url).boxed()
    }
}

/// Extract the count from a response body.
fn parse_count(body: &str) -> Result<u64> {
    let parsed: UrlCount = serde_json::from_str(body).into_app_err("no well-formed count in twitter response")?;
    Ok(parsed.count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(r#"{"count": 42, "url": "https://e.com/"}"#).unwrap(), 42);
        assert_eq!(parse_count(r#"{"count": 0}"#).unwrap(), 0);
    }

    #[test]
    fn test_parse_count_rejects_malformed() {
        assert!(parse_count("").is_err());
        assert!(parse_count("{}").is_err());
        assert!(parse_count(r#"{"count": "42"}"#).is_err());
        assert!(parse_count(r#"{"count": -3}"#).is_err());
        assert!(parse_count("<html>rate limited</html>").is_err());
    }

    #[test]
    fn test_provider_new_default_base_url() {
        let provider = Provider::new(reqwest::Client::new(), None);
        assert_eq!(provider.base_url, TWITTER_BASE_URL);
    }

    #[test]
    fn test_provider_new_custom_base_url() {
        let provider = Provider::new(reqwest::Client::new(), Some("http://localhost:9999"));
        assert_eq!(provider.base_url, "http://localhost:9999");
    }
}
