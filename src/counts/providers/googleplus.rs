//! Google+ has no count API; the count is scraped from the +1 button's HTML.

use super::CountProvider;
use super::http::{get_text, request_url};
use crate::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use ohno::{IntoAppError, app_err};
use regex::Regex;
use std::sync::LazyLock;

const LOG_TARGET: &str = "googleplus";

pub const GOOGLEPLUS_BASE_URL: &str = "https://plusone.google.com";

static COUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",ld:\[,\[\d+,(\d+),").expect("invalid regex"));

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
            base_url: base_url.unwrap_or(GOOGLEPLUS_BASE_URL).to_string(),
        }
    }

    async fn fetch_count(&self, url: &str) -> Result<u64> {
        let api_url = request_url(&self.base_url, "/_/+1/fastbutton", &[("url", url)])?;
        log::debug!(target: LOG_TARGET, "Querying '{api_url}'");

        let body = get_text(&self.client, api_url).await?;
        log::debug!(target: LOG_TARGET, "Fastbutton HTML length: {} bytes", body.len());
        parse_count(&body)
    }
}

impl CountProvider for Provider {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<u64>> {
        self.fetch_count(url).boxed()
    }
}

fn parse_count(body: &str) -> Result<u64> {
    let Some(digits) = COUNT_REGEX.captures(body).and_then(|captures| captures.get(1)) else {
        return Err(app_err!("no count found in google+ fastbutton response"));
    };

    digits
        .as_str()
        .parse::<u64>()
        .into_app_err_with(|| format!("unparseable google+ count '{}'", digits.as_str()))
}
