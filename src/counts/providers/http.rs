//! HTTP plumbing shared by the built-in providers.

use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use url::Url;

const USER_AGENT: &str = concat!("share-counts/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the built-in providers.
///
/// `timeout` bounds each request end to end; a request that exceeds it fails.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .into_app_err("creating HTTP client")
}

/// Build a request URL from a base URL, a path and query parameters.
pub fn request_url(base_url: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let endpoint = format!("{}{path}", base_url.trim_end_matches('/'));
    Url::parse_with_params(&endpoint, params).into_app_err_with(|| format!("building request URL from '{endpoint}'"))
}

/// Send a GET request and return the body of a successful response.
///
/// Transport errors, timeouts and non-success statuses are all errors.
pub async fn get_text(client: &reqwest::Client, url: Url) -> Result<String> {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => return Err(app_err!("request to {url} timed out")),
        Err(e) => return Err(e).into_app_err_with(|| format!("sending HTTP request to {url}")),
    };

    let status = response.status();
    if !status.is_success() {
        return Err(app_err!("unexpected HTTP status {status} from {url}"));
    }

    response
        .text()
        .await
        .into_app_err_with(|| format!("reading response body from {url}"))
}
