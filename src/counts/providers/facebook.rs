//! Facebook's FQL `link_stat` table. The count is the `total_count` of the first row, which
//! sums likes, shares and comments.

use super::CountProvider;
use super::http::{get_text, request_url};
use crate::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use ohno::{IntoAppError, app_err};
use serde::Deserialize;

const LOG_TARGET: &str = "  facebook";

pub const FACEBOOK_BASE_URL: &str = "https://graph.facebook.com";

#[derive(Debug, Deserialize)]
struct LinkStats {
    data: Vec<LinkStat>,
}

#[derive(Debug, Deserialize)]
struct LinkStat {
    total_count: u64,
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
            base_url: base_url.unwrap_or(FACEBOOK_BASE_URL).to_string(),
        }
    }

    async fn fetch_count(&self, url: &str) -> Result<u64> {
        let query = link_stat_query(url);
        let api_url = request_url(&self.base_url, "/fql", &[("q", &query)])?;
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

/// The FQL query selecting the link statistics of `url`.
fn link_stat_query(url: &str) -> String {
    let escaped = url.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "SELECT url, normalized_url, share_count, like_count, comment_count, total_count, \
         commentsbox_count, comments_fbid, click_count FROM link_stat WHERE url='{escaped}'"
    )
}

fn parse_count(body: &str) -> Result<u64> {
    let stats: LinkStats = serde_json::from_str(body).into_app_err("no well-formed link statistics in facebook response")?;
    stats
        .data
        .first()
        .map(|row| row.total_count)
        .ok_or_else(|| app_err!("facebook response contains no link statistics"))
}
