//! A thin HTTP front end over [`Aggregator`].
//!
//! `GET /?networks=twitter,facebook&url=https://example.com/` answers with a JSON object
//! mapping each network to its count, in network order. Without `url` the `Referer` header is
//! used. An optional `callback` parameter turns the answer into JSONP. Every other path or
//! method is forbidden.

use crate::Result;
use crate::counts::{Aggregator, CountsError, parse_networks, resolve_url};
use bytes::Bytes;
use core::convert::Infallible;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue, REFERER};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use ohno::IntoAppError;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::net::TcpListener;
use url::form_urlencoded;

const LOG_TARGET: &str = "    server";

const JSON: &str = "application/json; charset=utf-8";
const JAVASCRIPT: &str = "application/javascript; charset=utf-8";

const MISSING_NETWORKS: &str = "You have to specify which networks you want stats for (networks=facebook,twitter,googleplus)";
const UNKNOWN_ERROR: &str = "There was an unknown error.";

static CALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*$").expect("invalid regex"));

/// A response before it is turned into an HTTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,

    /// `Cache-Control: max-age` in seconds, if the response may be cached.
    pub max_age: Option<u64>,
}

impl Reply {
    fn json(status: StatusCode, body: String) -> Self {
        Self {
            status,
            content_type: JSON,
            body,
            max_age: None,
        }
    }

    fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }).to_string())
    }

    fn wrap_jsonp(mut self, callback: Option<&str>) -> Self {
        if let Some(callback) = callback {
            self.body = format!("/**/ typeof {callback} === 'function' && {callback}({});", self.body);
            self.content_type = JAVASCRIPT;
        }
        self
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Some(max_age) = self.max_age
            && let Ok(value) = HeaderValue::try_from(format!("max-age={max_age}"))
        {
            let _ = headers.insert(CACHE_CONTROL, value);
        }

        response
    }
}

/// Maps HTTP requests onto [`Aggregator::retrieve_counts`].
#[derive(Debug, Clone)]
pub struct CountsService {
    aggregator: Aggregator,
    max_age: u64,
}

impl CountsService {
    /// `max_age` is advertised in the `Cache-Control` header of every response from `/`.
    #[must_use]
    pub const fn new(aggregator: Aggregator, max_age: u64) -> Self {
        Self { aggregator, max_age }
    }

    #[must_use]
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Produce the reply for a request.
    pub async fn respond(&self, method: &Method, path: &str, query: Option<&str>, referer: Option<&str>) -> Reply {
        if *method != Method::GET || path != "/" {
            return Reply::error(StatusCode::FORBIDDEN, "Forbidden");
        }

        let params = QueryParams::parse(query.unwrap_or_default());
        if let Some(callback) = params.callback.as_deref()
            && !CALLBACK_RE.is_match(callback)
        {
            let mut reply = Reply::error(StatusCode::UNPROCESSABLE_ENTITY, "Invalid callback name");
            reply.max_age = Some(self.max_age);
            return reply;
        }

        let mut reply = self.counts_reply(&params, referer).await.wrap_jsonp(params.callback.as_deref());
        reply.max_age = Some(self.max_age);
        reply
    }

    async fn counts_reply(&self, params: &QueryParams, referer: Option<&str>) -> Reply {
        let networks = parse_networks(params.networks.as_deref().unwrap_or_default());
        if networks.is_empty() {
            return Reply::error(StatusCode::UNPROCESSABLE_ENTITY, MISSING_NETWORKS);
        }

        let invalid = self.aggregator.cache().registry().invalid_networks(&networks);
        if !invalid.is_empty() {
            return input_error(&CountsError::InvalidNetworks(invalid));
        }

        let url = match resolve_url(params.url.as_deref(), referer) {
            Ok(url) => url,
            Err(e) => return input_error(&e),
        };

        match self.aggregator.retrieve_counts(url, &networks).await {
            Ok(counts) => match serde_json::to_string(&counts) {
                Ok(body) => Reply::json(StatusCode::OK, body),
                Err(e) => {
                    log::error!(target: LOG_TARGET, "Could not serialize counts for '{url}': {e}");
                    Reply::error(StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR)
                }
            },
            Err(e) if e.is_input_error() => input_error(&e),
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not retrieve counts for '{url}': {e}");
                Reply::error(StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR)
            }
        }
    }

    async fn call(self: Arc<Self>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let (parts, _) = req.into_parts();
        let referer = parts.headers.get(REFERER).and_then(|value| value.to_str().ok());
        let reply = self.respond(&parts.method, parts.uri.path(), parts.uri.query(), referer).await;

        log::debug!(target: LOG_TARGET, "{} {} -> {}", parts.method, parts.uri, reply.status);
        Ok(reply.into_response())
    }
}

fn input_error(e: &CountsError) -> Reply {
    Reply::error(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
}

/// The query parameters the service understands. The first occurrence of each wins.
#[derive(Debug, Default)]
struct QueryParams {
    networks: Option<String>,
    url: Option<String>,
    callback: Option<String>,
}

impl QueryParams {
    fn parse(query: &str) -> Self {
        let mut params = Self::default();

        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match name.as_ref() {
                "networks" => &mut params.networks,
                "url" => &mut params.url,
                "callback" => &mut params.callback,
                _ => continue,
            };

            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }
}

/// Accept connections on `listener` until `shutdown` completes.
///
/// Connections already accepted keep being served by their own tasks.
pub async fn serve(listener: TcpListener, service: Arc<CountsService>, shutdown: impl Future<Output = ()>) -> Result<()> {
    let local_addr = listener.local_addr().into_app_err("could not determine the listening address")?;
    log::info!(target: LOG_TARGET, "Listening on http://{local_addr}");

    let mut shutdown = core::pin::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                log::info!(target: LOG_TARGET, "No longer accepting connections");
                return Ok(());
            }

            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        log::warn!(target: LOG_TARGET, "Could not accept connection: {e}");
                        continue;
                    }
                };

                let service = Arc::clone(&service);
                let _ = tokio::spawn(async move {
                    let handler = service_fn(move |req| Arc::clone(&service).call(req));
                    if let Err(e) = http1::Builder::new().serve_connection(TokioIo::new(stream), handler).await {
                        log::debug!(target: LOG_TARGET, "Error serving connection from {peer}: {e}");
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counts::{CacheSettings, CountCache, CountProvider, CountStore, Fetcher, Registry};
    use futures::FutureExt;
    use futures::future::BoxFuture;

    #[derive(Debug)]
    struct Fixed(Option<u64>);

    impl CountProvider for Fixed {
        fn fetch<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<u64>> {
            let result = self.0.ok_or_else(|| ohno::app_err!("upstream is down"));
            futures::future::ready(result).boxed()
        }
    }

    fn service() -> CountsService {
        let registry = Registry::builder().with("x", Fixed(Some(42))).with("y", Fixed(None)).build();
        let cache = CountCache::new(Fetcher::new(Arc::new(registry)), Arc::new(CountStore::new()), CacheSettings::default());
        CountsService::new(Aggregator::new(cache), 240)
    }

    async fn get(query: &str, referer: Option<&str>) -> Reply {
        service().respond(&Method::GET, "/", Some(query), referer).await
    }

    #[tokio::test]
    async fn test_counts_are_sorted_json() {
        let reply = get("networks=y,x&url=https%3A%2F%2Fe.com", None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.content_type, JSON);
        assert_eq!(reply.body, r#"{"x":42,"y":-1}"#);
        assert_eq!(reply.max_age, Some(240));
    }

    #[tokio::test]
    async fn test_referer_fallback() {
        let reply = get("networks=x", Some("https://e.com")).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, r#"{"x":42}"#);
    }

    #[tokio::test]
    async fn test_missing_networks() {
        let reply = get("url=https://e.com", None).await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(reply.body.contains("You have to specify which networks"));
        assert_eq!(reply.max_age, Some(240));
    }

    #[tokio::test]
    async fn test_unknown_networks() {
        let reply = get("networks=x,bogus&url=https://e.com", None).await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reply.body, r#"{"error":"unknown network(s) specified: 'bogus'"}"#);
    }

    #[tokio::test]
    async fn test_missing_url_and_referer() {
        let reply = get("networks=x", None).await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(reply.body.contains("referring url"));
    }

    #[tokio::test]
    async fn test_jsonp() {
        let reply = get("networks=x&url=https://e.com&callback=jQuery_123", None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.content_type, JAVASCRIPT);
        assert_eq!(reply.body, r#"/**/ typeof jQuery_123 === 'function' && jQuery_123({"x":42});"#);
    }

    #[tokio::test]
    async fn test_invalid_callback() {
        let reply = get("networks=x&url=https://e.com&callback=alert(1)", None).await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reply.content_type, JSON);
    }

    #[tokio::test]
    async fn test_forbidden() {
        let service = service();

        let reply = service.respond(&Method::GET, "/favicon.ico", None, None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
        assert_eq!(reply.body, r#"{"error":"Forbidden"}"#);
        assert_eq!(reply.max_age, None);

        let reply = service.respond(&Method::POST, "/", Some("networks=x&url=u"), None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_first_query_parameter_wins() {
        let params = QueryParams::parse("url=a&url=b&networks=x%2Cy&other=1");
        assert_eq!(params.url.as_deref(), Some("a"));
        assert_eq!(params.networks.as_deref(), Some("x,y"));
        assert_eq!(params.callback, None);
    }

    #[test]
    fn test_reply_headers() {
        let mut reply = Reply::json(StatusCode::OK, "{}".to_string());
        reply.max_age = Some(60);
        let response = reply.into_response();

        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "max-age=60");
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), JSON);
    }
}
