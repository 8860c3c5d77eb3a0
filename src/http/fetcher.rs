//! CORS fallback fetcher
//!
//! Browsers can't call some NASA endpoints directly, so requests may be
//! relayed through a public CORS proxy. The fetcher tries a primary route
//! and, if it fails for any reason, the alternate route exactly once. Each
//! route attempt is wrapped in the backoff retrier on its own. A 429 seen on
//! either route is reported over the other route's failure, so callers can
//! still tell the user to back off.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::records::parse_records;
use super::retry::{fetch_with_retry, RetryPolicy};
use super::{FetchError, Transport};

/// Which transport route is tried first, and whether the other is allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyMode {
    /// Direct request, then the proxy on failure
    #[default]
    DirectFirst,
    /// Proxy first, then a direct request on failure
    ProxyFirst,
    /// Direct request only
    DirectOnly,
    /// Proxy only
    ProxyOnly,
}

impl ProxyMode {
    fn routes(self) -> &'static [Route] {
        match self {
            ProxyMode::DirectFirst => &[Route::Direct, Route::Proxy],
            ProxyMode::ProxyFirst => &[Route::Proxy, Route::Direct],
            ProxyMode::DirectOnly => &[Route::Direct],
            ProxyMode::ProxyOnly => &[Route::Proxy],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProxyMode::DirectFirst => "direct-first",
            ProxyMode::ProxyFirst => "proxy-first",
            ProxyMode::DirectOnly => "direct-only",
            ProxyMode::ProxyOnly => "proxy-only",
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "direct-first" | "direct" => Ok(ProxyMode::DirectFirst),
            "proxy-first" | "proxy" => Ok(ProxyMode::ProxyFirst),
            "direct-only" => Ok(ProxyMode::DirectOnly),
            "proxy-only" => Ok(ProxyMode::ProxyOnly),
            other => Err(format!(
                "unknown proxy mode '{}', expected direct-first, proxy-first, direct-only or proxy-only",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Direct,
    Proxy,
}

impl Route {
    fn name(self) -> &'static str {
        match self {
            Route::Direct => "direct",
            Route::Proxy => "proxy",
        }
    }
}

/// Fetches upstream URLs over a direct route and a CORS-proxy route
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    proxy_prefix: String,
    mode: ProxyMode,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("proxy_prefix", &self.proxy_prefix)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Fetcher {
    /// Creates a fetcher over `transport`
    ///
    /// `proxy_prefix` is prepended to the percent-encoded target URL to
    /// form the proxy URL.
    pub fn new(
        transport: Arc<dyn Transport>,
        proxy_prefix: impl Into<String>,
        mode: ProxyMode,
    ) -> Self {
        Self {
            transport,
            proxy_prefix: proxy_prefix.into(),
            mode,
        }
    }

    /// URL actually requested for `target` over the proxy route
    pub fn proxy_url(&self, target: &str) -> String {
        format!("{}{}", self.proxy_prefix, urlencoding::encode(target))
    }

    fn route_url(&self, route: Route, target: &str) -> String {
        match route {
            Route::Direct => target.to_string(),
            Route::Proxy => self.proxy_url(target),
        }
    }

    /// Fetches `target` and flattens the body into a list of raw records
    pub async fn fetch_records(
        &self,
        target: &str,
        policy: &RetryPolicy,
    ) -> Result<Vec<Value>, FetchError> {
        self.fetch_with(target, policy, parse_records).await
    }

    /// Fetches `target` and parses the body as a single JSON document
    pub async fn fetch_json(&self, target: &str, policy: &RetryPolicy) -> Result<Value, FetchError> {
        self.fetch_with(target, policy, |body| Ok(serde_json::from_str(body)?))
            .await
    }

    /// Runs each route in order until one yields a parsed body
    ///
    /// If every route fails, a rate limit from any route wins; otherwise the
    /// error from the last route attempted is returned.
    async fn fetch_with<T, P>(
        &self,
        target: &str,
        policy: &RetryPolicy,
        parse: P,
    ) -> Result<T, FetchError>
    where
        P: Fn(&str) -> Result<T, FetchError>,
    {
        let mut rate_limit = None;
        let mut last_error = None;
        for &route in self.mode.routes() {
            let url = self.route_url(route, target);
            let attempt = async {
                let body = fetch_with_retry(policy, || self.transport.get(&url)).await?;
                parse(&body)
            };
            match attempt.await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        route = route.name(),
                        url = %redact_api_key(target),
                        error = %err,
                        "upstream fetch failed"
                    );
                    if err.is_rate_limit() && rate_limit.is_none() {
                        rate_limit = Some(err.clone());
                    }
                    last_error = Some(err);
                }
            }
        }
        Err(rate_limit
            .or(last_error)
            .unwrap_or_else(|| FetchError::Network("no route attempted".to_string())))
    }
}

/// Replaces the value of an `api_key` query parameter for logging
pub fn redact_api_key(url: &str) -> String {
    let Some(start) = url.find("api_key=") else {
        return url.to_string();
    };
    let value_start = start + "api_key=".len();
    let value_end = url[value_start..]
        .find('&')
        .map(|i| value_start + i)
        .unwrap_or(url.len());
    format!("{}***{}", &url[..value_start], &url[value_end..])
}
