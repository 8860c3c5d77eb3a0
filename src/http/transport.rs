//! HTTP transport seam
//!
//! Adapters never talk to `reqwest` directly. They go through the
//! [`Transport`] trait so tests can script upstream behavior, and so every
//! status-code check lives in one place.

use futures::future::BoxFuture;
use reqwest::Client;
use std::time::Duration;

use super::FetchError;

/// Fallback wait when a 429 response carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// A single HTTP GET returning the response body as text
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, FetchError>>;
}

/// `reqwest`-backed transport with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nasa-explorer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Creates a transport with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "GET");
        let response = self.client.get(url).send().await?;
        let response = check_response(response).await?;
        Ok(response.text().await?)
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(self.get_text(url))
    }
}

/// Check an HTTP response for error statuses.
///
/// Returns the response unchanged on success. 429 becomes
/// [`FetchError::RateLimited`]; any other non-success status becomes
/// [`FetchError::Status`] carrying the response body.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited {
            retry_after_secs: parse_retry_after(&resp),
        });
    }
    if !resp.status().is_success() {
        return Err(FetchError::Status {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

/// Parse the `Retry-After` header as seconds.
fn parse_retry_after(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
