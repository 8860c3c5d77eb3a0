//! Fetch error types and retry classification.

use thiserror::Error;

/// Errors that can occur while fetching from an upstream endpoint
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection, DNS or other transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Upstream returned a non-success status code
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Upstream returned 429 Too Many Requests
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// The response body was not in an expected shape
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether another attempt might succeed
    ///
    /// 429, 5xx, timeouts and network failures are retryable. Other 4xx
    /// statuses and malformed bodies are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) | FetchError::RateLimited { .. } => {
                true
            }
            FetchError::Status { status, .. } => (500..=599).contains(status),
            FetchError::Parse(_) => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}
