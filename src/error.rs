//! Errors surfaced to callers of the source adapters and the aggregator
//!
//! Primary listing calls absorb upstream failures and fall back to static
//! data. A rate limit is the one condition that escapes, so the caller can
//! tell the user to try again later instead of silently showing offline data.

use thiserror::Error;

use crate::sources::Source;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The upstream behind `upstream` answered 429 on every route
    #[error("{upstream} API rate limited, try again in {retry_after_secs}s")]
    RateLimited {
        upstream: Source,
        retry_after_secs: u64,
    },
}
