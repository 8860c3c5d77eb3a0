//! Upstream HTTP plumbing
//!
//! Layers, innermost first: a [`Transport`] performs one GET, the retrier
//! repeats it on transient failures, and the [`Fetcher`] swaps between the
//! direct and CORS-proxy routes. Bodies are flattened to plain record lists
//! by [`records`] before any adapter sees them.

mod error;
pub mod fetcher;
pub mod records;
pub mod retry;
mod transport;

pub use error::FetchError;
pub use fetcher::{Fetcher, ProxyMode};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use transport::{check_response, HttpTransport, Transport};
