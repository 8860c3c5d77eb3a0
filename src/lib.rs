//! NASA Explorer Library
//!
//! Data fetching and resilience layer for NASA open data: a TTL cache, a
//! backoff retrier, a CORS proxy fallback fetcher, source adapters for
//! missions, exoplanets and satellites, and the aggregator the CLI uses.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fallback;
pub mod http;
pub mod service;
pub mod sources;
