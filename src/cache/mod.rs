//! In-memory cache for normalized API responses
//!
//! This module provides a TTL cache shared by every source adapter. Entries
//! are stored as JSON values so one cache instance can hold missions,
//! exoplanets and satellites side by side. Expired entries are evicted lazily
//! on the next read; there is no background sweeper.

mod clock;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::TtlCache;
