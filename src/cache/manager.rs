//! TTL cache manager for normalized API responses
//!
//! Provides a `TtlCache` that stores serializable data as JSON values with an
//! insertion timestamp and a time-to-live. Reads check freshness first and
//! drop stale entries as a side effect.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::clock::{Clock, SystemClock};

/// A single cached value with its freshness window
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The cached data
    data: Value,
    /// When the data was cached
    inserted_at: DateTime<Utc>,
    /// How long the entry stays fresh
    ttl: Duration,
}

impl CacheEntry {
    /// An entry is valid while `now - inserted_at <= ttl`
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (now - self.inserted_at).to_std() {
            Ok(age) => age <= self.ttl,
            // Clock went backwards; the entry is younger than zero
            Err(_) => true,
        }
    }
}

/// Keyed in-memory store shared by all source adapters
///
/// The cache is unbounded unless constructed with [`TtlCache::with_max_entries`].
/// All access goes through `get`/`set`; the internal lock is never held
/// across an await point.
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    max_entries: Option<usize>,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    /// Creates an unbounded cache driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an unbounded cache driven by a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            max_entries: None,
        }
    }

    /// Caps the number of stored entries
    ///
    /// When a new key would exceed the cap, expired entries are purged first
    /// and then the oldest insertion is evicted.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reads a fresh entry from the cache
    ///
    /// Returns `None` if the key is missing, has expired, or cannot be
    /// deserialized as `T`. Expired entries are removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let fresh = entries.get(key)?.is_fresh(now);
        if !fresh {
            entries.remove(key);
            tracing::debug!(key, "cache entry expired");
            return None;
        }

        let value = entries.get(key)?.data.clone();
        drop(entries);
        serde_json::from_value(value).ok()
    }

    /// Writes data to the cache, overwriting any previous entry and resetting its timer
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if `data` cannot be serialized to JSON
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        ttl: Duration,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        let now = self.clock.now();
        let mut entries = self.lock();

        if let Some(max) = self.max_entries {
            if !entries.contains_key(key) && entries.len() >= max {
                entries.retain(|_, entry| entry.is_fresh(now));
                if entries.len() >= max {
                    let oldest = entries
                        .iter()
                        .min_by_key(|(_, entry)| entry.inserted_at)
                        .map(|(k, _)| k.clone());
                    if let Some(oldest) = oldest {
                        tracing::debug!(key = %oldest, "evicting oldest cache entry");
                        entries.remove(&oldest);
                    }
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                data: value,
                inserted_at: now,
                ttl,
            },
        );
        Ok(())
    }

    /// Removes an entry, returning whether one was present
    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
